//! Shared test utilities for port tests.
//!
//! This module provides common test infrastructure including:
//! - Simulated drivers wired as loopback plugs or null-modem pairs
//! - Port builders
//! - Read helpers that collect a fixed number of bytes with a deadline

#![allow(dead_code)]

use overlapped_serial::sys::sim::SimComm;
use overlapped_serial::{Port, PortError, PortSettings};
use std::time::{Duration, Instant};

/// Upper bound for anything that should happen "promptly".
pub const PROMPT: Duration = Duration::from_secs(5);

/// A driver with a single device whose TX is wired to its own RX.
pub fn loopback(name: &str) -> SimComm {
    let sim = SimComm::new();
    sim.add_loopback(name);
    sim
}

/// A driver with two devices joined by a null-modem cable.
pub fn null_modem(a: &str, b: &str) -> SimComm {
    let sim = SimComm::new();
    sim.add_pair(a, b);
    sim
}

/// A driver with a single device wired to nothing.
pub fn unconnected(name: &str) -> SimComm {
    let sim = SimComm::new();
    sim.add_device(name);
    sim
}

/// Settings with a short read timeout, so reads that find nothing return
/// quickly.
pub fn quick_settings() -> PortSettings {
    PortSettings::default().read_timeout(Duration::from_millis(50))
}

/// Open a port on the simulated driver, panicking on failure.
pub fn open(sim: &SimComm, name: &str, settings: &PortSettings) -> Port<SimComm> {
    Port::open_with(sim.clone(), name, settings)
        .unwrap_or_else(|e| panic!("Failed to open {}: {}", name, e))
}

/// Read until `len` bytes have arrived or `PROMPT` has passed.
pub fn read_len(port: &Port<SimComm>, len: usize) -> Result<Vec<u8>, PortError> {
    let deadline = Instant::now() + PROMPT;
    let mut out = vec![0u8; len];
    let mut got = 0;
    while got < len && Instant::now() < deadline {
        got += port.read(&mut out[got..])?;
    }
    out.truncate(got);
    Ok(out)
}

/// Block until the driver has seen `count` completion waits, i.e. until that
/// many transfers are parked in the driver.
pub fn wait_for_pending(sim: &SimComm, count: usize) {
    use overlapped_serial::sys::sim::SimCall;

    let deadline = Instant::now() + PROMPT;
    while sim.count(SimCall::GetOverlappedResult) < count {
        assert!(Instant::now() < deadline, "transfer never went pending");
        std::thread::yield_now();
    }
}
