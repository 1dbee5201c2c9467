//! Tests against real COM ports.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! # A com0com pair, or two ports joined by a null-modem cable
//! set TEST_PORT=CNCA0
//! set TEST_PEER_PORT=CNCB0
//! set TEST_BAUD=115200                   # optional, default: 115200
//!
//! # Or a single port with TX wired to RX
//! set TEST_PORT=COM3
//! set LOOPBACK_ENABLED=1
//!
//! cargo test --test integration_hardware -- --ignored
//! ```

use super::utils::{assert_duration_within, PortTestFixture, TimingHelper};
use crate::skip_without_hardware;
use overlapped_serial::PortError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close() {
    let fixture = skip_without_hardware!();

    assert_eq!(fixture.port.name(), fixture.config().port_name);
    fixture.port.close().unwrap();
    assert!(matches!(fixture.port.read(&mut [0u8; 1]), Err(PortError::Closed)));
    println!("Port open/close test passed");
}

#[test]
#[ignore]
fn test_real_port_round_trip() {
    let fixture = skip_without_hardware!();
    let receiver = match fixture.receiver() {
        Some(r) => r,
        None => {
            println!("Skipping: needs TEST_PEER_PORT or LOOPBACK_ENABLED=1");
            return;
        }
    };

    fixture.port.flush().unwrap();
    receiver.flush().unwrap();

    let payload = b"OVERLAPPED ROUND TRIP\r\n";
    let timer = TimingHelper::new("round trip");
    assert_eq!(fixture.port.write(payload).unwrap(), payload.len());
    let echoed = PortTestFixture::read_len(receiver, payload.len()).unwrap();
    timer.finish();

    assert_eq!(echoed, payload.to_vec());
}

#[test]
#[ignore]
fn test_real_port_read_timeout() {
    let fixture = skip_without_hardware!();
    let timeout = Duration::from_millis(200);
    fixture.port.flush().unwrap();
    fixture.port.set_read_timeout(timeout).unwrap();

    let timer = TimingHelper::new("idle read");
    let n = fixture.port.read(&mut [0u8; 16]).unwrap();
    let elapsed = timer.finish();

    assert_eq!(n, 0);
    assert_duration_within(
        elapsed,
        timeout,
        Duration::from_millis(150),
        "idle read should end at the timeout",
    );
}

#[test]
#[ignore]
fn test_real_port_close_unblocks_reader() {
    let fixture = skip_without_hardware!();
    fixture.port.set_read_timeout(Duration::ZERO).unwrap();
    fixture.port.flush().unwrap();

    let port = Arc::new(fixture.port);
    let reader = {
        let port = Arc::clone(&port);
        thread::spawn(move || port.read(&mut [0u8; 8]))
    };
    thread::sleep(Duration::from_millis(200));

    port.close().unwrap();
    let err = reader.join().unwrap().unwrap_err();
    assert!(err.is_aborted() || err.is_closed(), "got {:?}", err);
}
