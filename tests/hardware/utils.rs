//! Utility functions for hardware testing.
//!
//! Provides test port configuration, setup/teardown fixtures and timing
//! utilities.

use overlapped_serial::config::{ConfigLoader, TestingConfig};
use overlapped_serial::{ComPort, Port, PortError, PortSettings};
use std::time::{Duration, Instant};

/// Test port configuration from the environment (`TEST_PORT`,
/// `TEST_PEER_PORT`, `TEST_BAUD`, `TEST_TIMEOUT`, `LOOPBACK_ENABLED`, or
/// their `OVERLAPPED_SERIAL_TESTING_*` forms).
pub struct TestPortConfig {
    pub port_name: String,
    pub peer_name: Option<String>,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
    pub timeout: Duration,
}

impl TestPortConfig {
    /// Get test configuration from environment variables.
    pub fn from_env() -> Option<Self> {
        let TestingConfig {
            port,
            peer_port,
            baud,
            loopback_enabled,
            timeout_ms,
        } = ConfigLoader::with_defaults().into_config().testing;

        Some(TestPortConfig {
            port_name: port?,
            peer_name: peer_port,
            baud_rate: baud,
            loopback_enabled,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Line settings for testing.
    pub fn settings(&self) -> PortSettings {
        PortSettings::new(self.baud_rate).read_timeout(self.timeout)
    }
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// Test fixture holding the port under test and, when configured, its peer.
pub struct PortTestFixture {
    pub port: ComPort,
    pub peer: Option<ComPort>,
    config: TestPortConfig,
}

impl PortTestFixture {
    /// Open the configured ports, or `None` if no test port is configured or
    /// it cannot be opened.
    pub fn setup() -> Option<Self> {
        let config = TestPortConfig::from_env()?;

        println!(
            "Setting up test fixture for {} at {} baud",
            config.port_name, config.baud_rate
        );

        let port = match Port::open(&config.port_name, &config.settings()) {
            Ok(p) => p,
            Err(e) => {
                println!("Failed to open port: {}", e);
                return None;
            }
        };
        let peer = match &config.peer_name {
            Some(name) => match Port::open(name, &config.settings()) {
                Ok(p) => Some(p),
                Err(e) => {
                    println!("Failed to open peer port: {}", e);
                    return None;
                }
            },
            None => None,
        };

        Some(PortTestFixture { port, peer, config })
    }

    /// The port that receives what `port` sends: the peer if one is
    /// configured, otherwise `port` itself on a loopback plug.
    pub fn receiver(&self) -> Option<&ComPort> {
        match &self.peer {
            Some(peer) => Some(peer),
            None if self.config.loopback_enabled => Some(&self.port),
            None => None,
        }
    }

    pub fn config(&self) -> &TestPortConfig {
        &self.config
    }

    /// Read until `len` bytes have arrived or the configured timeout passes
    /// with nothing new.
    pub fn read_len(port: &ComPort, len: usize) -> Result<Vec<u8>, PortError> {
        let mut out = vec![0u8; len];
        let mut got = 0;
        while got < len {
            match port.read(&mut out[got..])? {
                0 => break,
                n => got += n,
            }
        }
        out.truncate(got);
        Ok(out)
    }
}

/// Skip test with a clear message if hardware is not available.
#[macro_export]
macro_rules! skip_without_hardware {
    () => {
        match $crate::hardware::utils::PortTestFixture::setup() {
            Some(fixture) => fixture,
            None => {
                println!("Skipping: TEST_PORT not set or not openable");
                println!("   Set TEST_PORT=COM3 (and TEST_PEER_PORT for a pair) to run hardware tests");
                return;
            }
        }
    };
}

/// Assert that duration is within expected range.
pub fn assert_duration_within(
    actual: Duration,
    expected: Duration,
    tolerance: Duration,
    message: &str,
) {
    let lower = expected.saturating_sub(tolerance);
    let upper = expected + tolerance;

    assert!(
        actual >= lower && actual <= upper,
        "{}: expected {:?} ± {:?}, got {:?}",
        message,
        expected,
        tolerance,
        actual
    );
}
