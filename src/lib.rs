//! Overlapped Serial Library
//!
//! Drives Windows COM ports through overlapped I/O and exposes them as a
//! blocking, thread-safe byte stream: one read and one write may be in flight
//! at the same time, each bounded by its own lock and completion event.
//!
//! # Modules
//!
//! - `port`: the serial port, its line settings and errors
//! - `sys`: the comm driver seam, with the Win32 binding and an in-process
//!   simulated driver
//! - `config`: Configuration management with TOML support
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), overlapped_serial::PortError> {
//! use std::time::Duration;
//! use overlapped_serial::{Parity, Port, PortSettings};
//!
//! let settings = PortSettings::new(115_200)
//!     .parity(Parity::Even)
//!     .read_timeout(Duration::from_millis(500));
//! let port = Port::open("COM3", &settings)?;
//!
//! port.write(b"AT\r")?;
//! let mut buf = [0u8; 64];
//! let n = port.read(&mut buf)?;
//! println!("{:?}", &buf[..n]);
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

pub mod config;
pub mod logging;
pub mod port;
pub mod sys;

// Re-export commonly used types for convenience
#[cfg(windows)]
pub use port::ComPort;
pub use port::{
    device_path, ConfigStep, DataBits, Parity, Port, PortError, PortSettings, SerialPortAdapter,
    StopBits,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
