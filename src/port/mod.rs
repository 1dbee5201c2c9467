//! Port abstraction layer for serial communication.
//!
//! [`Port`] is the overlapped-I/O serial port; [`PortSettings`] and its
//! enums describe the line; [`SerialPortAdapter`] is the byte-device trait
//! the port implements.

mod com;
pub mod error;
mod handle;
pub mod line;
mod overlapped;
pub mod traits;

#[cfg(windows)]
pub use com::ComPort;
pub use com::{device_path, Port};
pub use error::{ConfigStep, PortError};
pub use traits::*;
