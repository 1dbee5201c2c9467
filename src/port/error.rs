//! Port-specific error types.
//!
//! Every failure of the port layer surfaces as a [`PortError`]; nothing is
//! retried or swallowed below the caller. OS error codes are preserved in the
//! wrapped `std::io::Error`.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::sys::abi::ERROR_OPERATION_ABORTED;
use crate::sys::Failure;

/// The configuration syscall that failed while opening a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStep {
    /// `SetCommState`: baud rate, framing and control flags.
    LineSettings,
    /// `SetupComm`: driver queue sizes.
    BufferSizes,
    /// `SetCommTimeouts`.
    Timeouts,
    /// `SetCommMask`.
    EventMask,
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::LineSettings => "line settings",
            Self::BufferSizes => "buffer sizes",
            Self::Timeouts => "timeouts",
            Self::EventMask => "event mask",
        };
        f.write_str(step)
    }
}

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// A line parameter is outside the values the driver understands.
    /// Raised before any device call is made.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The device does not exist, is in use, or access was denied.
    #[error("Failed to open serial device {name}: {source}")]
    DeviceOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A configuration call was rejected by the driver.
    #[error("Failed to configure {step}: {source}")]
    Configuration {
        step: ConfigStep,
        #[source]
        source: io::Error,
    },

    /// A completion event could not be created.
    #[error("Failed to create completion event: {0}")]
    Resource(#[source] io::Error),

    /// A transfer, flush or release failed. `transferred` is the partial
    /// count the driver reported and may be non-zero.
    #[error("I/O error after {transferred} byte(s): {source}")]
    Io {
        transferred: usize,
        #[source]
        source: io::Error,
    },

    /// The transfer was cancelled by `flush` or `close` before it finished.
    #[error("Operation aborted after {transferred} byte(s)")]
    Aborted { transferred: usize },

    /// The port has been closed.
    #[error("Port is closed")]
    Closed,
}

impl PortError {
    /// Create an InvalidParameter error from a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create a Configuration error for a failed step.
    pub fn configuration(step: ConfigStep, source: io::Error) -> Self {
        Self::Configuration { step, source }
    }

    /// Create an Io error carrying a partial byte count.
    pub fn io(transferred: usize, source: io::Error) -> Self {
        Self::Io {
            transferred,
            source,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// Bytes moved before the failure, for transfer errors.
    pub fn bytes_transferred(&self) -> usize {
        match self {
            Self::Io { transferred, .. } | Self::Aborted { transferred } => *transferred,
            _ => 0,
        }
    }

    /// The Win32 error code behind this error, if there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::DeviceOpen { source, .. }
            | Self::Configuration { source, .. }
            | Self::Resource(source)
            | Self::Io { source, .. } => source.raw_os_error(),
            Self::Aborted { .. } => Some(ERROR_OPERATION_ABORTED),
            Self::InvalidParameter(_) | Self::Closed => None,
        }
    }
}

impl From<Failure> for PortError {
    fn from(failure: Failure) -> Self {
        let transferred = failure.transferred as usize;
        if failure.error.raw_os_error() == Some(ERROR_OPERATION_ABORTED) {
            Self::Aborted { transferred }
        } else {
            Self::io(transferred, failure.error)
        }
    }
}

/// Lets the port back `std::io::Read`/`Write`.
impl From<PortError> for io::Error {
    fn from(err: PortError) -> Self {
        let kind = match &err {
            PortError::InvalidParameter(_) => io::ErrorKind::InvalidInput,
            PortError::DeviceOpen { source, .. } => source.kind(),
            PortError::Configuration { .. } => io::ErrorKind::InvalidInput,
            PortError::Resource(source) | PortError::Io { source, .. } => source.kind(),
            PortError::Aborted { .. } => io::ErrorKind::Interrupted,
            PortError::Closed => io::ErrorKind::NotConnected,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::abi::{ERROR_ACCESS_DENIED, ERROR_GEN_FAILURE};

    #[test]
    fn test_error_display() {
        let err = PortError::invalid_parameter("parity code 9");
        assert_eq!(err.to_string(), "Invalid parameter: parity code 9");

        let err = PortError::Closed;
        assert_eq!(err.to_string(), "Port is closed");

        let err = PortError::Aborted { transferred: 3 };
        assert_eq!(err.to_string(), "Operation aborted after 3 byte(s)");
    }

    #[test]
    fn test_configuration_error_names_step() {
        let err = PortError::configuration(
            ConfigStep::Timeouts,
            io::Error::from_raw_os_error(ERROR_GEN_FAILURE),
        );
        assert!(err.to_string().starts_with("Failed to configure timeouts"));
        assert_eq!(err.raw_os_error(), Some(ERROR_GEN_FAILURE));
    }

    #[test]
    fn test_failure_maps_abort() {
        let err: PortError = Failure::new(
            2,
            io::Error::from_raw_os_error(ERROR_OPERATION_ABORTED),
        )
        .into();
        assert!(err.is_aborted());
        assert_eq!(err.bytes_transferred(), 2);
    }

    #[test]
    fn test_failure_keeps_partial_count() {
        let err: PortError =
            Failure::new(5, io::Error::from_raw_os_error(ERROR_GEN_FAILURE)).into();
        match err {
            PortError::Io {
                transferred,
                ref source,
            } => {
                assert_eq!(transferred, 5);
                assert_eq!(source.raw_os_error(), Some(ERROR_GEN_FAILURE));
            }
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn test_io_error_kinds() {
        let closed: io::Error = PortError::Closed.into();
        assert_eq!(closed.kind(), io::ErrorKind::NotConnected);

        let aborted: io::Error = PortError::Aborted { transferred: 0 }.into();
        assert_eq!(aborted.kind(), io::ErrorKind::Interrupted);

        let invalid: io::Error = PortError::invalid_parameter("x").into();
        assert_eq!(invalid.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_device_open_keeps_os_code() {
        let err = PortError::DeviceOpen {
            name: r"\\.\COM9".to_string(),
            source: io::Error::from_raw_os_error(ERROR_ACCESS_DENIED),
        };
        assert_eq!(err.raw_os_error(), Some(ERROR_ACCESS_DENIED));
        assert!(err.to_string().contains(r"\\.\COM9"));
    }
}
