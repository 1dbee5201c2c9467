//! Line and timeout configuration.
//!
//! Translates [`PortSettings`] into the driver's control block and timeout
//! block and applies them, together with the fixed queue sizes and event
//! mask every port gets.

use std::mem;
use std::time::Duration;

use tracing::debug;

use super::error::{ConfigStep, PortError};
use super::traits::PortSettings;
use crate::sys::abi::{DCB_BINARY, DCB_DTR_CONTROL_ENABLE, EV_RXCHAR, MAXDWORD};
use crate::sys::{CommApi, CommTimeouts, Dcb, RawHandle};

/// Driver input queue size, in bytes.
pub const INPUT_QUEUE_SIZE: u32 = 64;
/// Driver output queue size, in bytes.
pub const OUTPUT_QUEUE_SIZE: u32 = 64;

/// Longest read timeout the driver accepts, in milliseconds.
pub const MAX_READ_TIMEOUT_MS: u32 = MAXDWORD - 1;

/// Control block for the given settings.
pub fn control_block(settings: &PortSettings) -> Result<Dcb, PortError> {
    settings.validate()?;
    Ok(Dcb {
        dcb_length: mem::size_of::<Dcb>() as u32,
        baud_rate: settings.baud_rate,
        flags: DCB_BINARY | DCB_DTR_CONTROL_ENABLE,
        byte_size: settings.data_bits.bits(),
        parity: settings.parity.code(),
        stop_bits: settings.stop_bits.code(),
        ..Dcb::default()
    })
}

/// Timeout block for a read timeout.
///
/// With both `ReadIntervalTimeout` and `ReadTotalTimeoutMultiplier` at
/// `MAXDWORD` and a constant strictly between 0 and `MAXDWORD`, a read
/// returns at once with whatever is buffered, otherwise returns as soon as a
/// byte arrives, otherwise times out after the constant with nothing.
/// Writes never time out.
pub fn read_timeouts(read_timeout: Duration) -> CommTimeouts {
    CommTimeouts {
        read_interval_timeout: MAXDWORD,
        read_total_timeout_multiplier: MAXDWORD,
        read_total_timeout_constant: read_timeout_constant(read_timeout),
        write_total_timeout_multiplier: 0,
        write_total_timeout_constant: 0,
    }
}

/// `ReadTotalTimeoutConstant` for a read timeout.
///
/// Zero means "wait for data", spelled as the longest wait the driver
/// accepts. Anything else is rounded down to milliseconds and clamped to
/// `1..=MAX_READ_TIMEOUT_MS`.
pub fn read_timeout_constant(read_timeout: Duration) -> u32 {
    if read_timeout.is_zero() {
        return MAX_READ_TIMEOUT_MS;
    }
    read_timeout
        .as_millis()
        .clamp(1, u128::from(MAX_READ_TIMEOUT_MS)) as u32
}

/// Apply line settings, queue sizes, timeouts and the event mask, in that
/// order. Stops at the first call the driver rejects.
pub(crate) fn configure<A: CommApi>(
    api: &A,
    device: RawHandle,
    dcb: &Dcb,
    timeouts: &CommTimeouts,
) -> Result<(), PortError> {
    api.set_comm_state(device, dcb)
        .map_err(|e| PortError::configuration(ConfigStep::LineSettings, e))?;
    debug!(
        baud_rate = dcb.baud_rate,
        byte_size = dcb.byte_size,
        parity = dcb.parity,
        stop_bits = dcb.stop_bits,
        "line settings applied"
    );

    api.setup_comm(device, INPUT_QUEUE_SIZE, OUTPUT_QUEUE_SIZE)
        .map_err(|e| PortError::configuration(ConfigStep::BufferSizes, e))?;

    api.set_comm_timeouts(device, timeouts)
        .map_err(|e| PortError::configuration(ConfigStep::Timeouts, e))?;
    debug!(
        read_total_timeout_constant = timeouts.read_total_timeout_constant,
        "timeouts applied"
    );

    // The read path never waits on comm events, but the mask is part of a
    // fully initialised device.
    api.set_comm_mask(device, EV_RXCHAR)
        .map_err(|e| PortError::configuration(ConfigStep::EventMask, e))?;

    Ok(())
}
