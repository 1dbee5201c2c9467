//! Fixed-layout mirrors of the Win32 structures the comm driver consumes.
//!
//! These are `#[repr(C)]` so they can be handed straight to `kernel32`
//! without conversion. Their sizes are pinned below; the Windows backend
//! additionally asserts they match the `winapi` definitions.

use std::mem;

/// `MAXDWORD`, used as a sentinel in several comm timeout fields.
pub const MAXDWORD: u32 = u32::MAX;

/// Win32 error codes the port logic distinguishes.
pub const ERROR_FILE_NOT_FOUND: i32 = 2;
pub const ERROR_ACCESS_DENIED: i32 = 5;
pub const ERROR_INVALID_HANDLE: i32 = 6;
pub const ERROR_NOT_ENOUGH_MEMORY: i32 = 8;
pub const ERROR_GEN_FAILURE: i32 = 31;
pub const ERROR_INVALID_PARAMETER: i32 = 87;
pub const ERROR_OPERATION_ABORTED: i32 = 995;
pub const ERROR_IO_PENDING: i32 = 997;

/// `SetCommMask`: a character was received and placed in the input buffer.
pub const EV_RXCHAR: u32 = 0x0001;

/// `PurgeComm` flags.
pub const PURGE_TXABORT: u32 = 0x0001;
pub const PURGE_RXABORT: u32 = 0x0002;
pub const PURGE_TXCLEAR: u32 = 0x0004;
pub const PURGE_RXCLEAR: u32 = 0x0008;

/// `DCB` bitfield: binary mode. Windows does not support non-binary transfers.
pub const DCB_BINARY: u32 = 0x0000_0001;
/// `DCB` bitfield: `fDtrControl = DTR_CONTROL_ENABLE`, raising DTR (and with
/// it the peer's DSR) for as long as the device is open.
pub const DCB_DTR_CONTROL_ENABLE: u32 = 0x0000_0010;

/// Raw OS handle value.
///
/// Pointer sized, so it can occupy the `HANDLE` slot of [`Overlapped`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub isize);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);
    pub const INVALID: RawHandle = RawHandle(-1);

    /// Whether this value can refer to an open object.
    pub fn is_valid(self) -> bool {
        self != Self::NULL && self != Self::INVALID
    }
}

/// Device control block (`DCB`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dcb {
    pub dcb_length: u32,
    pub baud_rate: u32,
    pub flags: u32,
    pub reserved: u16,
    pub xon_lim: u16,
    pub xoff_lim: u16,
    pub byte_size: u8,
    pub parity: u8,
    pub stop_bits: u8,
    pub xon_char: u8,
    pub xoff_char: u8,
    pub error_char: u8,
    pub eof_char: u8,
    pub evt_char: u8,
    pub reserved1: u16,
}

/// `COMMTIMEOUTS`. All values in milliseconds.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommTimeouts {
    pub read_interval_timeout: u32,
    pub read_total_timeout_multiplier: u32,
    pub read_total_timeout_constant: u32,
    pub write_total_timeout_multiplier: u32,
    pub write_total_timeout_constant: u32,
}

/// `OVERLAPPED`.
///
/// `internal` / `internal_high` belong to the driver while an operation is in
/// flight; the structure must not move until the operation's completion has
/// been collected.
#[repr(C)]
#[derive(Debug)]
pub struct Overlapped {
    pub internal: usize,
    pub internal_high: usize,
    pub offset: u32,
    pub offset_high: u32,
    pub event: RawHandle,
}

impl Overlapped {
    /// A zeroed operation block that signals `event` on completion.
    pub fn with_event(event: RawHandle) -> Self {
        Self {
            internal: 0,
            internal_high: 0,
            offset: 0,
            offset_high: 0,
            event,
        }
    }

    /// Clear the driver-owned fields before the block is reused.
    pub fn rearm(&mut self) {
        self.internal = 0;
        self.internal_high = 0;
        self.offset = 0;
        self.offset_high = 0;
    }
}

const _: () = assert!(mem::size_of::<Dcb>() == 28);
const _: () = assert!(mem::size_of::<CommTimeouts>() == 20);
const _: () = assert!(mem::size_of::<Overlapped>() == 3 * mem::size_of::<usize>() + 8);
const _: () = assert!(mem::size_of::<RawHandle>() == mem::size_of::<usize>());
