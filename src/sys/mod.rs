//! Comm driver entry points.
//!
//! [`CommApi`] is the seam between the port logic and the operating system:
//! one method per `kernel32` call the port issues. [`windows::Win32`] binds
//! it to the real system library; [`sim::SimComm`] is an in-process driver
//! with the same overlapped semantics, used to exercise the port without
//! hardware.

pub mod abi;
pub mod sim;

#[cfg(windows)]
pub mod windows;

use std::fmt;
use std::io;

pub use abi::{CommTimeouts, Dcb, Overlapped, RawHandle};

/// A failed transfer, with whatever byte count the driver reported.
#[derive(Debug)]
pub struct Failure {
    pub transferred: u32,
    pub error: io::Error,
}

impl Failure {
    pub fn new(transferred: u32, error: io::Error) -> Self {
        Self { transferred, error }
    }
}

/// Outcome of starting an overlapped `ReadFile`/`WriteFile`.
#[derive(Debug)]
pub enum Started {
    /// The driver finished synchronously with this many bytes.
    Complete(u32),
    /// `ERROR_IO_PENDING`: completion will be signalled through the event in
    /// the operation block.
    Pending,
    /// Any other failure.
    Failed(Failure),
}

/// The `kernel32` surface used by a serial port.
///
/// Every method maps onto exactly one system call. Implementations must be
/// callable from several threads at once; the port guarantees that at most
/// one read and one write are outstanding per device.
pub trait CommApi: Clone + Send + Sync + fmt::Debug + 'static {
    /// `CreateFileW` with read/write access, no sharing, overlapped mode.
    fn create_file(&self, path: &str) -> io::Result<RawHandle>;

    /// `CloseHandle` for devices and events alike.
    fn close_handle(&self, handle: RawHandle) -> io::Result<()>;

    /// `SetCommState`.
    fn set_comm_state(&self, device: RawHandle, dcb: &Dcb) -> io::Result<()>;

    /// `SetupComm`.
    fn setup_comm(&self, device: RawHandle, in_queue: u32, out_queue: u32) -> io::Result<()>;

    /// `SetCommTimeouts`.
    fn set_comm_timeouts(&self, device: RawHandle, timeouts: &CommTimeouts) -> io::Result<()>;

    /// `SetCommMask`.
    fn set_comm_mask(&self, device: RawHandle, mask: u32) -> io::Result<()>;

    /// `PurgeComm`.
    fn purge_comm(&self, device: RawHandle, flags: u32) -> io::Result<()>;

    /// `CancelIoEx(device, NULL)`: cancel every outstanding operation on the
    /// device, whichever thread issued it. Nothing to cancel is not an error.
    fn cancel_io(&self, device: RawHandle) -> io::Result<()>;

    /// `CreateEventW`: manual reset, initially unsignalled, unnamed.
    fn create_event(&self) -> io::Result<RawHandle>;

    /// `ResetEvent`.
    fn reset_event(&self, event: RawHandle) -> io::Result<()>;

    /// `ReadFile` in overlapped mode.
    ///
    /// # Safety
    ///
    /// `buf` must be valid for `len` byte writes and `overlapped` must point
    /// to an operation block whose `event` is an open event. If the call
    /// returns [`Started::Pending`], neither may be moved, freed or touched
    /// until [`CommApi::wait_overlapped_result`] has returned for it.
    unsafe fn read_file(
        &self,
        device: RawHandle,
        buf: *mut u8,
        len: u32,
        overlapped: *mut Overlapped,
    ) -> Started;

    /// `WriteFile` in overlapped mode.
    ///
    /// # Safety
    ///
    /// Same contract as [`CommApi::read_file`], with `buf` valid for `len`
    /// byte reads.
    unsafe fn write_file(
        &self,
        device: RawHandle,
        buf: *const u8,
        len: u32,
        overlapped: *mut Overlapped,
    ) -> Started;

    /// `GetOverlappedResult(bWait = TRUE)`: block until the operation bound
    /// to `overlapped` completes and return its byte count.
    ///
    /// # Safety
    ///
    /// `overlapped` must be the block passed to the pending operation.
    unsafe fn wait_overlapped_result(
        &self,
        device: RawHandle,
        overlapped: *mut Overlapped,
    ) -> Result<u32, Failure>;
}

/// Build an `io::Error` from a Win32 error code.
pub(crate) fn os_error(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}
