//! Overlapped transfer protocol.
//!
//! Each direction owns a [`Completion`]: a manual-reset event and the
//! operation block bound to it. A transfer runs
//!
//! ```text
//! Idle ──reset event──▶ Issued ──┬─ completed synchronously ─▶ Completed
//!                                ├─ ERROR_IO_PENDING ─▶ Pending ─┬─▶ Completed
//!                                │                               └─▶ Failed
//!                                └─ any other error ─▶ Failed
//! ```
//!
//! and the caller must hold the direction's lock for the whole run, so the
//! event and block are never shared between two in-flight operations.

use std::fmt;
use std::io;

use tracing::trace;

use super::error::PortError;
use super::handle::OwnedHandle;
use crate::sys::{CommApi, Overlapped, RawHandle, Started};

/// Transfer direction, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Completion signal for one direction.
#[derive(Debug)]
pub(crate) struct Completion<A: CommApi> {
    event: OwnedHandle<A>,
    overlapped: Overlapped,
}

impl<A: CommApi> Completion<A> {
    pub(crate) fn new(api: &A) -> Result<Self, PortError> {
        let raw = api.create_event().map_err(PortError::Resource)?;
        Ok(Self {
            event: OwnedHandle::new(api.clone(), raw),
            overlapped: Overlapped::with_event(raw),
        })
    }

    /// Release the event.
    pub(crate) fn close(self) -> io::Result<()> {
        self.event.close()
    }

    /// Read into `buf`. Reads at most `u32::MAX` bytes per call.
    pub(crate) fn read(
        &mut self,
        api: &A,
        device: RawHandle,
        buf: &mut [u8],
    ) -> Result<usize, PortError> {
        let len = clamp_len(buf.len());
        let ptr = buf.as_mut_ptr();
        // SAFETY: `buf` is borrowed for the whole transfer and `transfer`
        // does not return while the operation is outstanding.
        self.transfer(api, device, Direction::Read, |api, overlapped| unsafe {
            api.read_file(device, ptr, len, overlapped)
        })
    }

    /// Write from `data`. Writes at most `u32::MAX` bytes per call.
    pub(crate) fn write(
        &mut self,
        api: &A,
        device: RawHandle,
        data: &[u8],
    ) -> Result<usize, PortError> {
        let len = clamp_len(data.len());
        let ptr = data.as_ptr();
        // SAFETY: as for `read`.
        self.transfer(api, device, Direction::Write, |api, overlapped| unsafe {
            api.write_file(device, ptr, len, overlapped)
        })
    }

    fn transfer(
        &mut self,
        api: &A,
        device: RawHandle,
        direction: Direction,
        issue: impl FnOnce(&A, *mut Overlapped) -> Started,
    ) -> Result<usize, PortError> {
        api.reset_event(self.event.raw())
            .map_err(|e| PortError::io(0, e))?;
        self.overlapped.rearm();

        let overlapped: *mut Overlapped = &mut self.overlapped;
        match issue(api, overlapped) {
            Started::Complete(n) => {
                trace!(%direction, transferred = n, "completed synchronously");
                Ok(n as usize)
            }
            Started::Failed(failure) => {
                trace!(%direction, error = %failure.error, "failed to start");
                Err(failure.into())
            }
            Started::Pending => {
                trace!(%direction, "pending");
                // SAFETY: `overlapped` is the block the pending operation
                // was issued with, and `self` stays borrowed until it is
                // collected.
                match unsafe { api.wait_overlapped_result(device, overlapped) } {
                    Ok(n) => {
                        trace!(%direction, transferred = n, "completed");
                        Ok(n as usize)
                    }
                    Err(failure) => {
                        trace!(%direction, error = %failure.error, "failed while pending");
                        Err(failure.into())
                    }
                }
            }
        }
    }
}

/// The read and write completion signals, created together so neither is
/// leaked if the other cannot be.
#[derive(Debug)]
pub(crate) struct SignalPair<A: CommApi> {
    pub(crate) read: Completion<A>,
    pub(crate) write: Completion<A>,
}

impl<A: CommApi> SignalPair<A> {
    pub(crate) fn create(api: &A) -> Result<Self, PortError> {
        let read = Completion::new(api)?;
        let write = Completion::new(api)?;
        Ok(Self { read, write })
    }
}

fn clamp_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
