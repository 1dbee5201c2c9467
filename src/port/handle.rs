//! Owned OS handles.

use std::io;
use std::mem;

use tracing::warn;

use crate::sys::{CommApi, RawHandle};

/// A device or event handle released exactly once: by [`OwnedHandle::close`]
/// when the caller wants the result, otherwise on drop.
#[derive(Debug)]
pub(crate) struct OwnedHandle<A: CommApi> {
    api: A,
    raw: RawHandle,
}

impl<A: CommApi> OwnedHandle<A> {
    pub(crate) fn new(api: A, raw: RawHandle) -> Self {
        Self { api, raw }
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Release the handle and report the outcome.
    pub(crate) fn close(mut self) -> io::Result<()> {
        let raw = mem::replace(&mut self.raw, RawHandle::INVALID);
        self.api.close_handle(raw)
    }
}

impl<A: CommApi> Drop for OwnedHandle<A> {
    fn drop(&mut self) {
        if !self.raw.is_valid() {
            return;
        }
        if let Err(err) = self.api.close_handle(self.raw) {
            warn!(handle = ?self.raw, error = %err, "failed to release handle");
        }
    }
}
