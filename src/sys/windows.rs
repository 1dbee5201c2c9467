//! `kernel32` bindings.
//!
//! The entry points are linked statically through `winapi`; there is no
//! runtime symbol lookup.

use std::ffi::OsStr;
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use winapi::shared::minwindef::{BOOL, DWORD, FALSE, LPCVOID, LPVOID, TRUE};
use winapi::shared::winerror::{ERROR_IO_PENDING, ERROR_NOT_FOUND};
use winapi::um::commapi::{PurgeComm, SetCommMask, SetCommState, SetCommTimeouts, SetupComm};
use winapi::um::fileapi::{CreateFileW, ReadFile, WriteFile, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::ioapiset::{CancelIoEx, GetOverlappedResult};
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::synchapi::{CreateEventW, ResetEvent};
use winapi::um::winbase::{COMMTIMEOUTS, DCB, FILE_FLAG_OVERLAPPED};
use winapi::um::winnt::{FILE_ATTRIBUTE_NORMAL, GENERIC_READ, GENERIC_WRITE, HANDLE};

use super::{CommApi, CommTimeouts, Dcb, Failure, Overlapped, RawHandle, Started};

const _: () = assert!(mem::size_of::<Dcb>() == mem::size_of::<DCB>());
const _: () = assert!(mem::size_of::<CommTimeouts>() == mem::size_of::<COMMTIMEOUTS>());
const _: () = assert!(mem::size_of::<Overlapped>() == mem::size_of::<OVERLAPPED>());
const _: () = assert!(mem::align_of::<Overlapped>() == mem::align_of::<OVERLAPPED>());

/// The real Win32 comm driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32;

fn handle(raw: RawHandle) -> HANDLE {
    raw.0 as HANDLE
}

fn check(ok: BOOL) -> io::Result<()> {
    if ok == FALSE {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn started(ok: BOOL, transferred: DWORD) -> Started {
    if ok != FALSE {
        return Started::Complete(transferred);
    }
    let error = io::Error::last_os_error();
    if error.raw_os_error() == Some(ERROR_IO_PENDING as i32) {
        Started::Pending
    } else {
        Started::Failed(Failure::new(transferred, error))
    }
}

impl CommApi for Win32 {
    fn create_file(&self, path: &str) -> io::Result<RawHandle> {
        let wide: Vec<u16> = OsStr::new(path).encode_wide().chain(Some(0)).collect();

        let device = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null_mut(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL | FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };

        if device == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        Ok(RawHandle(device as isize))
    }

    fn close_handle(&self, raw: RawHandle) -> io::Result<()> {
        check(unsafe { CloseHandle(handle(raw)) })
    }

    fn set_comm_state(&self, device: RawHandle, dcb: &Dcb) -> io::Result<()> {
        let mut dcb = *dcb;
        check(unsafe { SetCommState(handle(device), &mut dcb as *mut Dcb as *mut DCB) })
    }

    fn setup_comm(&self, device: RawHandle, in_queue: u32, out_queue: u32) -> io::Result<()> {
        check(unsafe { SetupComm(handle(device), in_queue, out_queue) })
    }

    fn set_comm_timeouts(&self, device: RawHandle, timeouts: &CommTimeouts) -> io::Result<()> {
        let mut timeouts = *timeouts;
        check(unsafe {
            SetCommTimeouts(
                handle(device),
                &mut timeouts as *mut CommTimeouts as *mut COMMTIMEOUTS,
            )
        })
    }

    fn set_comm_mask(&self, device: RawHandle, mask: u32) -> io::Result<()> {
        check(unsafe { SetCommMask(handle(device), mask) })
    }

    fn purge_comm(&self, device: RawHandle, flags: u32) -> io::Result<()> {
        check(unsafe { PurgeComm(handle(device), flags) })
    }

    fn cancel_io(&self, device: RawHandle) -> io::Result<()> {
        match check(unsafe { CancelIoEx(handle(device), ptr::null_mut()) }) {
            Err(err) if err.raw_os_error() == Some(ERROR_NOT_FOUND as i32) => Ok(()),
            other => other,
        }
    }

    fn create_event(&self) -> io::Result<RawHandle> {
        let event = unsafe { CreateEventW(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
        if event.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(RawHandle(event as isize))
    }

    fn reset_event(&self, event: RawHandle) -> io::Result<()> {
        check(unsafe { ResetEvent(handle(event)) })
    }

    unsafe fn read_file(
        &self,
        device: RawHandle,
        buf: *mut u8,
        len: u32,
        overlapped: *mut Overlapped,
    ) -> Started {
        let mut transferred: DWORD = 0;
        let ok = ReadFile(
            handle(device),
            buf as LPVOID,
            len,
            &mut transferred,
            overlapped as *mut OVERLAPPED,
        );
        started(ok, transferred)
    }

    unsafe fn write_file(
        &self,
        device: RawHandle,
        buf: *const u8,
        len: u32,
        overlapped: *mut Overlapped,
    ) -> Started {
        let mut transferred: DWORD = 0;
        let ok = WriteFile(
            handle(device),
            buf as LPCVOID,
            len,
            &mut transferred,
            overlapped as *mut OVERLAPPED,
        );
        started(ok, transferred)
    }

    unsafe fn wait_overlapped_result(
        &self,
        device: RawHandle,
        overlapped: *mut Overlapped,
    ) -> Result<u32, Failure> {
        let mut transferred: DWORD = 0;
        let ok = GetOverlappedResult(
            handle(device),
            overlapped as *mut OVERLAPPED,
            &mut transferred,
            TRUE,
        );
        if ok == FALSE {
            return Err(Failure::new(transferred, io::Error::last_os_error()));
        }
        Ok(transferred)
    }
}
