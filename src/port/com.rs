//! Overlapped serial port.
//!
//! [`Port`] turns the driver's overlapped I/O into blocking calls that are
//! safe to make from several threads at once. Reads and writes each have
//! their own lock and completion signal, so a read and a write can be in
//! flight together while two reads (or two writes) are strictly ordered.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::{ConfigStep, PortError};
use super::handle::OwnedHandle;
use super::line;
use super::overlapped::{Completion, SignalPair};
use super::traits::{PortSettings, SerialPortAdapter};
use crate::sys::abi::{PURGE_RXABORT, PURGE_RXCLEAR, PURGE_TXABORT, PURGE_TXCLEAR};
use crate::sys::{CommApi, RawHandle};

#[cfg(windows)]
use crate::sys::windows::Win32;

/// `PurgeComm` flags used by [`Port::flush`].
const PURGE_ALL: u32 = PURGE_TXABORT | PURGE_RXABORT | PURGE_TXCLEAR | PURGE_RXCLEAR;

/// How long `close` waits for in-flight calls to return before cancelling
/// again.
const CANCEL_RETRY: Duration = Duration::from_millis(10);

/// Device path for a port name.
///
/// Plain names such as `COM3` or `COM12` are placed in the device namespace
/// (`\\.\COM12`); names that already start with a backslash are used as
/// given.
///
/// ```
/// use overlapped_serial::device_path;
///
/// assert_eq!(device_path("COM12"), r"\\.\COM12");
/// assert_eq!(device_path(r"\\.\CNCA0"), r"\\.\CNCA0");
/// ```
pub fn device_path(name: &str) -> String {
    if name.starts_with('\\') {
        name.to_string()
    } else {
        format!(r"\\.\{name}")
    }
}

/// A serial port opened in overlapped mode.
///
/// All operations take `&self`; share the port between threads with an
/// `Arc`. Reads honour the read timeout from [`PortSettings`]; writes block
/// until the driver has accepted every byte.
#[derive(Debug)]
pub struct Port<A: CommApi> {
    api: A,
    name: String,
    settings: Mutex<PortSettings>,
    // Shared by every in-flight operation; taken exclusively only by close.
    device: RwLock<Option<OwnedHandle<A>>>,
    closing: AtomicBool,
    reader: Mutex<Option<Completion<A>>>,
    writer: Mutex<Option<Completion<A>>>,
}

/// A port on the Windows comm driver.
#[cfg(windows)]
pub type ComPort = Port<Win32>;

#[cfg(windows)]
impl Port<Win32> {
    /// Open a serial port by name (`COM3`, `\\.\COM12`, ...).
    ///
    /// # Example
    /// ```no_run
    /// use overlapped_serial::{Port, PortSettings};
    ///
    /// let port = Port::open("COM3", &PortSettings::new(115_200))?;
    /// port.write(b"ATZ\r")?;
    /// # Ok::<(), overlapped_serial::PortError>(())
    /// ```
    pub fn open(name: &str, settings: &PortSettings) -> Result<Self, PortError> {
        Self::open_with(Win32, name, settings)
    }
}

impl<A: CommApi> Port<A> {
    /// Open a serial port through the given driver.
    ///
    /// Settings are checked before the device is touched. Each resource
    /// acquired along the way is released again if a later step fails.
    pub fn open_with(api: A, name: &str, settings: &PortSettings) -> Result<Self, PortError> {
        let dcb = line::control_block(settings)?;
        let timeouts = line::read_timeouts(settings.read_timeout);

        let path = device_path(name);
        let raw = api.create_file(&path).map_err(|source| {
            warn!(port = %path, error = %source, "failed to open device");
            PortError::DeviceOpen {
                name: path.clone(),
                source,
            }
        })?;
        let device = OwnedHandle::new(api.clone(), raw);
        debug!(port = %path, handle = ?raw, "device opened");

        if let Err(err) = line::configure(&api, device.raw(), &dcb, &timeouts) {
            warn!(port = %path, error = %err, "failed to configure device");
            return Err(err);
        }
        let signals = SignalPair::create(&api)?;

        info!(port = %path, settings = %settings, "serial port ready");
        Ok(Self {
            api,
            name: name.to_string(),
            settings: Mutex::new(settings.clone()),
            device: RwLock::new(Some(device)),
            closing: AtomicBool::new(false),
            reader: Mutex::new(Some(signals.read)),
            writer: Mutex::new(Some(signals.write)),
        })
    }

    /// The name the port was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current line settings.
    pub fn settings(&self) -> PortSettings {
        self.settings.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Read whatever is available, up to `buf.len()` bytes.
    ///
    /// Returns as soon as at least one byte has arrived. With a non-zero read
    /// timeout, returns `Ok(0)` once the timeout passes with nothing received;
    /// with a zero timeout, waits for data.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, PortError> {
        self.with_device(|device| {
            let mut reader = self.reader.lock();
            let completion = reader.as_mut().ok_or(PortError::Closed)?;
            completion.read(&self.api, device, buf)
        })
    }

    /// Write `data`, blocking until the driver reports completion.
    ///
    /// Concurrent writes are serialized, so each caller's bytes reach the wire
    /// contiguously.
    pub fn write(&self, data: &[u8]) -> Result<usize, PortError> {
        self.with_device(|device| {
            let mut writer = self.writer.lock();
            let completion = writer.as_mut().ok_or(PortError::Closed)?;
            completion.write(&self.api, device, data)
        })
    }

    /// Discard unsent output and unread input.
    ///
    /// Does not wait for in-flight calls: a read or write running at the same
    /// time is aborted and returns [`PortError::Aborted`].
    pub fn flush(&self) -> Result<(), PortError> {
        self.with_device(|device| {
            self.api
                .purge_comm(device, PURGE_ALL)
                .map_err(|e| PortError::io(0, e))?;
            debug!(port = %self.name, "buffers purged");
            Ok(())
        })
    }

    /// Change the read timeout. Applies to reads started afterwards.
    pub fn set_read_timeout(&self, timeout: Duration) -> Result<(), PortError> {
        let timeouts = line::read_timeouts(timeout);
        self.with_device(|device| {
            self.api
                .set_comm_timeouts(device, &timeouts)
                .map_err(|e| PortError::configuration(ConfigStep::Timeouts, e))
        })?;
        self.settings.lock().read_timeout = timeout;
        debug!(port = %self.name, ?timeout, "read timeout changed");
        Ok(())
    }

    /// Close the port.
    ///
    /// Calls blocked in `read` or `write` are cancelled and return
    /// [`PortError::Aborted`]; later calls return [`PortError::Closed`].
    /// The device and both completion events are released even if one of
    /// the releases fails, and the first failure is returned. Closing twice
    /// returns [`PortError::Closed`].
    pub fn close(&self) -> Result<(), PortError> {
        if self.closing.swap(true, Ordering::AcqRel) {
            return Err(PortError::Closed);
        }

        let raw = match self.device.read().as_ref() {
            Some(handle) => handle.raw(),
            None => return Err(PortError::Closed),
        };

        // Keep cancelling until every in-flight call has let go of the
        // device, catching calls that were issued after a previous cancel.
        let mut cancel_failed = false;
        let mut device = loop {
            match self.api.cancel_io(raw) {
                Err(err) if !cancel_failed => {
                    warn!(port = %self.name, error = %err, "failed to cancel pending I/O, retrying");
                    cancel_failed = true;
                }
                Err(_) => {}
                Ok(()) if cancel_failed => {
                    debug!(port = %self.name, "pending I/O cancelled after retry");
                    cancel_failed = false;
                }
                Ok(()) => {}
            }
            if let Some(guard) = self.device.try_write_for(CANCEL_RETRY) {
                break guard;
            }
        };
        let handle = device.take();
        drop(device);

        let reader = self.reader.lock().take();
        let writer = self.writer.lock().take();

        let mut first_error = None;
        let releases = handle
            .map(OwnedHandle::close)
            .into_iter()
            .chain(reader.map(Completion::close))
            .chain(writer.map(Completion::close));
        for result in releases {
            if let Err(err) = result {
                warn!(port = %self.name, error = %err, "failed to release handle");
                first_error.get_or_insert(err);
            }
        }

        info!(port = %self.name, "serial port closed");
        match first_error {
            Some(err) => Err(PortError::io(0, err)),
            None => Ok(()),
        }
    }

    fn with_device<R>(
        &self,
        f: impl FnOnce(RawHandle) -> Result<R, PortError>,
    ) -> Result<R, PortError> {
        let device = self.device.read();
        match device.as_ref() {
            Some(handle) if !self.closing.load(Ordering::Acquire) => f(handle.raw()),
            _ => Err(PortError::Closed),
        }
    }
}

impl<A: CommApi> Drop for Port<A> {
    fn drop(&mut self) {
        match self.close() {
            Ok(()) | Err(PortError::Closed) => {}
            Err(err) => warn!(port = %self.name, error = %err, "error closing port on drop"),
        }
    }
}

/// `io::Read` treats `Ok(0)` as end of file, so a read timeout surfaces as
/// [`io::ErrorKind::TimedOut`] instead.
fn read_or_timeout<A: CommApi>(port: &Port<A>, buf: &mut [u8]) -> io::Result<usize> {
    match Port::read(port, buf) {
        Ok(0) if !buf.is_empty() => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "Operation timed out",
        )),
        Ok(n) => Ok(n),
        Err(err) => Err(io::Error::from(err)),
    }
}

impl<A: CommApi> io::Read for &Port<A> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        read_or_timeout(self, buf)
    }
}

impl<A: CommApi> io::Write for &Port<A> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Port::write(*self, buf).map_err(io::Error::from)
    }

    /// Writes finish before `write` returns, so there is nothing to push.
    /// Use [`Port::flush`] to discard buffered data.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<A: CommApi> io::Read for Port<A> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        read_or_timeout(self, buf)
    }
}

impl<A: CommApi> io::Write for Port<A> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Port::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<A: CommApi> SerialPortAdapter for Port<A> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        Port::write(self, data)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        Port::read(self, buffer)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.set_read_timeout(timeout)
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        Port::flush(self)
    }
}
