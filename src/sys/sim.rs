//! In-process comm driver.
//!
//! `SimComm` implements [`CommApi`] without an operating system underneath.
//! Devices are registered by name and wired either to nothing, back to
//! themselves (a loopback plug), or to a peer device (a null-modem pair).
//!
//! The driver keeps the overlapped contract the port relies on:
//!
//! - reads complete immediately when input is queued, otherwise they go
//!   pending and are completed from a driver thread when data arrives, the
//!   `COMMTIMEOUTS` deadline passes, or the operation is aborted;
//! - writes always go pending and trickle onto the wire one byte at a time;
//! - `PurgeComm` abort flags, `CancelIoEx` and closing the device complete
//!   outstanding operations with `ERROR_OPERATION_ABORTED`;
//! - completion is published through the block's event, and the byte count
//!   and status through its `internal` fields (holding a Win32 code rather
//!   than an NTSTATUS).
//!
//! Reads return as soon as any byte is available, whatever the interval
//! timeout says. Every call is logged and faults can be injected per call.
//!
//! # Example
//! ```
//! use overlapped_serial::sys::sim::SimComm;
//! use overlapped_serial::{Port, PortSettings};
//!
//! let sim = SimComm::new();
//! sim.add_pair("CNCA0", "CNCB0");
//!
//! let settings = PortSettings::default();
//! let a = Port::open_with(sim.clone(), "CNCA0", &settings)?;
//! let b = Port::open_with(sim.clone(), "CNCB0", &settings)?;
//!
//! a.write(b"AT\r")?;
//! let mut buf = [0u8; 3];
//! let mut got = 0;
//! while got < buf.len() {
//!     got += b.read(&mut buf[got..])?;
//! }
//! assert_eq!(&buf, b"AT\r");
//! # Ok::<(), overlapped_serial::PortError>(())
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::mem;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

use super::abi::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_INVALID_HANDLE, ERROR_INVALID_PARAMETER,
    ERROR_OPERATION_ABORTED, MAXDWORD, PURGE_RXABORT, PURGE_RXCLEAR, PURGE_TXABORT,
};
use super::{os_error, CommApi, CommTimeouts, Dcb, Failure, Overlapped, RawHandle, Started};
use crate::port::device_path;

/// `STATUS_PENDING`, parked in `Overlapped::internal` while a transfer runs.
const STATUS_PENDING: usize = 0x103;

/// Driver entry points, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimCall {
    CreateFile,
    CloseHandle,
    SetCommState,
    SetupComm,
    SetCommTimeouts,
    SetCommMask,
    PurgeComm,
    CancelIo,
    CreateEvent,
    ResetEvent,
    ReadFile,
    WriteFile,
    GetOverlappedResult,
}

/// Driver-side view of a device, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub open: bool,
    pub dcb: Option<Dcb>,
    pub timeouts: Option<CommTimeouts>,
    pub queue_sizes: Option<(u32, u32)>,
    pub event_mask: u32,
    pub pending_input: usize,
}

/// Simulated comm driver. Cloning yields another handle to the same driver.
#[derive(Debug, Clone, Default)]
pub struct SimComm {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    table: Mutex<Table>,
    next_handle: AtomicIsize,
}

#[derive(Debug, Default)]
struct Table {
    devices: HashMap<String, Arc<Device>>,
    handles: HashMap<RawHandle, Object>,
    calls: Vec<SimCall>,
    faults: Vec<Fault>,
}

#[derive(Debug, Clone)]
enum Object {
    Device(Arc<Device>),
    Event(Arc<Event>),
}

#[derive(Debug)]
struct Fault {
    call: SimCall,
    skip: usize,
    code: i32,
}

/// Where a device's transmitted bytes end up.
#[derive(Debug, Clone)]
enum Wiring {
    Unconnected,
    Loopback,
    Peer(String),
}

#[derive(Debug)]
struct Device {
    wiring: Wiring,
    line: Mutex<Line>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct Line {
    open: bool,
    rx: VecDeque<u8>,
    transmitted: Vec<u8>,
    dcb: Option<Dcb>,
    timeouts: Option<CommTimeouts>,
    queue_sizes: Option<(u32, u32)>,
    event_mask: u32,
    // Bumped by every abort; an operation started under an older value is
    // finished with ERROR_OPERATION_ABORTED.
    rx_epoch: u64,
    tx_epoch: u64,
}

#[derive(Debug, Default)]
struct Event {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    fn set(&self) {
        *self.signaled.lock() = true;
        self.cond.notify_all();
    }

    fn reset(&self) {
        *self.signaled.lock() = false;
    }

    fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
    }
}

impl Device {
    fn new(wiring: Wiring) -> Self {
        Self {
            wiring,
            line: Mutex::new(Line::default()),
            ready: Condvar::new(),
        }
    }

    /// Bytes arriving on the wire. Dropped if nobody has the device open.
    fn receive(&self, bytes: &[u8]) {
        let mut line = self.line.lock();
        if line.open {
            line.rx.extend(bytes);
            self.ready.notify_all();
        }
    }
}

impl Table {
    fn take_fault(&mut self, call: SimCall) -> Option<i32> {
        let idx = self.faults.iter().position(|f| f.call == call)?;
        if self.faults[idx].skip > 0 {
            self.faults[idx].skip -= 1;
            return None;
        }
        Some(self.faults.remove(idx).code)
    }

    fn device(&self, handle: RawHandle) -> io::Result<Arc<Device>> {
        match self.handles.get(&handle) {
            Some(Object::Device(device)) => Ok(device.clone()),
            _ => Err(os_error(ERROR_INVALID_HANDLE)),
        }
    }

    fn event(&self, handle: RawHandle) -> io::Result<Arc<Event>> {
        match self.handles.get(&handle) {
            Some(Object::Event(event)) => Ok(event.clone()),
            _ => Err(os_error(ERROR_INVALID_HANDLE)),
        }
    }

    fn named(&self, name: &str) -> Option<Arc<Device>> {
        self.devices.get(&device_path(name)).cloned()
    }
}

impl SimComm {
    /// An empty driver with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device whose transmitted bytes go nowhere (see
    /// [`SimComm::transmitted`]).
    pub fn add_device(&self, name: &str) {
        self.register(name, Wiring::Unconnected);
    }

    /// Register a device with its TX line wired back to its own RX.
    pub fn add_loopback(&self, name: &str) {
        self.register(name, Wiring::Loopback);
    }

    /// Register two devices connected by a null-modem cable.
    pub fn add_pair(&self, a: &str, b: &str) {
        self.register(a, Wiring::Peer(device_path(b)));
        self.register(b, Wiring::Peer(device_path(a)));
    }

    fn register(&self, name: &str, wiring: Wiring) {
        let mut table = self.shared.table.lock();
        table
            .devices
            .insert(device_path(name), Arc::new(Device::new(wiring)));
    }

    /// Deliver bytes to a device's input queue as if they came off the wire.
    pub fn feed(&self, name: &str, bytes: &[u8]) {
        let device = self.shared.table.lock().named(name);
        if let Some(device) = device {
            device.receive(bytes);
        }
    }

    /// Everything the device has put on the wire since it was registered, in
    /// wire order.
    pub fn transmitted(&self, name: &str) -> Vec<u8> {
        let device = self.shared.table.lock().named(name);
        device
            .map(|d| d.line.lock().transmitted.clone())
            .unwrap_or_default()
    }

    /// Driver state of a device, or `None` if no such device is registered.
    pub fn snapshot(&self, name: &str) -> Option<DeviceSnapshot> {
        let device = self.shared.table.lock().named(name)?;
        let line = device.line.lock();
        Some(DeviceSnapshot {
            open: line.open,
            dcb: line.dcb,
            timeouts: line.timeouts,
            queue_sizes: line.queue_sizes,
            event_mask: line.event_mask,
            pending_input: line.rx.len(),
        })
    }

    /// Every driver call made so far, in order.
    pub fn calls(&self) -> Vec<SimCall> {
        self.shared.table.lock().calls.clone()
    }

    /// How many times `call` has been made.
    pub fn count(&self, call: SimCall) -> usize {
        self.shared
            .table
            .lock()
            .calls
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    pub fn clear_calls(&self) {
        self.shared.table.lock().calls.clear();
    }

    /// Number of device and event handles currently open.
    pub fn open_handles(&self) -> usize {
        self.shared.table.lock().handles.len()
    }

    /// Make the next `call` fail with the Win32 error `code`.
    pub fn fail_next(&self, call: SimCall, code: i32) {
        self.fail_after(call, 0, code);
    }

    /// Let `skip` calls of `call` through, then fail the next one with `code`.
    pub fn fail_after(&self, call: SimCall, skip: usize, code: i32) {
        self.shared
            .table
            .lock()
            .faults
            .push(Fault { call, skip, code });
    }

    fn alloc(&self) -> RawHandle {
        RawHandle(0x100 + 4 * self.shared.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Log the call and report an injected fault, if any.
    fn begin(&self, call: SimCall) -> (MutexGuard<'_, Table>, Option<i32>) {
        let mut table = self.shared.table.lock();
        table.calls.push(call);
        let fault = table.take_fault(call);
        (table, fault)
    }

    fn enter(&self, call: SimCall) -> io::Result<MutexGuard<'_, Table>> {
        match self.begin(call) {
            (_, Some(code)) => Err(os_error(code)),
            (table, None) => Ok(table),
        }
    }

    fn with_line<R>(
        &self,
        call: SimCall,
        device: RawHandle,
        f: impl FnOnce(&Device, &mut Line) -> io::Result<R>,
    ) -> io::Result<R> {
        let device = self.enter(call)?.device(device)?;
        let mut line = device.line.lock();
        f(&*device, &mut *line)
    }
}

impl CommApi for SimComm {
    fn create_file(&self, path: &str) -> io::Result<RawHandle> {
        let mut table = self.enter(SimCall::CreateFile)?;
        let device = table
            .devices
            .get(path)
            .cloned()
            .ok_or_else(|| os_error(ERROR_FILE_NOT_FOUND))?;

        {
            let mut line = device.line.lock();
            if line.open {
                return Err(os_error(ERROR_ACCESS_DENIED));
            }
            line.open = true;
            line.rx.clear();
            line.dcb = None;
            line.timeouts = None;
            line.queue_sizes = None;
            line.event_mask = 0;
        }

        let handle = self.alloc();
        table.handles.insert(handle, Object::Device(device));
        trace!(path, ?handle, "sim device opened");
        Ok(handle)
    }

    fn close_handle(&self, handle: RawHandle) -> io::Result<()> {
        // A reported failure still releases the handle.
        let (mut table, fault) = self.begin(SimCall::CloseHandle);
        match table.handles.remove(&handle) {
            Some(Object::Device(device)) => {
                let mut line = device.line.lock();
                line.open = false;
                line.rx.clear();
                line.rx_epoch += 1;
                line.tx_epoch += 1;
                device.ready.notify_all();
            }
            Some(Object::Event(_)) => {}
            None => return Err(os_error(ERROR_INVALID_HANDLE)),
        }
        fault.map_or(Ok(()), |code| Err(os_error(code)))
    }

    fn set_comm_state(&self, device: RawHandle, dcb: &Dcb) -> io::Result<()> {
        self.with_line(SimCall::SetCommState, device, |_, line| {
            let valid = dcb.dcb_length as usize == mem::size_of::<Dcb>()
                && dcb.baud_rate > 0
                && (5..=8).contains(&dcb.byte_size)
                && dcb.parity <= 4
                && dcb.stop_bits <= 2;
            if !valid {
                return Err(os_error(ERROR_INVALID_PARAMETER));
            }
            line.dcb = Some(*dcb);
            Ok(())
        })
    }

    fn setup_comm(&self, device: RawHandle, in_queue: u32, out_queue: u32) -> io::Result<()> {
        self.with_line(SimCall::SetupComm, device, |_, line| {
            line.queue_sizes = Some((in_queue, out_queue));
            Ok(())
        })
    }

    fn set_comm_timeouts(&self, device: RawHandle, timeouts: &CommTimeouts) -> io::Result<()> {
        self.with_line(SimCall::SetCommTimeouts, device, |_, line| {
            // Same restriction the real driver documents.
            if timeouts.read_interval_timeout == MAXDWORD
                && timeouts.read_total_timeout_multiplier == MAXDWORD
                && timeouts.read_total_timeout_constant == MAXDWORD
            {
                return Err(os_error(ERROR_INVALID_PARAMETER));
            }
            line.timeouts = Some(*timeouts);
            Ok(())
        })
    }

    fn set_comm_mask(&self, device: RawHandle, mask: u32) -> io::Result<()> {
        self.with_line(SimCall::SetCommMask, device, |_, line| {
            line.event_mask = mask;
            Ok(())
        })
    }

    fn purge_comm(&self, device: RawHandle, flags: u32) -> io::Result<()> {
        self.with_line(SimCall::PurgeComm, device, |device, line| {
            if flags & PURGE_RXABORT != 0 {
                line.rx_epoch += 1;
            }
            if flags & PURGE_TXABORT != 0 {
                line.tx_epoch += 1;
            }
            if flags & PURGE_RXCLEAR != 0 {
                line.rx.clear();
            }
            device.ready.notify_all();
            Ok(())
        })
    }

    fn cancel_io(&self, device: RawHandle) -> io::Result<()> {
        self.with_line(SimCall::CancelIo, device, |device, line| {
            line.rx_epoch += 1;
            line.tx_epoch += 1;
            device.ready.notify_all();
            Ok(())
        })
    }

    fn create_event(&self) -> io::Result<RawHandle> {
        let mut table = self.enter(SimCall::CreateEvent)?;
        let handle = self.alloc();
        table
            .handles
            .insert(handle, Object::Event(Arc::new(Event::default())));
        Ok(handle)
    }

    fn reset_event(&self, event: RawHandle) -> io::Result<()> {
        self.enter(SimCall::ResetEvent)?.event(event)?.reset();
        Ok(())
    }

    unsafe fn read_file(
        &self,
        device: RawHandle,
        buf: *mut u8,
        len: u32,
        overlapped: *mut Overlapped,
    ) -> Started {
        let event_handle = (*overlapped).event;
        let lookup = self
            .enter(SimCall::ReadFile)
            .and_then(|table| Ok((table.device(device)?, table.event(event_handle)?)));
        let (device, event) = match lookup {
            Ok(objects) => objects,
            Err(error) => return Started::Failed(Failure::new(0, error)),
        };

        let mut line = device.line.lock();
        let timeouts = line.timeouts.unwrap_or_default();
        if len == 0 || !line.rx.is_empty() || returns_immediately(&timeouts) {
            let n = drain_into(&mut line.rx, buf, len);
            drop(line);
            complete(overlapped, &event, n, 0);
            return Started::Complete(n);
        }

        let pending = PendingRead {
            device: device.clone(),
            event,
            buf: SendPtr(buf),
            len,
            overlapped: SendPtr(overlapped),
            deadline: read_deadline(&timeouts, len),
            epoch: line.rx_epoch,
        };
        drop(line);

        (*overlapped).internal = STATUS_PENDING;
        (*overlapped).internal_high = 0;
        thread::spawn(move || pending.run());
        Started::Pending
    }

    unsafe fn write_file(
        &self,
        device: RawHandle,
        buf: *const u8,
        len: u32,
        overlapped: *mut Overlapped,
    ) -> Started {
        let event_handle = (*overlapped).event;
        let lookup = self.enter(SimCall::WriteFile).and_then(|table| {
            let device = table.device(device)?;
            let event = table.event(event_handle)?;
            let sink = match &device.wiring {
                Wiring::Unconnected => None,
                Wiring::Loopback => Some(device.clone()),
                Wiring::Peer(path) => table.devices.get(path).cloned(),
            };
            Ok((device, event, sink))
        });
        let (device, event, sink) = match lookup {
            Ok(objects) => objects,
            Err(error) => return Started::Failed(Failure::new(0, error)),
        };

        if len == 0 {
            complete(overlapped, &event, 0, 0);
            return Started::Complete(0);
        }

        let epoch = device.line.lock().tx_epoch;
        let pending = PendingWrite {
            device,
            sink,
            event,
            data: std::slice::from_raw_parts(buf, len as usize).to_vec(),
            overlapped: SendPtr(overlapped),
            epoch,
        };

        (*overlapped).internal = STATUS_PENDING;
        (*overlapped).internal_high = 0;
        thread::spawn(move || pending.run());
        Started::Pending
    }

    unsafe fn wait_overlapped_result(
        &self,
        device: RawHandle,
        overlapped: *mut Overlapped,
    ) -> Result<u32, Failure> {
        let event_handle = (*overlapped).event;
        let (event, fault) = {
            let (table, fault) = self.begin(SimCall::GetOverlappedResult);
            let event = table
                .device(device)
                .and_then(|_| table.event(event_handle))
                .map_err(|error| Failure::new(0, error))?;
            (event, fault)
        };

        // Even an injected failure waits, so the operation never outlives
        // the caller's buffer.
        event.wait();

        let transferred = (*overlapped).internal_high as u32;
        if let Some(code) = fault {
            return Err(Failure::new(transferred, os_error(code)));
        }
        match (*overlapped).internal {
            0 => Ok(transferred),
            code => Err(Failure::new(transferred, os_error(code as i32))),
        }
    }
}

struct SendPtr<T>(*mut T);

// SAFETY: the pointee is owned by a caller blocked on (or about to block on)
// the operation's completion, which this driver signals only after its last
// access.
unsafe impl<T> Send for SendPtr<T> {}

struct PendingRead {
    device: Arc<Device>,
    event: Arc<Event>,
    buf: SendPtr<u8>,
    len: u32,
    overlapped: SendPtr<Overlapped>,
    deadline: Option<Instant>,
    epoch: u64,
}

impl PendingRead {
    fn run(self) {
        let (n, status) = {
            let mut line = self.device.line.lock();
            loop {
                if !line.open || line.rx_epoch != self.epoch {
                    break (0, ERROR_OPERATION_ABORTED);
                }
                if !line.rx.is_empty() {
                    break (unsafe { drain_into(&mut line.rx, self.buf.0, self.len) }, 0);
                }
                match self.deadline {
                    Some(deadline) if Instant::now() >= deadline => break (0, 0),
                    Some(deadline) => {
                        self.device.ready.wait_until(&mut line, deadline);
                    }
                    None => self.device.ready.wait(&mut line),
                }
            }
        };
        unsafe { complete(self.overlapped.0, &self.event, n, status) };
    }
}

struct PendingWrite {
    device: Arc<Device>,
    sink: Option<Arc<Device>>,
    event: Arc<Event>,
    data: Vec<u8>,
    overlapped: SendPtr<Overlapped>,
    epoch: u64,
}

impl PendingWrite {
    fn run(self) {
        let mut sent = 0u32;
        let mut status = 0;
        for byte in &self.data {
            {
                let mut line = self.device.line.lock();
                if !line.open || line.tx_epoch != self.epoch {
                    status = ERROR_OPERATION_ABORTED;
                    break;
                }
                line.transmitted.push(*byte);
            }
            if let Some(sink) = &self.sink {
                sink.receive(std::slice::from_ref(byte));
            }
            sent += 1;
            thread::yield_now();
        }
        unsafe { complete(self.overlapped.0, &self.event, sent, status) };
    }
}

/// Publish a result through the operation block and signal its event.
unsafe fn complete(overlapped: *mut Overlapped, event: &Event, transferred: u32, status: i32) {
    (*overlapped).internal = status as usize;
    (*overlapped).internal_high = transferred as usize;
    event.set();
}

unsafe fn drain_into(rx: &mut VecDeque<u8>, buf: *mut u8, len: u32) -> u32 {
    let n = rx.len().min(len as usize);
    for (i, byte) in rx.drain(..n).enumerate() {
        buf.add(i).write(byte);
    }
    n as u32
}

/// `ReadIntervalTimeout = MAXDWORD` with both totals zero: return whatever
/// is queued, even nothing.
fn returns_immediately(timeouts: &CommTimeouts) -> bool {
    timeouts.read_interval_timeout == MAXDWORD
        && timeouts.read_total_timeout_multiplier == 0
        && timeouts.read_total_timeout_constant == 0
}

fn read_deadline(timeouts: &CommTimeouts, len: u32) -> Option<Instant> {
    let total_ms = if timeouts.read_total_timeout_multiplier == MAXDWORD {
        u64::from(timeouts.read_total_timeout_constant)
    } else {
        u64::from(timeouts.read_total_timeout_multiplier) * u64::from(len)
            + u64::from(timeouts.read_total_timeout_constant)
    };
    if total_ms == 0 {
        return None;
    }
    Instant::now().checked_add(Duration::from_millis(total_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::abi::ERROR_GEN_FAILURE;

    fn block(sim: &SimComm) -> (RawHandle, Overlapped) {
        let event = sim.create_event().unwrap();
        (event, Overlapped::with_event(event))
    }

    #[test]
    fn test_open_unknown_device() {
        let sim = SimComm::new();
        let err = sim.create_file(r"\\.\COM42").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_FILE_NOT_FOUND));
    }

    #[test]
    fn test_open_is_exclusive() {
        let sim = SimComm::new();
        sim.add_device("COM3");
        let first = sim.create_file(r"\\.\COM3").unwrap();
        let err = sim.create_file(r"\\.\COM3").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_ACCESS_DENIED));

        sim.close_handle(first).unwrap();
        assert!(sim.create_file(r"\\.\COM3").is_ok());
    }

    #[test]
    fn test_queued_input_completes_synchronously() {
        let sim = SimComm::new();
        sim.add_device("COM3");
        let device = sim.create_file(r"\\.\COM3").unwrap();
        sim.feed("COM3", b"hello");

        let (_, mut ov) = block(&sim);
        let mut buf = [0u8; 3];
        let started = unsafe { sim.read_file(device, buf.as_mut_ptr(), 3, &mut ov) };
        assert!(matches!(started, Started::Complete(3)));
        assert_eq!(&buf, b"hel");
        assert_eq!(sim.snapshot("COM3").unwrap().pending_input, 2);
    }

    #[test]
    fn test_pending_read_times_out_with_zero_bytes() {
        let sim = SimComm::new();
        sim.add_device("COM3");
        let device = sim.create_file(r"\\.\COM3").unwrap();
        let timeouts = CommTimeouts {
            read_interval_timeout: MAXDWORD,
            read_total_timeout_multiplier: MAXDWORD,
            read_total_timeout_constant: 30,
            ..CommTimeouts::default()
        };
        sim.set_comm_timeouts(device, &timeouts).unwrap();

        let (_, mut ov) = block(&sim);
        let mut buf = [0u8; 8];
        let started = unsafe { sim.read_file(device, buf.as_mut_ptr(), 8, &mut ov) };
        assert!(matches!(started, Started::Pending));
        let n = unsafe { sim.wait_overlapped_result(device, &mut ov) }.unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_cancel_aborts_pending_read() {
        let sim = SimComm::new();
        sim.add_device("COM3");
        let device = sim.create_file(r"\\.\COM3").unwrap();

        let (_, mut ov) = block(&sim);
        let mut buf = [0u8; 8];
        let started = unsafe { sim.read_file(device, buf.as_mut_ptr(), 8, &mut ov) };
        assert!(matches!(started, Started::Pending));

        sim.cancel_io(device).unwrap();
        let failure = unsafe { sim.wait_overlapped_result(device, &mut ov) }.unwrap_err();
        assert_eq!(failure.error.raw_os_error(), Some(ERROR_OPERATION_ABORTED));
        assert_eq!(failure.transferred, 0);
    }

    #[test]
    fn test_pair_delivers_to_peer() {
        let sim = SimComm::new();
        sim.add_pair("CNCA0", "CNCB0");
        let a = sim.create_file(r"\\.\CNCA0").unwrap();
        let _b = sim.create_file(r"\\.\CNCB0").unwrap();

        let (_, mut ov) = block(&sim);
        let data = b"xyz";
        let started = unsafe { sim.write_file(a, data.as_ptr(), 3, &mut ov) };
        assert!(matches!(started, Started::Pending));
        assert_eq!(unsafe { sim.wait_overlapped_result(a, &mut ov) }.unwrap(), 3);

        assert_eq!(sim.transmitted("CNCA0"), b"xyz");
        assert_eq!(sim.snapshot("CNCB0").unwrap().pending_input, 3);
    }

    #[test]
    fn test_injected_fault_fires_once_after_skip() {
        let sim = SimComm::new();
        sim.fail_after(SimCall::CreateEvent, 1, ERROR_GEN_FAILURE);

        assert!(sim.create_event().is_ok());
        let err = sim.create_event().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_GEN_FAILURE));
        assert!(sim.create_event().is_ok());
        assert_eq!(sim.count(SimCall::CreateEvent), 3);
    }

    #[test]
    fn test_failed_close_still_releases() {
        let sim = SimComm::new();
        let event = sim.create_event().unwrap();
        sim.fail_next(SimCall::CloseHandle, ERROR_GEN_FAILURE);

        assert!(sim.close_handle(event).is_err());
        assert_eq!(sim.open_handles(), 0);
    }

    #[test]
    fn test_rejects_invalid_control_block() {
        let sim = SimComm::new();
        sim.add_device("COM3");
        let device = sim.create_file(r"\\.\COM3").unwrap();
        let err = sim.set_comm_state(device, &Dcb::default()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_INVALID_PARAMETER));
    }
}
