//! Mock serial bus for unit and integration testing.
//!
//! Allows tests to plug and unplug synthetic controllers, feed them output
//! lines and inspect what the bridge wrote to them, without any hardware or
//! OS serial drivers.
//!
//! ```rust,no_run
//! use padlink_bridge::infrastructure::serial::mock::MockSerialBus;
//!
//! let bus = MockSerialBus::new();
//! bus.plug("/dev/ttyUSB0", "USB Serial");
//! // ... run a supervisor scan against `bus` ...
//! bus.feed_line("/dev/ttyUSB0", "HELLO");
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use padlink_core::{DeviceId, DeviceInfo};

use super::{DeviceHandle, DeviceHandleRef, SerialError, SerialTransport};

/// One device known to the bus.
struct Slot {
    description: String,
    /// `false` after `unplug()`: hidden from enumeration.
    visible: bool,
    fail_open: bool,
    opens: usize,
    handle: Option<Arc<MockDeviceHandle>>,
}

#[derive(Default)]
struct BusState {
    devices: BTreeMap<DeviceId, Slot>,
    fail_enumeration: bool,
}

/// A mock implementation of [`SerialTransport`].
///
/// Cloning the bus yields another view of the same devices, so a test can
/// keep one clone while the supervisor owns another.
#[derive(Clone, Default)]
pub struct MockSerialBus {
    state: Arc<Mutex<BusState>>,
}

impl MockSerialBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        let mut guard = self.state.lock().expect("lock poisoned");
        f(&mut guard)
    }

    /// Makes a device visible to enumeration (replugging an unplugged one).
    pub fn plug(&self, id: impl Into<DeviceId>, description: impl Into<String>) {
        let description = description.into();
        self.with_state(|s| {
            let slot = s.devices.entry(id.into()).or_insert_with(|| Slot {
                description: description.clone(),
                visible: true,
                fail_open: false,
                opens: 0,
                handle: None,
            });
            slot.description = description;
            slot.visible = true;
        });
    }

    /// Hides a device from enumeration.  Its open handle keeps working until
    /// somebody closes it, like a port that disappears from the OS listing
    /// slightly before the driver notices.
    pub fn unplug(&self, id: impl Into<DeviceId>) {
        let id = id.into();
        self.with_state(|s| {
            if let Some(slot) = s.devices.get_mut(&id) {
                slot.visible = false;
            }
        });
    }

    /// Makes every read on the device's current handle fail with an I/O error.
    pub fn break_device(&self, id: impl Into<DeviceId>) {
        if let Some(handle) = self.handle(id) {
            handle.broken.store(true, Ordering::Release);
        }
    }

    /// Makes every write on the device's current handle fail.
    pub fn fail_writes(&self, id: impl Into<DeviceId>) {
        if let Some(handle) = self.handle(id) {
            handle.fail_writes.store(true, Ordering::Release);
        }
    }

    /// Makes `open()` fail for this device until reset with `false`.
    pub fn set_fail_open(&self, id: impl Into<DeviceId>, fail: bool) {
        let id = id.into();
        self.with_state(|s| {
            if let Some(slot) = s.devices.get_mut(&id) {
                slot.fail_open = fail;
            }
        });
    }

    /// Makes `list_devices()` fail until reset with `false`.
    pub fn set_fail_enumeration(&self, fail: bool) {
        self.with_state(|s| s.fail_enumeration = fail);
    }

    /// Queues one line of output on the device's current handle.
    ///
    /// Panics if the device has never been opened.
    pub fn feed_line(&self, id: impl Into<DeviceId>, line: impl Into<String>) {
        let id = id.into();
        let handle = self
            .handle(id.clone())
            .unwrap_or_else(|| panic!("MockSerialBus::feed_line: {id} was never opened"));
        handle
            .incoming
            .lock()
            .expect("lock poisoned")
            .push_back(line.into());
    }

    /// Payloads written to the device's current handle, as UTF-8 text.
    pub fn written(&self, id: impl Into<DeviceId>) -> Vec<String> {
        self.handle(id)
            .map(|h| h.written_text())
            .unwrap_or_default()
    }

    /// The most recently opened handle for the device.
    pub fn handle(&self, id: impl Into<DeviceId>) -> Option<Arc<MockDeviceHandle>> {
        let id = id.into();
        self.with_state(|s| s.devices.get(&id).and_then(|slot| slot.handle.clone()))
    }

    /// How many times `open()` succeeded for the device.
    pub fn open_count(&self, id: impl Into<DeviceId>) -> usize {
        let id = id.into();
        self.with_state(|s| s.devices.get(&id).map_or(0, |slot| slot.opens))
    }
}

#[async_trait]
impl SerialTransport for MockSerialBus {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, SerialError> {
        self.with_state(|s| {
            if s.fail_enumeration {
                return Err(SerialError::Enumerate("mock enumeration failure".to_string()));
            }
            Ok(s
                .devices
                .iter()
                .filter(|(_, slot)| slot.visible)
                .map(|(id, slot)| DeviceInfo::new(id.clone(), slot.description.clone()))
                .collect())
        })
    }

    async fn open(
        &self,
        device: &DeviceId,
        _baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<DeviceHandleRef, SerialError> {
        self.with_state(|s| {
            let slot = s
                .devices
                .get_mut(device)
                .filter(|slot| slot.visible)
                .ok_or_else(|| SerialError::Open {
                    device: device.clone(),
                    reason: "no such device".to_string(),
                })?;
            if slot.fail_open {
                return Err(SerialError::Open {
                    device: device.clone(),
                    reason: "mock open failure".to_string(),
                });
            }

            let handle = Arc::new(MockDeviceHandle::new(device.clone()));
            slot.opens += 1;
            slot.handle = Some(Arc::clone(&handle));
            Ok(handle as DeviceHandleRef)
        })
    }
}

/// A mock implementation of [`DeviceHandle`].
pub struct MockDeviceHandle {
    device_id: DeviceId,
    open: AtomicBool,
    broken: AtomicBool,
    fail_writes: AtomicBool,
    close_calls: AtomicUsize,
    incoming: Mutex<VecDeque<String>>,
    written: Mutex<Vec<Vec<u8>>>,
}

impl MockDeviceHandle {
    /// Creates an open handle with no pending input.
    pub fn new(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
            open: AtomicBool::new(true),
            broken: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            incoming: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
        }
    }

    /// Every payload written so far, lossily decoded as UTF-8.
    pub fn written_text(&self) -> Vec<String> {
        self.written
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    /// Number of times `close()` was called, including no-op repeats.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }

    /// Queues a line directly on this handle.
    pub fn push_line(&self, line: impl Into<String>) {
        self.incoming
            .lock()
            .expect("lock poisoned")
            .push_back(line.into());
    }
}

#[async_trait]
impl DeviceHandle for MockDeviceHandle {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    async fn read_line(&self) -> Result<Option<String>, SerialError> {
        if !self.is_open() {
            return Err(SerialError::Closed(self.device_id.clone()));
        }
        if self.broken.load(Ordering::Acquire) {
            return Err(SerialError::Read {
                device: self.device_id.clone(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"),
            });
        }
        Ok(self.incoming.lock().expect("lock poisoned").pop_front())
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), SerialError> {
        if !self.is_open() {
            return Err(SerialError::Closed(self.device_id.clone()));
        }
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(SerialError::Write {
                device: self.device_id.clone(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"),
            });
        }
        self.written
            .lock()
            .expect("lock poisoned")
            .push(bytes.to_vec());
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::AcqRel);
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
