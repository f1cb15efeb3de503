//! Real serial ports via `tokio-serial`.
//!
//! # Device descriptions
//!
//! `tokio-serial` (through the `serialport` crate) reports a port type
//! instead of a single description string.  The description used by the
//! controller filter is derived from it:
//!
//! | Port type  | Description                                         |
//! |------------|-----------------------------------------------------|
//! | USB        | product string, else manufacturer, else "USB Serial Device" |
//! | PCI        | "PCI Serial Device"                                 |
//! | Bluetooth  | "Bluetooth Serial Device"                           |
//! | Unknown    | "n/a"                                               |
//!
//! # Line framing
//!
//! Serial is a byte stream: one `read()` may return half a line or several
//! lines.  [`NativeDeviceHandle`] keeps a per-handle [`LineBuffer`] and hands
//! out one `\n`-terminated line per [`read_line`](DeviceHandle::read_line)
//! call.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialPortType, SerialStream};
use tracing::debug;

use padlink_core::{DeviceId, DeviceInfo};

use super::{DeviceHandle, DeviceHandleRef, SerialError, SerialTransport};

/// A line longer than this without a `\n` is handed out as-is so the buffer
/// cannot grow without bound on a misbehaving device.
const MAX_LINE_BYTES: usize = 4096;

/// Size of the scratch buffer for a single `read()` call.
const READ_CHUNK: usize = 256;

/// [`SerialTransport`] backed by the operating system's serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSerialTransport;

impl NativeSerialTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SerialTransport for NativeSerialTransport {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, SerialError> {
        let ports =
            tokio_serial::available_ports().map_err(|e| SerialError::Enumerate(e.to_string()))?;

        Ok(ports
            .into_iter()
            .map(|p| DeviceInfo::new(p.port_name, describe(&p.port_type)))
            .collect())
    }

    async fn open(
        &self,
        device: &DeviceId,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<DeviceHandleRef, SerialError> {
        let stream = tokio_serial::new(device.as_str(), baud_rate)
            .timeout(read_timeout)
            .open_native_async()
            .map_err(|e| SerialError::Open {
                device: device.clone(),
                reason: e.to_string(),
            })?;

        debug!("opened {device} at {baud_rate} baud");
        Ok(Arc::new(NativeDeviceHandle::new(
            device.clone(),
            stream,
            read_timeout,
        )))
    }
}

/// Derives a human-readable description from the port type.
fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            describe_usb(usb.product.as_deref(), usb.manufacturer.as_deref())
        }
        SerialPortType::PciPort => "PCI Serial Device".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth Serial Device".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

fn describe_usb(product: Option<&str>, manufacturer: Option<&str>) -> String {
    let present = |s: &&str| !s.trim().is_empty();
    product
        .filter(present)
        .or(manufacturer.filter(present))
        .unwrap_or("USB Serial Device")
        .to_string()
}

/// Bytes received from a port but not yet returned as a line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Appends freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pops one complete line, without its `\n`.
    ///
    /// A buffer of [`MAX_LINE_BYTES`] or more without a `\n` is returned
    /// whole.  Invalid UTF-8 is replaced with `U+FFFD`.
    pub fn take_line(&mut self) -> Option<String> {
        let end = match self.pending.iter().position(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None if self.pending.len() >= MAX_LINE_BYTES => self.pending.len(),
            None => return None,
        };
        let raw: Vec<u8> = self.pending.drain(..end).collect();
        let line = raw.strip_suffix(b"\n").unwrap_or(&raw);
        Some(String::from_utf8_lossy(line).into_owned())
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

struct LineReader {
    half: ReadHalf<SerialStream>,
    buffer: LineBuffer,
}

/// An open port.  Reads and writes use separate halves so a relay polling
/// for input never delays a router write.
pub struct NativeDeviceHandle {
    device_id: DeviceId,
    read_timeout: Duration,
    open: AtomicBool,
    reader: Mutex<Option<LineReader>>,
    writer: Mutex<Option<WriteHalf<SerialStream>>>,
}

impl NativeDeviceHandle {
    fn new(device_id: DeviceId, stream: SerialStream, read_timeout: Duration) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            device_id,
            read_timeout,
            open: AtomicBool::new(true),
            reader: Mutex::new(Some(LineReader {
                half: read_half,
                buffer: LineBuffer::new(),
            })),
            writer: Mutex::new(Some(write_half)),
        }
    }

    fn closed(&self) -> SerialError {
        SerialError::Closed(self.device_id.clone())
    }
}

#[async_trait]
impl DeviceHandle for NativeDeviceHandle {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    async fn read_line(&self) -> Result<Option<String>, SerialError> {
        let mut guard = self.reader.lock().await;

        if !self.is_open() {
            // Dropping the read half releases our share of the OS port.
            guard.take();
            return Err(self.closed());
        }
        let reader = guard.as_mut().ok_or_else(|| self.closed())?;

        if let Some(line) = reader.buffer.take_line() {
            return Ok(Some(line));
        }

        let mut chunk = [0u8; READ_CHUNK];
        match timeout(self.read_timeout, reader.half.read(&mut chunk)).await {
            // Nothing arrived within the read timeout.
            Err(_) => Ok(None),
            Ok(Ok(0)) => {
                self.open.store(false, Ordering::Release);
                guard.take();
                Err(self.closed())
            }
            Ok(Ok(n)) => {
                reader.buffer.push(&chunk[..n]);
                Ok(reader.buffer.take_line())
            }
            Ok(Err(e)) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Ok(Err(source)) => Err(SerialError::Read {
                device: self.device_id.clone(),
                source,
            }),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), SerialError> {
        let mut guard = self.writer.lock().await;
        let writer = match guard.as_mut() {
            Some(w) if self.is_open() => w,
            _ => return Err(self.closed()),
        };

        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        result.map_err(|source| SerialError::Write {
            device: self.device_id.clone(),
            source,
        })
    }

    async fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        self.writer.lock().await.take();
        // The relay may be inside a bounded read; it drops the read half
        // itself on its next call if the lock is busy now.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        debug!("closed {}", self.device_id);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
