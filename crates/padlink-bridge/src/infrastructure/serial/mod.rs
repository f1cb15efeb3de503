//! Serial transport infrastructure.
//!
//! The bridge only depends on the two traits in this module:
//!
//! - [`SerialTransport`] enumerates ports and opens them.
//! - [`DeviceHandle`] is one open port: poll a line, write bytes, close.
//!
//! # Implementations
//!
//! - [`native::NativeSerialTransport`] talks to real hardware through
//!   `tokio-serial`.
//! - [`mock::MockSerialBus`] is an in-memory bus that lets tests plug and
//!   unplug controllers, feed them lines and inspect what was written,
//!   without any hardware attached.
//!
//! # Reading model
//!
//! [`DeviceHandle::read_line`] never blocks longer than the read timeout the
//! handle was opened with.  `Ok(None)` means "no complete line yet"; the
//! relay then sleeps for its poll interval before trying again.  A relay
//! therefore stops by observing [`DeviceHandle::is_open`] turning false, not
//! by being interrupted from outside.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use padlink_core::{DeviceId, DeviceInfo};

pub mod mock;
pub mod native;

/// Error type for serial transport operations.
#[derive(Debug, Error)]
pub enum SerialError {
    /// Listing the available ports failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),

    /// The port exists but could not be opened (busy, permissions, ...).
    #[error("failed to open {device}: {reason}")]
    Open { device: DeviceId, reason: String },

    /// A read returned an I/O error.
    #[error("read from {device} failed: {source}")]
    Read {
        device: DeviceId,
        #[source]
        source: std::io::Error,
    },

    /// A write returned an I/O error.
    #[error("write to {device} failed: {source}")]
    Write {
        device: DeviceId,
        #[source]
        source: std::io::Error,
    },

    /// The handle has been closed (by the supervisor, or after EOF).
    #[error("{0} is closed")]
    Closed(DeviceId),
}

/// One open serial device.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// Identifier the handle was opened with.
    fn device_id(&self) -> &DeviceId;

    /// Returns the next complete line without its terminator, `Ok(None)` if
    /// no complete line arrived within the read timeout.
    ///
    /// # Errors
    ///
    /// [`SerialError::Closed`] once the handle is closed, [`SerialError::Read`]
    /// on an I/O failure (e.g. the cable was pulled).
    async fn read_line(&self) -> Result<Option<String>, SerialError>;

    /// Writes all of `bytes` to the device.
    ///
    /// # Errors
    ///
    /// [`SerialError::Closed`] if the handle is closed, [`SerialError::Write`]
    /// on an I/O failure.
    async fn write(&self, bytes: &[u8]) -> Result<(), SerialError>;

    /// Closes the handle.  Calling it again is a no-op.
    async fn close(&self);

    /// `false` once the handle is closed.
    fn is_open(&self) -> bool;
}

/// Reference-counted handle shared by the registry, its relay and the router.
pub type DeviceHandleRef = Arc<dyn DeviceHandle>;

/// Enumerates and opens serial devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialTransport: Send + Sync {
    /// Lists every serial port currently visible to the OS.
    ///
    /// # Errors
    ///
    /// [`SerialError::Enumerate`] if the platform query fails.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, SerialError>;

    /// Opens `device` at `baud_rate` with reads bounded by `read_timeout`.
    ///
    /// # Errors
    ///
    /// [`SerialError::Open`] if the port cannot be opened.
    async fn open(
        &self,
        device: &DeviceId,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<DeviceHandleRef, SerialError>;
}
