//! Serial device identity and classification.
//!
//! The serial transport reports every port it can see as a [`DeviceInfo`].
//! Only some of those ports are game controllers; a [`DeviceFilter`] decides
//! which ones.  The default policy is [`DescriptionFilter`], a case-sensitive
//! substring match on the human-readable description, but any closure of
//! type `Fn(&DeviceInfo) -> bool` works as well.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable name of a physical serial endpoint.
///
/// On Linux this is a device path such as `/dev/ttyUSB0`; on Windows a port
/// name such as `COM3`.  The identifier is stable while the device stays
/// plugged in.  Replugging may produce a different identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wraps a platform device name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One entry of a device enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Platform identifier used to open the device.
    pub id: DeviceId,
    /// Human-readable description (USB product string or a generic label).
    pub description: String,
}

impl DeviceInfo {
    /// Convenience constructor used by transports and tests.
    pub fn new(id: impl Into<DeviceId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// Decides whether an enumerated device is a player controller.
///
/// This is policy, not mechanism: the supervisor accepts any implementation.
pub trait DeviceFilter: Send + Sync {
    /// Returns `true` if `device` should be bound to a player slot.
    fn qualifies(&self, device: &DeviceInfo) -> bool;
}

impl<F> DeviceFilter for F
where
    F: Fn(&DeviceInfo) -> bool + Send + Sync,
{
    fn qualifies(&self, device: &DeviceInfo) -> bool {
        self(device)
    }
}

/// Case-sensitive substring match on [`DeviceInfo::description`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionFilter {
    needle: String,
}

impl DescriptionFilter {
    /// Creates a filter matching descriptions that contain `needle`.
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }

    /// The substring this filter looks for.
    pub fn needle(&self) -> &str {
        &self.needle
    }
}

impl Default for DescriptionFilter {
    /// Matches USB-serial adapters, which describe themselves as "... Serial ...".
    fn default() -> Self {
        Self::new("Serial")
    }
}

impl DeviceFilter for DescriptionFilter {
    fn qualifies(&self, device: &DeviceInfo) -> bool {
        device.description.contains(&self.needle)
    }
}
