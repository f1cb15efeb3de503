//! Outgoing envelopes: what every websocket client receives.
//!
//! # Wire format
//!
//! Two shapes of JSON object are sent, distinguished by their fields rather
//! than a `"type"` tag.  Existing browser clients depend on this exact layout:
//!
//! ```json
//! {"status":"connected","player":1,"port":"/dev/ttyUSB0"}
//! {"status":"disconnected","player":1,"port":"/dev/ttyUSB0"}
//! {"player":1,"data":"HELLO"}
//! ```
//!
//! Serde's `#[serde(untagged)]` attribute produces exactly these objects.

use serde::{Deserialize, Serialize};

use crate::domain::device::DeviceId;
use crate::domain::slot::PlayerSlot;

/// Lifecycle status carried by [`Envelope::Lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// A message broadcast to every websocket client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    /// A controller was bound to, or released from, a player slot.
    Lifecycle {
        status: LinkStatus,
        player: PlayerSlot,
        /// Device identifier of the controller.
        port: DeviceId,
    },

    /// One line of text printed by a controller.
    Output { player: PlayerSlot, data: String },
}

impl Envelope {
    /// `{"status":"connected", ...}` for a freshly bound device.
    pub fn connected(player: PlayerSlot, port: DeviceId) -> Self {
        Self::Lifecycle {
            status: LinkStatus::Connected,
            player,
            port,
        }
    }

    /// `{"status":"disconnected", ...}` for a device whose slot was freed.
    pub fn disconnected(player: PlayerSlot, port: DeviceId) -> Self {
        Self::Lifecycle {
            status: LinkStatus::Disconnected,
            player,
            port,
        }
    }

    /// `{"player":N,"data":...}` for a relayed line.
    pub fn output(player: PlayerSlot, data: impl Into<String>) -> Self {
        Self::Output {
            player,
            data: data.into(),
        }
    }

    /// The player this envelope is about.
    pub fn player(&self) -> PlayerSlot {
        match self {
            Self::Lifecycle { player, .. } | Self::Output { player, .. } => *player,
        }
    }

    /// Serializes the envelope to compact JSON text.
    ///
    /// # Errors
    ///
    /// Only fails if serde_json itself fails, which cannot happen for these
    /// plain string/integer fields; the `Result` is kept so callers never
    /// need to unwrap.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
