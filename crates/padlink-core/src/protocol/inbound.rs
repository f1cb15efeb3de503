//! Classification of messages sent by websocket clients.
//!
//! Clients send arbitrary JSON meant for the controllers.  The only field
//! the bridge looks at is `player_id`:
//!
//! ```json
//! {"player_id":2,"led":"red"}   → only player 2
//! {"rumble":200}                → every player
//! [1, 2, 3]                     → every player
//! ```
//!
//! The bridge never re-encodes the message.  Controllers receive the exact
//! text the client sent, so this module only decides *where* it goes.

use serde_json::Value;

use super::ProtocolError;

/// Field that selects a single player.
pub const TARGET_FIELD: &str = "player_id";

/// Where an inbound message should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundRoute {
    /// Write to the player with this number only.
    ///
    /// The raw requested number is kept (it may not be a valid or bound
    /// slot); resolving it is the router's job.
    Targeted(u64),
    /// `player_id` is present but no player number can equal it
    /// (`null`, `"2"`, `-1`, `1.5`).  Holds the field as JSON text.
    UnknownTarget(String),
    /// Write to every bound player.
    Broadcast,
}

impl InboundRoute {
    /// Parses `raw` and decides how it should be routed.
    ///
    /// Any valid JSON without a `player_id` key is a broadcast, including
    /// arrays and bare scalars.  `player_id` is compared by numeric value,
    /// so `1`, `1.0` and `true` all select player 1.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedJson`] if `raw` is not JSON.
    pub fn classify(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)?;
        let route = match value.as_object().and_then(|map| map.get(TARGET_FIELD)) {
            None => Self::Broadcast,
            Some(id) => player_number(id)
                .map(Self::Targeted)
                .unwrap_or_else(|| Self::UnknownTarget(id.to_string())),
        };
        Ok(route)
    }
}

/// The player number `id` is numerically equal to, if any.
fn player_number(id: &Value) -> Option<u64> {
    match id {
        Value::Bool(b) => Some(u64::from(*b)),
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    }
}
