//! Protocol module containing the client-facing JSON messages.

pub mod envelope;
pub mod inbound;

pub use envelope::{Envelope, LinkStatus};
pub use inbound::InboundRoute;

use thiserror::Error;

/// Errors raised while interpreting a text message from a websocket client.
///
/// The bridge logs these and drops the message; nothing is reported back
/// to the sender.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text is not valid JSON.
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}
