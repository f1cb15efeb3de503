//! Application layer of the bridge.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (the [`PlayerRegistry`] and envelope types in `padlink-core`) and the
//! infrastructure (serial ports and the websocket server).
//!
//! The components here orchestrate domain objects and depend only on the
//! serial traits, never on a concrete port implementation.  That is what lets
//! the whole pipeline run against an in-memory bus in tests.
//!
//! # Sub-modules
//!
//! - **`supervisor`** – Periodically enumerates serial devices, binds new
//!   controllers to the lowest free player slot and closes the handles of
//!   controllers that vanished.
//!
//! - **`relay`** – One task per bound controller.  Polls it for lines,
//!   broadcasts them to every client, and on close unbinds the player and
//!   announces the disconnect.
//!
//! - **`router`** – Sends each client message to one player or to all.
//!
//! - **`client_set`** – The connected websocket clients and their outgoing
//!   queues.
//!
//! # Shared state
//!
//! The registry is shared as a [`SharedRegistry`] behind a Tokio mutex.
//! Every critical section is short: nobody performs device I/O or
//! broadcasts while holding it.

use std::sync::Arc;

use tokio::sync::Mutex;

use padlink_core::PlayerRegistry;

use crate::infrastructure::serial::DeviceHandleRef;

pub mod client_set;
pub mod relay;
pub mod router;
pub mod supervisor;

pub use client_set::{BroadcastReport, ClientId, ClientSet};
pub use relay::{OutboundRelay, RelayState};
pub use router::{InboundRouter, RouteOutcome};
pub use supervisor::{ConnectionSupervisor, ScanReport, SupervisorSettings};

/// The player registry as shared by the supervisor, relays and router.
pub type SharedRegistry = Arc<Mutex<PlayerRegistry<DeviceHandleRef>>>;

/// Creates an empty [`SharedRegistry`] with `max_players` slots.
pub fn new_registry(max_players: u8) -> SharedRegistry {
    Arc::new(Mutex::new(PlayerRegistry::new(max_players)))
}
