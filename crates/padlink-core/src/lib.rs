//! # padlink-core
//!
//! Shared library for Padlink containing the player-slot domain and the JSON
//! envelope protocol spoken with websocket clients.
//!
//! This crate is used by the bridge service and by its integration tests.
//! It has zero dependencies on OS APIs, serial drivers, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! Padlink connects up to a handful of physical game controllers (serial
//! devices, usually ESP32 boards on a USB-serial adapter) to any number of
//! websocket clients.  Every controller is given a stable *player number*
//! while it stays plugged in.  Clients can send JSON to one player or to all
//! of them, and every line a controller prints is relayed to all clients.
//!
//! This crate (`padlink-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure business logic.  The most important piece is the
//!   [`PlayerRegistry`]: the map from a serial device to the player slot it
//!   holds, with the "lowest free slot" allocation policy.
//!
//! - **`protocol`** – The JSON text messages exchanged with websocket
//!   clients: outgoing [`Envelope`]s and the classification of incoming
//!   messages into targeted or broadcast routes.

// Declare the two top-level modules.  Rust will look for each in a
// subdirectory with the same name (e.g., src/protocol/mod.rs).
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `padlink_core::PlayerRegistry` instead of the full module path.
pub use domain::device::{DescriptionFilter, DeviceFilter, DeviceId, DeviceInfo};
pub use domain::registry::{BindingState, PlayerBinding, PlayerRegistry, RegistryError};
pub use domain::slot::{PlayerSlot, SlotAllocator, DEFAULT_MAX_PLAYERS};
pub use protocol::envelope::{Envelope, LinkStatus};
pub use protocol::inbound::InboundRoute;
pub use protocol::ProtocolError;
