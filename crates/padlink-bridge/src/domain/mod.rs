//! Domain layer for padlink-bridge.
//!
//! Pure types with no dependencies on I/O, networking, or async runtimes.
//! The player registry and envelope protocol live in `padlink-core`; what
//! remains here is specific to running the bridge as a service.

pub mod config;

pub use config::{BridgeConfig, InvalidConfig};
