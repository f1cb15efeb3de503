//! padlink-bridge library crate.
//!
//! Relays between serial game controllers and websocket clients: every
//! plugged-in controller gets a player number, every line it prints is
//! broadcast to all clients, and clients can send JSON to one player or to
//! all of them.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browsers / game clients (JSON over WebSocket)
//!         ↕
//! [padlink-bridge]
//!   ├── domain/           BridgeConfig
//!   ├── application/      Supervisor, relays, router, client set
//!   └── infrastructure/
//!         ├── serial/     SerialTransport trait, tokio-serial + mock bus
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         └── config_file/ Optional TOML configuration
//!         ↕
//! Controllers (newline-delimited text over serial)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `padlink-core` and the serial
//!   *traits*, never on a concrete port implementation.
//! - `infrastructure` owns every socket, port and file.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: device supervision, relaying and routing.
pub mod application;

/// Infrastructure layer: serial ports, WebSocket server, config file.
pub mod infrastructure;
