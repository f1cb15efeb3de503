//! Infrastructure layer for padlink-bridge.
//!
//! The infrastructure layer handles all I/O: serial ports, the websocket
//! server and the configuration file.
//!
//! # Responsibilities
//!
//! - Enumerating, opening, reading and writing serial ports (`serial`)
//! - Binding the websocket listener and running one task pair per client
//!   (`ws_server`)
//! - Loading the optional TOML configuration file (`config_file`)
//!
//! # What does NOT belong here?
//!
//! - Player slot allocation (domain, in `padlink-core`)
//! - Deciding which controller a message goes to (application layer)

pub mod config_file;
pub mod serial;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use config_file::{load_config_file, ConfigError, FileConfig};
pub use ws_server::{run_server, serve, SessionContext};
