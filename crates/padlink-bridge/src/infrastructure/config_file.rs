//! Optional TOML configuration file for the bridge.
//!
//! Every key is optional.  Keys that are present override the built-in
//! defaults; command-line flags and `PADLINK_*` environment variables in turn
//! override the file (see `main.rs`).
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8765
//! client_queue = 64
//!
//! [serial]
//! baud_rate = 115200
//! scan_interval_ms = 2000
//! read_timeout_ms = 1000
//! poll_interval_ms = 10
//! device_filter = "Serial"
//!
//! [players]
//! max_players = 4
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Unknown keys are rejected so that a typo such as `max_player = 8` fails
//! loudly at startup instead of being silently ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::config::{BridgeConfig, InvalidConfig};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The merged configuration contains an unusable value.
    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub serial: SerialSection,
    pub players: PlayersSection,
    pub logging: LoggingSection,
}

/// `[server]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Per-client outgoing queue capacity.
    pub client_queue: Option<usize>,
}

/// `[serial]` table.  Durations are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSection {
    pub baud_rate: Option<u32>,
    pub scan_interval_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub device_filter: Option<String>,
}

/// `[players]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayersSection {
    pub max_players: Option<u8>,
}

/// `[logging]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: Option<String>,
}

impl FileConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML, unknown keys or values of the
    /// wrong type (e.g. `max_players = 300`).
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overwrites every field of `config` that this file sets.
    pub fn apply_to(&self, config: &mut BridgeConfig) {
        let ms = Duration::from_millis;

        if let Some(host) = &self.server.host {
            config.ws_host = host.clone();
        }
        if let Some(port) = self.server.port {
            config.ws_port = port;
        }
        if let Some(cap) = self.server.client_queue {
            config.client_queue_capacity = cap;
        }
        if let Some(baud) = self.serial.baud_rate {
            config.baud_rate = baud;
        }
        if let Some(v) = self.serial.scan_interval_ms {
            config.scan_interval = ms(v);
        }
        if let Some(v) = self.serial.read_timeout_ms {
            config.read_timeout = ms(v);
        }
        if let Some(v) = self.serial.poll_interval_ms {
            config.poll_interval = ms(v);
        }
        if let Some(filter) = &self.serial.device_filter {
            config.device_filter = filter.clone();
        }
        if let Some(n) = self.players.max_players {
            config.max_players = n;
        }
    }

    /// Logging level from the `[logging]` table, if any.
    pub fn log_level(&self) -> Option<&str> {
        self.logging.level.as_deref()
    }
}

/// Reads and parses the configuration file at `path`.
///
/// Unlike a platform default location, a path given explicitly by the user
/// must exist.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] if
/// it is not a valid configuration.
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FileConfig::from_toml(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
