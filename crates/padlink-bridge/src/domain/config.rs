//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It can be constructed from CLI arguments, environment variables, a TOML
//! file (see `infrastructure::config_file`), or from the defaults below.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads inside the domain) makes the bridge easy to embed in tests: the
//! integration tests build a `BridgeConfig` with millisecond intervals and
//! run the whole pipeline against an in-memory serial bus.

use std::time::Duration;

use thiserror::Error;

use padlink_core::DEFAULT_MAX_PLAYERS;

/// A configuration value that cannot work at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {field} {reason}")]
pub struct InvalidConfig {
    /// Name of the offending setting.
    pub field: &'static str,
    /// Human-readable explanation.
    pub reason: &'static str,
}

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use padlink_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_port, 8765);
/// assert_eq!(cfg.max_players, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Host name or IP address the websocket server binds to.
    ///
    /// `localhost` only accepts local browsers; `0.0.0.0` accepts the LAN.
    pub ws_host: String,

    /// TCP port of the websocket server.
    pub ws_port: u16,

    /// Baud rate used to open every controller.
    pub baud_rate: u32,

    /// Number of player slots (`1..=max_players`).
    pub max_players: u8,

    /// How often serial devices are enumerated.
    pub scan_interval: Duration,

    /// Upper bound on a single blocking serial read.
    ///
    /// This only bounds how long a relay waits for bytes; it is not an
    /// application-level deadline.
    pub read_timeout: Duration,

    /// Idle sleep of a relay after a poll that produced no line.
    ///
    /// This caps CPU usage for silent controllers.
    pub poll_interval: Duration,

    /// Case-sensitive substring a device description must contain to be
    /// treated as a controller.
    pub device_filter: String,

    /// Outgoing messages buffered per websocket client before new ones are
    /// dropped for that client.
    pub client_queue_capacity: usize,
}

impl BridgeConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn ws_bind_addr(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let checks = [
            (self.max_players == 0, "max_players", "must be at least 1"),
            (self.baud_rate == 0, "baud_rate", "must be non-zero"),
            (self.scan_interval.is_zero(), "scan_interval", "must be non-zero"),
            (self.read_timeout.is_zero(), "read_timeout", "must be non-zero"),
            (self.poll_interval.is_zero(), "poll_interval", "must be non-zero"),
            (self.client_queue_capacity == 0, "client_queue_capacity", "must be non-zero"),
            (self.ws_host.trim().is_empty(), "ws_host", "must not be empty"),
        ];

        match checks.into_iter().find(|(bad, _, _)| *bad) {
            Some((_, field, reason)) => Err(InvalidConfig { field, reason }),
            None => Ok(()),
        }
    }
}

impl Default for BridgeConfig {
    /// | Field                 | Default       |
    /// |-----------------------|---------------|
    /// | ws_host               | `localhost`   |
    /// | ws_port               | `8765`        |
    /// | baud_rate             | `115200`      |
    /// | max_players           | `4`           |
    /// | scan_interval         | 2 seconds     |
    /// | read_timeout          | 1 second      |
    /// | poll_interval         | 10 ms         |
    /// | device_filter         | `"Serial"`    |
    /// | client_queue_capacity | `64`          |
    fn default() -> Self {
        Self {
            ws_host: "localhost".to_string(),
            ws_port: 8765,
            baud_rate: 115_200,
            max_players: DEFAULT_MAX_PLAYERS,
            scan_interval: Duration::from_secs(2),
            read_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            device_filter: "Serial".to_string(),
            client_queue_capacity: 64,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.ws_host, "localhost");
        assert_eq!(cfg.ws_port, 8765);
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.max_players, 4);
        assert_eq!(cfg.scan_interval, Duration::from_secs(2));
        assert_eq!(cfg.device_filter, "Serial");
    }

    #[test]
    fn test_default_is_valid() {
        assert_eq!(BridgeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_ws_bind_addr_joins_host_and_port() {
        let cfg = BridgeConfig {
            ws_host: "0.0.0.0".to_string(),
            ws_port: 9000,
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.ws_bind_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_zero_max_players_is_rejected() {
        let cfg = BridgeConfig {
            max_players: 0,
            ..BridgeConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field, "max_players");
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let cfg = BridgeConfig {
            poll_interval: Duration::ZERO,
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field, "poll_interval");
    }

    #[test]
    fn test_blank_host_is_rejected() {
        let cfg = BridgeConfig {
            ws_host: "  ".to_string(),
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field, "ws_host");
    }
}
