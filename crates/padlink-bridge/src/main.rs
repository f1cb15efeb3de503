//! Padlink bridge: entry point.
//!
//! This binary watches the serial ports for game controllers and relays
//! between them and any number of WebSocket clients.
//!
//! # Usage
//!
//! ```text
//! padlink-bridge [OPTIONS]
//!
//! Options:
//!   --host <HOST>                WebSocket bind host [default: localhost]
//!   --port <PORT>                WebSocket port [default: 8765]
//!   --baud-rate <BAUD>           Serial baud rate [default: 115200]
//!   --max-players <N>            Player slots, 1-255 [default: 4]
//!   --scan-interval-ms <MS>      Device scan period [default: 2000]
//!   --read-timeout-ms <MS>       Serial read bound [default: 1000]
//!   --poll-interval-ms <MS>      Idle relay sleep [default: 10]
//!   --device-filter <TEXT>       Description substring [default: Serial]
//!   --client-queue <N>           Per-client outgoing queue [default: 64]
//!   --config <PATH>              Optional TOML configuration file
//! ```
//!
//! # Configuration precedence
//!
//! Command-line flag (or its `PADLINK_*` environment variable), then the
//! TOML file given with `--config`, then the built-in default.
//!
//! | Variable                    | Flag                 |
//! |-----------------------------|----------------------|
//! | `PADLINK_HOST`              | `--host`             |
//! | `PADLINK_PORT`              | `--port`             |
//! | `PADLINK_BAUD_RATE`         | `--baud-rate`        |
//! | `PADLINK_MAX_PLAYERS`       | `--max-players`      |
//! | `PADLINK_SCAN_INTERVAL_MS`  | `--scan-interval-ms` |
//! | `PADLINK_READ_TIMEOUT_MS`   | `--read-timeout-ms`  |
//! | `PADLINK_POLL_INTERVAL_MS`  | `--poll-interval-ms` |
//! | `PADLINK_DEVICE_FILTER`     | `--device-filter`    |
//! | `PADLINK_CLIENT_QUEUE`      | `--client-queue`     |
//! | `PADLINK_CONFIG`            | `--config`           |
//!
//! The log level comes from `RUST_LOG` if set, otherwise from `[logging]
//! level` in the config file, otherwise `info`.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use padlink_core::DescriptionFilter;

use padlink_bridge::application::{
    new_registry, ClientSet, ConnectionSupervisor, InboundRouter, SupervisorSettings,
};
use padlink_bridge::domain::BridgeConfig;
use padlink_bridge::infrastructure::serial::native::NativeSerialTransport;
use padlink_bridge::infrastructure::{load_config_file, run_server, ConfigError, SessionContext};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Serial game controller to WebSocket bridge.
///
/// Every flag is optional; unset flags fall back to the config file and then
/// to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "padlink-bridge",
    about = "Relay between serial game controllers and WebSocket clients",
    version
)]
struct Cli {
    /// Host name or IP address for the WebSocket server.
    ///
    /// Use `0.0.0.0` to accept clients from the LAN.
    #[arg(long, env = "PADLINK_HOST")]
    host: Option<String>,

    /// TCP port for the WebSocket server.
    #[arg(long, env = "PADLINK_PORT")]
    port: Option<u16>,

    /// Baud rate used for every controller.
    #[arg(long, env = "PADLINK_BAUD_RATE")]
    baud_rate: Option<u32>,

    /// Number of player slots.
    #[arg(long, env = "PADLINK_MAX_PLAYERS", value_parser = clap::value_parser!(u8).range(1..))]
    max_players: Option<u8>,

    /// Milliseconds between serial port scans.
    #[arg(long, env = "PADLINK_SCAN_INTERVAL_MS")]
    scan_interval_ms: Option<u64>,

    /// Upper bound in milliseconds on a single serial read.
    #[arg(long, env = "PADLINK_READ_TIMEOUT_MS")]
    read_timeout_ms: Option<u64>,

    /// Milliseconds a relay sleeps after a poll that produced no line.
    #[arg(long, env = "PADLINK_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Case-sensitive substring a port description must contain.
    #[arg(long, env = "PADLINK_DEVICE_FILTER")]
    device_filter: Option<String>,

    /// Messages buffered per WebSocket client before dropping.
    #[arg(long, env = "PADLINK_CLIENT_QUEUE")]
    client_queue: Option<usize>,

    /// Path to a TOML configuration file.
    #[arg(long, env = "PADLINK_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Merges defaults, the config file and these arguments.
    ///
    /// Returns the final configuration and the log level from the config
    /// file, if it sets one.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the merged configuration is invalid.
    fn into_bridge_config(self) -> anyhow::Result<(BridgeConfig, Option<String>)> {
        let mut config = BridgeConfig::default();
        let mut log_level = None;

        if let Some(path) = &self.config {
            let file = load_config_file(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?;
            file.apply_to(&mut config);
            log_level = file.log_level().map(str::to_owned);
        }

        let ms = Duration::from_millis;
        if let Some(host) = self.host {
            config.ws_host = host;
        }
        if let Some(port) = self.port {
            config.ws_port = port;
        }
        if let Some(baud) = self.baud_rate {
            config.baud_rate = baud;
        }
        if let Some(n) = self.max_players {
            config.max_players = n;
        }
        if let Some(v) = self.scan_interval_ms {
            config.scan_interval = ms(v);
        }
        if let Some(v) = self.read_timeout_ms {
            config.read_timeout = ms(v);
        }
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval = ms(v);
        }
        if let Some(filter) = self.device_filter {
            config.device_filter = filter;
        }
        if let Some(cap) = self.client_queue {
            config.client_queue_capacity = cap;
        }

        config.validate().map_err(ConfigError::from)?;
        Ok((config, log_level))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged with the config file.
/// 2. `tracing_subscriber` is initialised.
/// 3. A Ctrl+C handler is spawned; it clears a shared `AtomicBool`.
/// 4. The connection supervisor starts scanning serial ports.
/// 5. [`run_server`] accepts WebSocket clients until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, file_log_level) = Cli::parse().into_bridge_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(file_log_level.as_deref().unwrap_or("info"))
        }))
        .init();

    let filter = DescriptionFilter::new(config.device_filter.clone());
    info!(
        "padlink bridge starting: ws={}, {} players, filter {:?}, {} baud",
        config.ws_bind_addr(),
        config.max_players,
        filter.needle(),
        config.baud_rate
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Wiring ────────────────────────────────────────────────────────────────
    let registry = new_registry(config.max_players);
    let clients = Arc::new(ClientSet::new());

    let supervisor = ConnectionSupervisor::new(
        Arc::new(NativeSerialTransport::new()),
        Arc::new(filter),
        Arc::clone(&registry),
        Arc::clone(&clients),
        SupervisorSettings::from(&config),
    );
    let supervisor_running = Arc::clone(&running);
    let supervisor_task = tokio::spawn(async move { supervisor.run(supervisor_running).await });

    let ctx = SessionContext {
        clients,
        router: InboundRouter::new(registry),
        queue_capacity: config.client_queue_capacity,
    };

    // ── Main server loop ──────────────────────────────────────────────────────
    let served = run_server(&config, ctx, Arc::clone(&running)).await;

    running.store(false, Ordering::Relaxed);
    supervisor_task.abort();
    served?;

    info!("padlink bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
