//! ConnectionSupervisor: keeps the registry in step with the plugged-in
//! controllers.
//!
//! Every scan interval the supervisor:
//!
//! 1. Lists the serial ports and keeps those accepted by the device filter.
//! 2. For each qualifying port that is not bound: takes the lowest free
//!    player slot, opens the port, binds it, broadcasts `connected` and
//!    starts an [`OutboundRelay`].
//! 3. For each `Running` binding whose port is no longer listed: marks it
//!    `Closing` and closes its handle.  The relay finishes the teardown.
//!
//! Nothing that goes wrong during a scan stops the loop.  Open failures and
//! slot exhaustion leave the device unbound until the next scan; a failed
//! enumeration abandons that scan only.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use padlink_core::{DeviceFilter, DeviceId, DeviceInfo, Envelope, PlayerSlot};

use crate::application::{ClientSet, OutboundRelay, SharedRegistry};
use crate::domain::BridgeConfig;
use crate::infrastructure::serial::{SerialError, SerialTransport};

/// Timing and port parameters used by the supervisor and its relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub poll_interval: Duration,
    pub scan_interval: Duration,
}

impl From<&BridgeConfig> for SupervisorSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout,
            poll_interval: config.poll_interval,
            scan_interval: config.scan_interval,
        }
    }
}

/// What one scan changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Newly bound devices with their player slots.
    pub bound: Vec<(PlayerSlot, DeviceId)>,
    /// Devices that vanished and had their handle closed.
    pub closed: Vec<DeviceId>,
    /// Qualifying devices left unbound because every slot was taken.
    pub skipped_no_slot: Vec<DeviceId>,
    /// Qualifying devices that could not be opened or bound.
    pub failed_open: Vec<DeviceId>,
}

impl ScanReport {
    /// `true` if the scan changed nothing and skipped nothing.
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
            && self.closed.is_empty()
            && self.skipped_no_slot.is_empty()
            && self.failed_open.is_empty()
    }
}

/// Periodic device scanner.
pub struct ConnectionSupervisor {
    transport: Arc<dyn SerialTransport>,
    filter: Arc<dyn DeviceFilter>,
    registry: SharedRegistry,
    clients: Arc<ClientSet>,
    settings: SupervisorSettings,
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn SerialTransport>,
        filter: Arc<dyn DeviceFilter>,
        registry: SharedRegistry,
        clients: Arc<ClientSet>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            transport,
            filter,
            registry,
            clients,
            settings,
        }
    }

    /// Scans every `scan_interval` until `running` is cleared.
    ///
    /// The first scan happens immediately.
    pub async fn run(&self, running: Arc<AtomicBool>) {
        let mut ticker = interval(self.settings.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "scanning for controllers every {:?}",
            self.settings.scan_interval
        );
        loop {
            ticker.tick().await;
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping device scans");
                break;
            }
            match self.scan_once().await {
                Ok(report) if !report.is_empty() => debug!("scan: {report:?}"),
                Ok(_) => {}
                Err(e) => error!("device scan failed: {e}"),
            }
        }
    }

    /// Performs exactly one scan.
    ///
    /// # Errors
    ///
    /// Only [`SerialError::Enumerate`]; every per-device failure is logged
    /// and recorded in the returned [`ScanReport`] instead.
    pub async fn scan_once(&self) -> Result<ScanReport, SerialError> {
        let devices = self.transport.list_devices()?;
        debug!(
            "{} serial port(s): {}",
            devices.len(),
            devices
                .iter()
                .map(|d| format!("{} [{}]", d.id, d.description))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let qualifying: Vec<DeviceInfo> = devices
            .into_iter()
            .filter(|d| self.filter.qualifies(d))
            .collect();

        let mut report = ScanReport::default();
        for device in &qualifying {
            self.try_bind(&device.id, &mut report).await;
        }

        let visible: HashSet<DeviceId> = qualifying.into_iter().map(|d| d.id).collect();
        self.close_vanished(&visible, &mut report).await;

        Ok(report)
    }

    async fn try_bind(&self, device_id: &DeviceId, report: &mut ScanReport) {
        let slot = {
            let registry = self.registry.lock().await;
            if registry.is_bound(device_id) {
                return;
            }
            registry.allocate_slot()
        };
        let Some(slot) = slot else {
            warn!("no free player slot for {device_id}; will retry");
            report.skipped_no_slot.push(device_id.clone());
            return;
        };

        let handle = match self
            .transport
            .open(device_id, self.settings.baud_rate, self.settings.read_timeout)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!("{e}; will retry");
                report.failed_open.push(device_id.clone());
                return;
            }
        };

        {
            let mut registry = self.registry.lock().await;
            if let Err(e) = registry.bind(device_id.clone(), slot, Arc::clone(&handle)) {
                drop(registry);
                error!("could not bind {device_id}: {e}");
                handle.close().await;
                report.failed_open.push(device_id.clone());
                return;
            }

            // Queued under the lock so it cannot overtake a `disconnected`.
            info!("player {slot} connected ({device_id})");
            self.clients
                .broadcast(&Envelope::connected(slot, device_id.clone()))
                .await;
        }

        OutboundRelay::new(
            slot,
            handle,
            Arc::clone(&self.registry),
            Arc::clone(&self.clients),
            self.settings.poll_interval,
        )
        .spawn();

        report.bound.push((slot, device_id.clone()));
    }

    async fn close_vanished(&self, visible: &HashSet<DeviceId>, report: &mut ScanReport) {
        let vanished = self.registry.lock().await.vanished(visible);
        for device_id in vanished {
            let handle = self.registry.lock().await.mark_closing(&device_id);
            if let Some(handle) = handle {
                info!("{device_id} is gone; closing");
                handle.close().await;
                report.closed.push(device_id);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
