//! OutboundRelay: forwards one controller's output to every client.
//!
//! # State machine
//!
//! ```text
//!            handle closed / read error
//!  Running ──────────────────────────────► Closing ──► Stopped
//!     ▲  │                                    │
//!     └──┘ line → broadcast                   └─ unbind + "disconnected"
//!          nothing → sleep(poll_interval)
//! ```
//!
//! The relay is never cancelled from outside.  The supervisor closes the
//! handle when the device vanishes and the relay notices on its next poll.
//! Because the relay is the only component that unbinds, the player slot and
//! the `disconnected` envelope are released exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use padlink_core::{DeviceId, Envelope, PlayerSlot};

use crate::application::{ClientSet, SharedRegistry};
use crate::infrastructure::serial::{DeviceHandleRef, SerialError};

/// Lifecycle of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Polling the device.
    Running,
    /// The handle is closed; cleanup pending.
    Closing,
    /// Cleanup done; the task has exited or is about to.
    Stopped,
}

/// Per-device relay task.
pub struct OutboundRelay {
    device_id: DeviceId,
    slot: PlayerSlot,
    handle: DeviceHandleRef,
    registry: SharedRegistry,
    clients: Arc<ClientSet>,
    poll_interval: Duration,
    state: RelayState,
}

impl OutboundRelay {
    pub fn new(
        slot: PlayerSlot,
        handle: DeviceHandleRef,
        registry: SharedRegistry,
        clients: Arc<ClientSet>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            device_id: handle.device_id().clone(),
            slot,
            handle,
            registry,
            clients,
            poll_interval,
            state: RelayState::Running,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Runs the relay on its own Tokio task.
    pub fn spawn(self) -> JoinHandle<Option<PlayerSlot>> {
        tokio::spawn(self.run())
    }

    /// Polls until the handle closes, then cleans up.
    ///
    /// Returns the freed slot, or `None` if the binding was already gone.
    pub async fn run(mut self) -> Option<PlayerSlot> {
        debug!("relay for player {} ({}) started", self.slot, self.device_id);
        while self.state == RelayState::Running {
            self.step().await;
        }
        self.finalize().await
    }

    /// Performs one poll of the device and returns the resulting state.
    pub async fn step(&mut self) -> RelayState {
        if self.state != RelayState::Running {
            return self.state;
        }
        if !self.handle.is_open() {
            self.state = RelayState::Closing;
            return self.state;
        }

        match self.handle.read_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                if !line.is_empty() {
                    self.clients
                        .broadcast(&Envelope::output(self.slot, line))
                        .await;
                }
            }
            Ok(None) => sleep(self.poll_interval).await,
            Err(SerialError::Closed(_)) => {
                self.state = RelayState::Closing;
            }
            Err(e) => {
                warn!("player {}: {e}", self.slot);
                // Release the OS port ourselves; the supervisor only closes
                // handles of devices that vanished from enumeration.
                self.handle.close().await;
                self.state = RelayState::Closing;
            }
        }
        self.state
    }

    /// Unbinds the player (if still bound to this device) and announces the
    /// disconnect.
    ///
    /// The envelope is queued before the registry lock is released, so a
    /// rebind of the same device is always announced after it.
    async fn finalize(&mut self) -> Option<PlayerSlot> {
        if self.handle.is_open() {
            self.handle.close().await;
        }
        self.state = RelayState::Stopped;

        let mut registry = self.registry.lock().await;
        let ours = registry
            .lookup_by_device(&self.device_id)
            .is_some_and(|b| b.slot == self.slot);
        let freed = if ours {
            registry.unbind(&self.device_id)
        } else {
            None
        };

        match freed {
            Some(slot) => {
                info!("player {slot} disconnected ({})", self.device_id);
                self.clients
                    .broadcast(&Envelope::disconnected(slot, self.device_id.clone()))
                    .await;
            }
            None => debug!("{} was already unbound", self.device_id),
        }
        freed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
