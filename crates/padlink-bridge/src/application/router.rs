//! InboundRouter: delivers client messages to controllers.
//!
//! A message carrying `player_id` goes to that player only; any other valid
//! JSON goes to every bound player.  The controller receives the client's
//! original text followed by `\n`, never a re-encoded copy.
//!
//! Routing is fire-and-forget.  The returned [`RouteOutcome`] exists for
//! logging and tests; nothing is sent back to the client.
//!
//! # Locking
//!
//! Handles are cloned out of the registry while the lock is held and the
//! lock is released before any device write starts.  A slow controller
//! therefore never stalls the supervisor or a relay waiting on the registry.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use padlink_core::{InboundRoute, PlayerSlot, ProtocolError};

use crate::application::SharedRegistry;
use crate::infrastructure::serial::DeviceHandleRef;

/// What happened to one inbound message.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Writes were attempted on `players`; the ones in `failed` returned an
    /// error.  Both are empty for a broadcast with nothing bound.
    Delivered {
        players: Vec<PlayerSlot>,
        failed: Vec<PlayerSlot>,
    },
    /// `player_id` named a player that is not bound (or not writable).
    /// Holds the requested id as JSON text.
    TargetNotFound(String),
    /// The message was not valid JSON.
    Rejected(ProtocolError),
}

impl RouteOutcome {
    /// Players that received the message successfully.
    pub fn succeeded(&self) -> Vec<PlayerSlot> {
        match self {
            Self::Delivered { players, failed } => players
                .iter()
                .copied()
                .filter(|p| !failed.contains(p))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Routes raw client text to controller handles.
#[derive(Clone)]
pub struct InboundRouter {
    registry: SharedRegistry,
}

impl InboundRouter {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Classifies `raw` and writes it to the selected controllers.
    pub async fn route(&self, raw: &str) -> RouteOutcome {
        let route = match InboundRoute::classify(raw) {
            Ok(route) => route,
            Err(e) => {
                warn!("dropping client message: {e}");
                return RouteOutcome::Rejected(e);
            }
        };

        let targets = match self.targets(route).await {
            Ok(targets) => targets,
            Err(requested) => {
                warn!("target not found: player {requested}");
                return RouteOutcome::TargetNotFound(requested);
            }
        };

        if targets.is_empty() {
            debug!("broadcast with no players bound");
        }

        let payload = format!("{raw}\n");
        let bytes = payload.as_bytes();
        let results = join_all(targets.iter().map(|(slot, handle)| async move {
            (*slot, handle.write(bytes).await)
        }))
        .await;

        let mut failed = Vec::new();
        for (slot, result) in results {
            if let Err(e) = result {
                warn!("write to player {slot} failed: {e}");
                failed.push(slot);
            }
        }

        RouteOutcome::Delivered {
            players: targets.into_iter().map(|(slot, _)| slot).collect(),
            failed,
        }
    }

    /// Writable bindings for `route`, cloned out of the registry.
    ///
    /// A targeted route with no writable player yields the requested id.
    async fn targets(
        &self,
        route: InboundRoute,
    ) -> Result<Vec<(PlayerSlot, DeviceHandleRef)>, String> {
        let registry = self.registry.lock().await;
        match route {
            InboundRoute::Targeted(requested) => PlayerSlot::try_from(requested)
                .ok()
                .and_then(|slot| registry.lookup_by_slot(slot))
                .filter(|b| b.is_running() && b.handle.is_open())
                .map(|b| vec![(b.slot, Arc::clone(&b.handle))])
                .ok_or_else(|| requested.to_string()),
            InboundRoute::UnknownTarget(requested) => Err(requested),
            InboundRoute::Broadcast => Ok(
                registry
                    .all_bindings()
                    .filter(|b| b.is_running() && b.handle.is_open())
                    .map(|b| (b.slot, Arc::clone(&b.handle)))
                    .collect(),
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
