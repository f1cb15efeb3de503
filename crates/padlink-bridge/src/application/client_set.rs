//! ClientSet: every connected websocket client and its outgoing queue.
//!
//! Each session registers a bounded `mpsc` sender here.  The session's own
//! writer task drains the receiving end into the websocket, so a broadcast
//! only ever enqueues and never waits on a slow network peer.
//!
//! Delivery is best effort: when a client's queue is full (or its session is
//! already gone) the message is dropped for that client only.  Clients are
//! removed by their session on disconnect, never by a failed broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use padlink_core::Envelope;

/// Identifier of one websocket session.
pub type ClientId = Uuid;

/// Result of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients the message was queued for.
    pub delivered: usize,
    /// Clients skipped because their queue was full or closed.
    pub dropped: usize,
}

/// Set of live websocket clients.
#[derive(Debug, Default)]
pub struct ClientSet {
    clients: RwLock<HashMap<ClientId, mpsc::Sender<Arc<str>>>>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client.  Registering the same id again replaces its queue.
    pub async fn register(&self, id: ClientId, queue: mpsc::Sender<Arc<str>>) {
        self.clients.write().await.insert(id, queue);
    }

    /// Removes a client.  Returns `false` if it was not registered.
    pub async fn unregister(&self, id: &ClientId) -> bool {
        self.clients.write().await.remove(id).is_some()
    }

    /// Number of registered clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Serializes `envelope` once and queues it for every client.
    pub async fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let text: Arc<str> = match envelope.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!("failed to serialize envelope for player {}: {e}", envelope.player());
                return BroadcastReport::default();
            }
        };

        let clients = self.clients.read().await;
        let mut report = BroadcastReport::default();
        for (id, queue) in clients.iter() {
            match queue.try_send(Arc::clone(&text)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("client {id} is not keeping up; message dropped");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    // Session is shutting down and will unregister itself.
                    report.dropped += 1;
                }
            }
        }
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use padlink_core::PlayerSlot;

    fn player(n: u8) -> PlayerSlot {
        PlayerSlot::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        // Arrange
        let set = ClientSet::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        set.register(Uuid::new_v4(), tx_a).await;
        set.register(Uuid::new_v4(), tx_b).await;

        // Act
        let report = set.broadcast(&Envelope::output(player(1), "HELLO")).await;

        // Assert
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
        let expected = r#"{"player":1,"data":"HELLO"}"#;
        assert_eq!(&*rx_a.recv().await.unwrap(), expected);
        assert_eq!(&*rx_b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_broadcast_with_no_clients_is_a_no_op() {
        let set = ClientSet::new();
        let report = set.broadcast(&Envelope::output(player(1), "x")).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_for_that_client() {
        // Arrange: slow client has capacity 1 and never drains
        let set = ClientSet::new();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        set.register(Uuid::new_v4(), slow_tx).await;
        set.register(Uuid::new_v4(), fast_tx).await;

        // Act
        set.broadcast(&Envelope::output(player(1), "one")).await;
        let report = set.broadcast(&Envelope::output(player(1), "two")).await;

        // Assert
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(fast_rx.recv().await.unwrap().contains("one"));
        assert!(fast_rx.recv().await.unwrap().contains("two"));
        // The slow client is still registered
        assert_eq!(set.len().await, 2);
    }

    #[tokio::test]
    async fn test_closed_queue_counts_as_dropped() {
        let set = ClientSet::new();
        let (tx, rx) = mpsc::channel(1);
        set.register(Uuid::new_v4(), tx).await;
        drop(rx);

        let report = set.broadcast(&Envelope::output(player(1), "x")).await;

        assert_eq!(report.dropped, 1);
    }

    #[tokio::test]
    async fn test_unregister_removes_client() {
        let set = ClientSet::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        set.register(id, tx).await;

        assert!(set.unregister(&id).await);
        assert!(!set.unregister(&id).await);
        assert!(set.is_empty().await);
    }
}
