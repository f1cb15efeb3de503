//! Integration tests: supervisor, relays, router and client set working
//! together over the in-memory serial bus.
//!
//! The supervisor is driven one scan at a time with `scan_once()` so every
//! test controls exactly when devices appear and disappear.  Relays run as
//! real Tokio tasks; envelopes are observed through a registered client
//! queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use padlink_bridge::application::{
    new_registry, ClientSet, ConnectionSupervisor, InboundRouter, RouteOutcome, SharedRegistry,
    SupervisorSettings,
};
use padlink_bridge::infrastructure::serial::mock::MockSerialBus;
use padlink_core::{DescriptionFilter, DeviceId, PlayerSlot};

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Harness {
    bus: MockSerialBus,
    registry: SharedRegistry,
    supervisor: ConnectionSupervisor,
    router: InboundRouter,
    rx: mpsc::Receiver<Arc<str>>,
}

async fn harness(max_players: u8) -> Harness {
    let bus = MockSerialBus::new();
    let registry = new_registry(max_players);
    let clients = Arc::new(ClientSet::new());
    let (tx, rx) = mpsc::channel(256);
    clients.register(Uuid::new_v4(), tx).await;

    let supervisor = ConnectionSupervisor::new(
        Arc::new(bus.clone()),
        Arc::new(DescriptionFilter::default()),
        Arc::clone(&registry),
        clients,
        SupervisorSettings {
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(5),
            poll_interval: Duration::from_millis(1),
            scan_interval: Duration::from_millis(50),
        },
    );
    let router = InboundRouter::new(Arc::clone(&registry));

    Harness {
        bus,
        registry,
        supervisor,
        router,
        rx,
    }
}

/// Waits for the next envelope and parses it.
async fn next_envelope(rx: &mut mpsc::Receiver<Arc<str>>) -> Value {
    let text = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("envelope within 2s")
        .expect("client queue open");
    serde_json::from_str(&text).expect("envelope is JSON")
}

fn slot(n: u8) -> PlayerSlot {
    PlayerSlot::new(n).unwrap()
}

// ── End-to-end lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_controller_connect_output_disconnect() {
    // Arrange
    let mut h = harness(4).await;
    h.bus.plug("/dev/ttyUSB0", "USB Serial");

    // Act + Assert: appears → player 1
    h.supervisor.scan_once().await.unwrap();
    assert_eq!(
        next_envelope(&mut h.rx).await,
        json!({"status": "connected", "player": 1, "port": "/dev/ttyUSB0"})
    );

    // Emits a line → relayed to clients
    h.bus.feed_line("/dev/ttyUSB0", "HELLO");
    assert_eq!(
        next_envelope(&mut h.rx).await,
        json!({"player": 1, "data": "HELLO"})
    );

    // Vanishes → disconnected, slot free again
    h.bus.unplug("/dev/ttyUSB0");
    let report = h.supervisor.scan_once().await.unwrap();
    assert_eq!(report.closed, vec![DeviceId::new("/dev/ttyUSB0")]);
    assert_eq!(
        next_envelope(&mut h.rx).await,
        json!({"status": "disconnected", "player": 1, "port": "/dev/ttyUSB0"})
    );
    let registry = h.registry.lock().await;
    assert!(registry.is_empty());
    assert_eq!(registry.allocate_slot(), Some(slot(1)));
}

#[tokio::test]
async fn test_freed_slot_is_reused_by_next_controller() {
    // Arrange: A → 1, B → 2
    let mut h = harness(4).await;
    h.bus.plug("A", "USB Serial");
    h.bus.plug("B", "USB Serial");
    h.supervisor.scan_once().await.unwrap();
    next_envelope(&mut h.rx).await;
    next_envelope(&mut h.rx).await;

    // Act: A leaves, C arrives
    h.bus.unplug("A");
    h.supervisor.scan_once().await.unwrap();
    let gone = next_envelope(&mut h.rx).await;
    h.bus.plug("C", "USB Serial");
    let report = h.supervisor.scan_once().await.unwrap();

    // Assert
    assert_eq!(gone["status"], "disconnected");
    assert_eq!(gone["player"], 1);
    assert_eq!(report.bound, vec![(slot(1), DeviceId::new("C"))]);
    assert_eq!(
        next_envelope(&mut h.rx).await,
        json!({"status": "connected", "player": 1, "port": "C"})
    );
}

#[tokio::test]
async fn test_at_most_max_players_are_bound() {
    // Arrange
    let h = harness(4).await;
    for i in 0..6 {
        h.bus.plug(format!("/dev/ttyUSB{i}"), "USB Serial");
    }

    // Act
    let report = h.supervisor.scan_once().await.unwrap();

    // Assert
    assert_eq!(report.bound.len(), 4);
    assert_eq!(report.skipped_no_slot.len(), 2);
    let registry = h.registry.lock().await;
    let slots: HashSet<PlayerSlot> = registry.all_bindings().map(|b| b.slot).collect();
    assert_eq!(slots, (1..=4).map(slot).collect());
}

#[tokio::test]
async fn test_non_qualifying_devices_are_ignored() {
    let h = harness(4).await;
    h.bus.plug("/dev/ttyS0", "Intel AMT SOL");
    h.bus.plug("/dev/ttyACM0", "usb serial");

    let report = h.supervisor.scan_once().await.unwrap();

    // The filter is case-sensitive.
    assert!(report.is_empty());
    assert_eq!(h.bus.open_count("/dev/ttyACM0"), 0);
}

#[tokio::test]
async fn test_broken_controller_is_unbound_and_rebound_next_scan() {
    // Arrange
    let mut h = harness(4).await;
    h.bus.plug("A", "USB Serial");
    h.supervisor.scan_once().await.unwrap();
    next_envelope(&mut h.rx).await;

    // Act: read error while the port is still listed
    h.bus.break_device("A");
    let gone = next_envelope(&mut h.rx).await;
    let report = h.supervisor.scan_once().await.unwrap();

    // Assert
    assert_eq!(gone["status"], "disconnected");
    assert_eq!(report.bound, vec![(slot(1), DeviceId::new("A"))]);
    assert_eq!(h.bus.open_count("A"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rebind_after_read_error_is_announced_after_disconnect() {
    // Arrange
    let mut h = harness(4).await;
    h.bus.plug("A", "USB Serial");
    h.supervisor.scan_once().await.unwrap();
    next_envelope(&mut h.rx).await;

    // Act: keep scanning while the relay tears down
    h.bus.break_device("A");
    let mut rebound = false;
    for _ in 0..1000 {
        if !h.supervisor.scan_once().await.unwrap().bound.is_empty() {
            rebound = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // Assert
    assert!(rebound, "device was never rebound");
    assert_eq!(
        next_envelope(&mut h.rx).await,
        json!({"status": "disconnected", "player": 1, "port": "A"})
    );
    assert_eq!(
        next_envelope(&mut h.rx).await,
        json!({"status": "connected", "player": 1, "port": "A"})
    );
}

// ── Routing through bound controllers ─────────────────────────────────────────

async fn three_players(h: &mut Harness) {
    for name in ["A", "B", "C"] {
        h.bus.plug(name, "USB Serial");
    }
    h.supervisor.scan_once().await.unwrap();
    for _ in 0..3 {
        next_envelope(&mut h.rx).await;
    }
}

#[tokio::test]
async fn test_targeted_message_reaches_only_its_player() {
    // Arrange: BTreeMap order binds A=1, B=2, C=3
    let mut h = harness(4).await;
    three_players(&mut h).await;
    let raw = r#"{"player_id": 2, "x":1}"#;

    // Act
    let outcome = h.router.route(raw).await;

    // Assert
    assert_eq!(outcome.succeeded(), vec![slot(2)]);
    assert!(h.bus.written("A").is_empty());
    assert_eq!(h.bus.written("B"), vec![format!("{raw}\n")]);
    assert!(h.bus.written("C").is_empty());
}

#[tokio::test]
async fn test_broadcast_message_reaches_every_player() {
    let mut h = harness(4).await;
    three_players(&mut h).await;

    h.router.route(r#"{"x":1}"#).await;

    for name in ["A", "B", "C"] {
        assert_eq!(h.bus.written(name), vec!["{\"x\":1}\n".to_string()]);
    }
}

#[tokio::test]
async fn test_malformed_input_writes_nothing() {
    let mut h = harness(4).await;
    three_players(&mut h).await;

    let outcome = h.router.route("definitely not json").await;

    assert!(matches!(outcome, RouteOutcome::Rejected(_)));
    for name in ["A", "B", "C"] {
        assert!(h.bus.written(name).is_empty());
    }
}

#[tokio::test]
async fn test_message_to_unbound_player_is_dropped() {
    let mut h = harness(4).await;
    three_players(&mut h).await;

    let outcome = h.router.route(r#"{"player_id": 4}"#).await;

    assert!(matches!(outcome, RouteOutcome::TargetNotFound(ref id) if id == "4"));
    for name in ["A", "B", "C"] {
        assert!(h.bus.written(name).is_empty());
    }
}

#[tokio::test]
async fn test_messages_from_one_client_keep_their_order() {
    let mut h = harness(4).await;
    three_players(&mut h).await;

    for i in 0..5 {
        h.router.route(&format!(r#"{{"player_id":1,"seq":{i}}}"#)).await;
    }

    let expected: Vec<String> = (0..5)
        .map(|i| format!("{{\"player_id\":1,\"seq\":{i}}}\n"))
        .collect();
    assert_eq!(h.bus.written("A"), expected);
}
