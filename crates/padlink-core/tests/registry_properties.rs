//! Integration tests for the player registry invariants.
//!
//! These tests drive [`PlayerRegistry`] through its public API the way the
//! bridge's supervisor and relays use it: allocate, bind, mark closing,
//! unbind, repeated over long connect/disconnect sequences.
//!
//! # Invariants checked
//!
//! - At most `max_players` bindings exist at any instant.
//! - No two bindings share a slot.
//! - Freed slots are reused lowest-first.
//! - Unbinding twice only has an effect the first time.

use std::collections::HashSet;

use padlink_core::{DeviceId, PlayerRegistry, PlayerSlot};

fn slot(n: u8) -> PlayerSlot {
    PlayerSlot::new(n).unwrap()
}

/// Binds `id` to the next free slot the way the supervisor does.
fn connect(reg: &mut PlayerRegistry<()>, id: &str) -> Option<PlayerSlot> {
    let s = reg.allocate_slot()?;
    reg.bind(DeviceId::new(id), s, ()).expect("allocated slot must bind");
    Some(s)
}

fn assert_invariants(reg: &PlayerRegistry<()>) {
    let slots: Vec<PlayerSlot> = reg.all_bindings().map(|b| b.slot).collect();
    let unique: HashSet<PlayerSlot> = slots.iter().copied().collect();
    assert!(slots.len() <= usize::from(reg.max_players()), "too many bindings");
    assert_eq!(unique.len(), slots.len(), "two bindings share a slot");
    assert!(
        slots.iter().all(|s| s.get() >= 1 && s.get() <= reg.max_players()),
        "slot out of range: {slots:?}"
    );
}

#[test]
fn test_slot_reuse_after_disconnect_gives_lowest_free() {
    // Arrange: A holds 1, C holds 2
    let mut reg = PlayerRegistry::new(4);
    assert_eq!(connect(&mut reg, "A"), Some(slot(1)));
    assert_eq!(connect(&mut reg, "C"), Some(slot(2)));

    // Act: A leaves, B arrives
    reg.unbind(&DeviceId::new("A"));
    let b = connect(&mut reg, "B");

    // Assert: B takes the freed slot 1, not 3
    assert_eq!(b, Some(slot(1)));
    assert_invariants(&reg);
}

#[test]
fn test_fifth_device_is_refused_with_four_players() {
    let mut reg = PlayerRegistry::new(4);
    for id in ["a", "b", "c", "d"] {
        assert!(connect(&mut reg, id).is_some());
    }

    assert_eq!(connect(&mut reg, "e"), None);
    assert_eq!(reg.len(), 4);
    assert_invariants(&reg);
}

#[test]
fn test_numbering_is_reproducible_for_same_connection_order() {
    let order = ["/dev/ttyUSB2", "/dev/ttyUSB0", "/dev/ttyACM0"];

    let run = || {
        let mut reg = PlayerRegistry::new(4);
        order
            .iter()
            .map(|id| connect(&mut reg, id).unwrap().get())
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), vec![1, 2, 3]);
    assert_eq!(run(), run());
}

#[test]
fn test_long_connect_disconnect_sequence_keeps_invariants() {
    // A deterministic pseudo-random walk over 8 devices competing for 4 slots.
    let mut reg = PlayerRegistry::new(4);
    let devices: Vec<String> = (0..8).map(|n| format!("/dev/ttyUSB{n}")).collect();
    let mut state: u32 = 0x2545_F491;

    for _ in 0..2_000 {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;

        let id = &devices[(state % 8) as usize];
        let device = DeviceId::new(id.as_str());
        if reg.is_bound(&device) {
            if state & 0x100 == 0 {
                reg.mark_closing(&device);
            }
            reg.unbind(&device);
        } else {
            connect(&mut reg, id);
        }

        assert_invariants(&reg);
    }
}

#[test]
fn test_unbind_is_idempotent() {
    let mut reg = PlayerRegistry::new(4);
    connect(&mut reg, "A");
    connect(&mut reg, "B");

    let first = reg.unbind(&DeviceId::new("A"));
    let second = reg.unbind(&DeviceId::new("A"));

    assert_eq!(first, Some(slot(1)));
    assert_eq!(second, None);
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.allocate_slot(), Some(slot(1)));
}

#[test]
fn test_closing_binding_keeps_its_slot_until_unbound() {
    let mut reg = PlayerRegistry::new(1);
    connect(&mut reg, "A");

    reg.mark_closing(&DeviceId::new("A"));
    // A replacement controller cannot take slot 1 while A is still closing.
    assert_eq!(connect(&mut reg, "B"), None);

    reg.unbind(&DeviceId::new("A"));
    assert_eq!(connect(&mut reg, "B"), Some(slot(1)));
}
