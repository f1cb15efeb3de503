//! PlayerRegistry: which serial device holds which player slot.
//!
//! The registry is the single owner of every [`PlayerBinding`].  Other
//! components only ever hold a [`DeviceId`] and look the binding up again
//! when they need it, so a binding that disappears concurrently is observed
//! as "not found" instead of a dangling reference.
//!
//! # Binding lifecycle
//!
//! ```text
//!   bind()            mark_closing()            unbind()
//! ────────► Running ─────────────────► Closing ──────────► (removed)
//!              │                                    ▲
//!              └────────────────────────────────────┘
//!                 unbind() after a relay I/O error
//! ```
//!
//! - `Running`: the handle is open and its relay task is reading from it.
//! - `Closing`: the device vanished from enumeration; the supervisor has
//!   closed the handle and is waiting for the relay to notice and unbind.
//!
//! Only the relay calls [`PlayerRegistry::unbind`].  The supervisor uses
//! [`PlayerRegistry::mark_closing`], which hands out the handle exactly once,
//! so the two sides never tear down the same device twice.
//!
//! # Generic handle
//!
//! The registry is generic over the handle type `H` so this crate stays free
//! of serial or async dependencies.  The bridge instantiates it with a
//! reference-counted trait object; tests use plain strings or integers.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use super::device::DeviceId;
use super::slot::{PlayerSlot, SlotAllocator};

/// Errors returned when a bind request violates a registry invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The device already holds a slot.
    #[error("device {0} is already bound")]
    AlreadyBound(DeviceId),
    /// Another device already holds the requested slot.
    #[error("player slot {0} is already in use")]
    SlotInUse(PlayerSlot),
    /// The slot lies outside `1..=max_players`.
    #[error("player slot {slot} exceeds the maximum of {max_players}")]
    SlotOutOfRange { slot: PlayerSlot, max_players: u8 },
}

/// Liveness flag of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Handle open, relay running.
    Running,
    /// Device vanished; handle closed by the supervisor, relay not yet finished.
    Closing,
}

/// One device ↔ player association.
#[derive(Debug, Clone)]
pub struct PlayerBinding<H> {
    pub device_id: DeviceId,
    pub slot: PlayerSlot,
    pub handle: H,
    pub state: BindingState,
}

impl<H> PlayerBinding<H> {
    /// `true` while the binding may receive writes.
    pub fn is_running(&self) -> bool {
        self.state == BindingState::Running
    }
}

/// In-memory map of bound devices plus the slot allocator.
///
/// # HashMap choice
///
/// A `HashMap<DeviceId, PlayerBinding<H>>` gives O(1) lookup by device.
/// Iteration order is not guaranteed; broadcast writes are explicitly
/// unordered, so that is fine.  Slot lookups scan the map, which is bounded
/// by `max_players` (at most 255 entries).
#[derive(Debug)]
pub struct PlayerRegistry<H> {
    bindings: HashMap<DeviceId, PlayerBinding<H>>,
    slots: SlotAllocator,
}

impl<H: Clone> PlayerRegistry<H> {
    /// Creates an empty registry allowing `max_players` simultaneous bindings.
    pub fn new(max_players: u8) -> Self {
        Self {
            bindings: HashMap::new(),
            slots: SlotAllocator::new(max_players),
        }
    }

    /// Upper bound on simultaneous bindings.
    pub fn max_players(&self) -> u8 {
        self.slots.max_players()
    }

    /// Returns the smallest unused slot, or `None` when every slot is taken.
    ///
    /// The slot is not reserved until [`bind`](Self::bind) is called.
    pub fn allocate_slot(&self) -> Option<PlayerSlot> {
        self.slots.peek()
    }

    /// Records a new binding in the `Running` state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyBound`] if `device_id` already holds a
    /// slot, [`RegistryError::SlotInUse`] if `slot` is taken, and
    /// [`RegistryError::SlotOutOfRange`] if `slot > max_players`.
    pub fn bind(&mut self, device_id: DeviceId, slot: PlayerSlot, handle: H) -> Result<(), RegistryError> {
        if self.bindings.contains_key(&device_id) {
            return Err(RegistryError::AlreadyBound(device_id));
        }
        if !self.slots.in_range(slot) {
            return Err(RegistryError::SlotOutOfRange {
                slot,
                max_players: self.slots.max_players(),
            });
        }
        if self.slots.is_used(slot) {
            return Err(RegistryError::SlotInUse(slot));
        }
        self.slots.reserve(slot);

        debug!("bound {device_id} to player {slot}");
        self.bindings.insert(
            device_id.clone(),
            PlayerBinding {
                device_id,
                slot,
                handle,
                state: BindingState::Running,
            },
        );
        Ok(())
    }

    /// Removes the binding for `device_id` and frees its slot.
    ///
    /// Returns the freed slot, or `None` if the device was not bound (for
    /// example because it was already unbound).
    pub fn unbind(&mut self, device_id: &DeviceId) -> Option<PlayerSlot> {
        let binding = self.bindings.remove(device_id)?;
        self.slots.release(binding.slot);
        debug!("unbound {device_id}, player {} is free", binding.slot);
        Some(binding.slot)
    }

    /// Moves a `Running` binding to `Closing` and returns its handle.
    ///
    /// Returns `None` if the device is not bound or is already closing, so
    /// the caller closes each handle at most once.
    pub fn mark_closing(&mut self, device_id: &DeviceId) -> Option<H> {
        let binding = self.bindings.get_mut(device_id)?;
        if binding.state != BindingState::Running {
            return None;
        }
        binding.state = BindingState::Closing;
        Some(binding.handle.clone())
    }

    /// Finds the binding holding `slot`.
    pub fn lookup_by_slot(&self, slot: PlayerSlot) -> Option<&PlayerBinding<H>> {
        self.bindings.values().find(|b| b.slot == slot)
    }

    /// Finds the binding for `device_id`.
    pub fn lookup_by_device(&self, device_id: &DeviceId) -> Option<&PlayerBinding<H>> {
        self.bindings.get(device_id)
    }

    /// Returns `true` if `device_id` holds a slot (in any state).
    pub fn is_bound(&self, device_id: &DeviceId) -> bool {
        self.bindings.contains_key(device_id)
    }

    /// All bindings, in unspecified order.
    pub fn all_bindings(&self) -> impl Iterator<Item = &PlayerBinding<H>> {
        self.bindings.values()
    }

    /// Bound devices that are still `Running` but absent from `visible`.
    pub fn vanished(&self, visible: &HashSet<DeviceId>) -> Vec<DeviceId> {
        self.bindings
            .values()
            .filter(|b| b.is_running() && !visible.contains(&b.device_id))
            .map(|b| b.device_id.clone())
            .collect()
    }

    /// Number of bindings (running or closing).
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// `true` when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
