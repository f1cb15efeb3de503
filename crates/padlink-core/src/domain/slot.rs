//! Player slots and the lowest-free allocation policy.
//!
//! # Why "lowest free"? (for beginners)
//!
//! Players see their number on screen, so numbering must be predictable:
//! with the same plug-in order, the same controllers get the same numbers on
//! every run.  Always handing out the smallest unused number achieves that
//! and also fills gaps left by unplugged controllers first.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of simultaneous players when nothing else is configured.
pub const DEFAULT_MAX_PLAYERS: u8 = 4;

/// A player number in `1..=max_players`.
///
/// Zero is never a valid player; the constructor enforces it so that every
/// `PlayerSlot` value in the program is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PlayerSlot(u8);

impl PlayerSlot {
    /// Creates a slot, returning `None` for zero.
    pub fn new(n: u8) -> Option<Self> {
        (n >= 1).then_some(Self(n))
    }

    /// The player number as seen by clients.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for PlayerSlot {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| "player slot must be at least 1".to_string())
    }
}

impl TryFrom<u64> for PlayerSlot {
    type Error = String;

    fn try_from(n: u64) -> Result<Self, Self::Error> {
        u8::try_from(n)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("{n} is not a valid player slot"))
    }
}

impl From<PlayerSlot> for u8 {
    fn from(slot: PlayerSlot) -> u8 {
        slot.0
    }
}

/// Hands out player slots, always the smallest one not currently in use.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    max_players: u8,
    used: BTreeSet<PlayerSlot>,
}

impl SlotAllocator {
    /// Creates an allocator for slots `1..=max_players`.
    pub fn new(max_players: u8) -> Self {
        Self {
            max_players,
            used: BTreeSet::new(),
        }
    }

    /// Upper bound of the slot range.
    pub fn max_players(&self) -> u8 {
        self.max_players
    }

    /// Returns the smallest unused slot without reserving it, or `None` when
    /// every slot is taken.
    pub fn peek(&self) -> Option<PlayerSlot> {
        (1..=self.max_players)
            .filter_map(PlayerSlot::new)
            .find(|slot| !self.used.contains(slot))
    }

    /// Returns `true` if `slot` lies inside `1..=max_players`.
    pub fn in_range(&self, slot: PlayerSlot) -> bool {
        slot.get() <= self.max_players
    }

    /// Returns `true` if `slot` is currently held.
    pub fn is_used(&self, slot: PlayerSlot) -> bool {
        self.used.contains(&slot)
    }

    /// Marks `slot` as held.  Returns `false` if it already was.
    pub fn reserve(&mut self, slot: PlayerSlot) -> bool {
        self.used.insert(slot)
    }

    /// Marks `slot` as free.  Returns `false` if it was not held.
    pub fn release(&mut self, slot: PlayerSlot) -> bool {
        self.used.remove(&slot)
    }

    /// Number of slots currently held.
    pub fn used_count(&self) -> usize {
        self.used.len()
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PLAYERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: u8) -> PlayerSlot {
        PlayerSlot::new(n).unwrap()
    }

    #[test]
    fn test_player_slot_rejects_zero() {
        assert!(PlayerSlot::new(0).is_none());
        assert_eq!(PlayerSlot::new(1).map(PlayerSlot::get), Some(1));
    }

    #[test]
    fn test_player_slot_from_u64_rejects_values_above_u8() {
        assert!(PlayerSlot::try_from(256u64).is_err());
        assert!(PlayerSlot::try_from(0u64).is_err());
        assert_eq!(PlayerSlot::try_from(3u64).unwrap(), slot(3));
    }

    #[test]
    fn test_player_slot_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&slot(2)).unwrap(), "2");
        let parsed: PlayerSlot = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, slot(4));
        assert!(serde_json::from_str::<PlayerSlot>("0").is_err());
    }

    #[test]
    fn test_peek_returns_lowest_free_slot() {
        // Arrange
        let mut alloc = SlotAllocator::new(4);
        alloc.reserve(slot(1));
        alloc.reserve(slot(3));

        // Act / Assert: 2 is the smallest gap
        assert_eq!(alloc.peek(), Some(slot(2)));
    }

    #[test]
    fn test_peek_returns_none_when_exhausted() {
        let mut alloc = SlotAllocator::new(2);
        alloc.reserve(slot(1));
        alloc.reserve(slot(2));
        assert_eq!(alloc.peek(), None);
    }

    #[test]
    fn test_release_makes_slot_available_again() {
        let mut alloc = SlotAllocator::new(2);
        alloc.reserve(slot(1));
        alloc.reserve(slot(2));

        assert!(alloc.release(slot(1)));

        assert!(!alloc.is_used(slot(1)));
        assert!(alloc.is_used(slot(2)));
        assert_eq!(alloc.peek(), Some(slot(1)));
    }

    #[test]
    fn test_reserve_twice_reports_conflict() {
        let mut alloc = SlotAllocator::default();
        assert!(alloc.reserve(slot(1)));
        assert!(!alloc.reserve(slot(1)));
        assert_eq!(alloc.used_count(), 1);
    }

    #[test]
    fn test_release_unknown_slot_is_noop() {
        let mut alloc = SlotAllocator::default();
        assert!(!alloc.release(slot(3)));
    }

    #[test]
    fn test_in_range_respects_max_players() {
        let alloc = SlotAllocator::new(4);
        assert!(alloc.in_range(slot(4)));
        assert!(!alloc.in_range(slot(5)));
    }
}
