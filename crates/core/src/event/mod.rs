//! Event Gate
//!
//! Edge-triggered event flags shared between the controller link and the
//! mission loop. The controller raises an event when a mission line with an
//! `event=N` field executes; the host raises synthetic events the same way.
//!
//! # Semantics
//!
//! - Reading an event with [`EventGate::is_set`] consumes the occurrence
//! - A second read without a new occurrence returns false
//! - Ids at or above [`EVENT_CAPACITY`] never read as set
//!
//! A handler that must branch on an event more than once in a tick reads it
//! once into a local.

use core::sync::atomic::{AtomicU64, Ordering};

/// Event identifier in the controller's shared id space.
pub type EventId = u8;

/// Number of distinct event ids tracked.
pub const EVENT_CAPACITY: usize = 64;

/// Reserved event ids.
pub mod ids {
    use super::EventId;

    /// Raised by the controller when the operator (or a mission line) stops everything
    pub const ALL_STOP: EventId = 0;
    /// Completion of the approach/grab/deliver snippets
    pub const APPROACH_DONE: EventId = 1;
    /// First search-attempt completion id; attempt `n` uses `SEARCH_BASE + n`
    pub const SEARCH_BASE: EventId = 2;
    /// Completion of a marker-seek snippet
    pub const MARKER_DONE: EventId = 6;
    /// Starts slot A and stops slot B
    pub const SLOT_A_START: EventId = 30;
    /// Starts slot B and stops slot A
    pub const SLOT_B_START: EventId = 31;
    /// Operator "go" button on the controller
    pub const OPERATOR_GO: EventId = 33;
}

/// Clear-on-read view of the event flags.
pub trait EventGate {
    /// Returns whether `id` fired since the last read, and clears it.
    fn is_set(&self, id: EventId) -> bool;

    /// Discard every pending occurrence.
    fn clear_all(&self);
}

/// Lock-free event flag set.
///
/// Producers call [`raise`](EventFlags::raise) from any thread; the mission
/// loop consumes through [`EventGate`].
#[derive(Debug, Default)]
pub struct EventFlags {
    bits: AtomicU64,
}

impl EventFlags {
    /// Create an empty flag set (const fn for static initialization).
    pub const fn new() -> Self {
        Self {
            bits: AtomicU64::new(0),
        }
    }

    /// Record an occurrence of `id`. Unknown ids are ignored.
    pub fn raise(&self, id: EventId) {
        if let Some(mask) = Self::mask(id) {
            self.bits.fetch_or(mask, Ordering::AcqRel);
        }
    }

    /// Peek at `id` without consuming it.
    pub fn pending(&self, id: EventId) -> bool {
        Self::mask(id).is_some_and(|mask| self.bits.load(Ordering::Acquire) & mask != 0)
    }

    /// True if no event is pending.
    pub fn is_empty(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }

    fn mask(id: EventId) -> Option<u64> {
        if (id as usize) < EVENT_CAPACITY {
            Some(1u64 << id)
        } else {
            None
        }
    }
}

impl EventGate for EventFlags {
    fn is_set(&self, id: EventId) -> bool {
        match Self::mask(id) {
            Some(mask) => self.bits.fetch_and(!mask, Ordering::AcqRel) & mask != 0,
            None => false,
        }
    }

    fn clear_all(&self) {
        self.bits.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_event_reads_false() {
        let flags = EventFlags::new();
        assert!(!flags.is_set(ids::APPROACH_DONE));
    }

    #[test]
    fn test_clear_on_read() {
        let flags = EventFlags::new();
        flags.raise(ids::APPROACH_DONE);

        assert!(flags.is_set(ids::APPROACH_DONE));
        assert!(!flags.is_set(ids::APPROACH_DONE));
    }

    #[test]
    fn test_read_only_clears_requested_event() {
        let flags = EventFlags::new();
        flags.raise(3);
        flags.raise(33);

        assert!(flags.is_set(3));
        assert!(flags.pending(33));
        assert!(flags.is_set(33));
        assert!(flags.is_empty());
    }

    #[test]
    fn test_raise_twice_delivers_once() {
        let flags = EventFlags::new();
        flags.raise(5);
        flags.raise(5);

        assert!(flags.is_set(5));
        assert!(!flags.is_set(5));
    }

    #[test]
    fn test_unknown_id_never_set() {
        let flags = EventFlags::new();
        flags.raise(64);
        flags.raise(200);

        assert!(flags.is_empty());
        assert!(!flags.is_set(64));
        assert!(!flags.pending(200));
    }

    #[test]
    fn test_highest_id_is_tracked() {
        let flags = EventFlags::new();
        flags.raise(63);
        assert!(flags.is_set(63));
    }

    #[test]
    fn test_clear_all_discards_stale_events() {
        let flags = EventFlags::new();
        flags.raise(ids::ALL_STOP);
        flags.raise(ids::OPERATOR_GO);

        flags.clear_all();

        assert!(!flags.is_set(ids::ALL_STOP));
        assert!(!flags.is_set(ids::OPERATOR_GO));
    }

    #[test]
    fn test_pending_does_not_consume() {
        let flags = EventFlags::new();
        flags.raise(7);

        assert!(flags.pending(7));
        assert!(flags.pending(7));
        assert!(flags.is_set(7));
    }
}
