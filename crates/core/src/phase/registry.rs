//! Phase registry: phase id to handler.
//!
//! Missions are assembled by registering handlers under consecutive ids; the
//! supervisor looks up the current id each tick and finishes the mission when
//! no handler is registered.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::{Phase, PhaseId};

/// Registry of mission phase handlers.
#[derive(Default)]
pub struct PhaseRegistry {
    phases: BTreeMap<PhaseId, Box<dyn Phase>>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `phase` under `id`, returning the handler it replaced.
    pub fn register(&mut self, id: PhaseId, phase: Box<dyn Phase>) -> Option<Box<dyn Phase>> {
        self.phases.insert(id, phase)
    }

    /// Register handlers under consecutive ids starting at `first`.
    pub fn from_sequence(first: PhaseId, phases: impl IntoIterator<Item = Box<dyn Phase>>) -> Self {
        let mut registry = Self::new();
        for (offset, phase) in phases.into_iter().enumerate() {
            registry.register(first + offset as PhaseId, phase);
        }
        registry
    }

    pub fn contains(&self, id: PhaseId) -> bool {
        self.phases.contains_key(&id)
    }

    pub fn get_mut(&mut self, id: PhaseId) -> Option<&mut (dyn Phase + 'static)> {
        self.phases.get_mut(&id).map(|p| p.as_mut())
    }

    /// Registered ids with their handler names, ascending.
    pub fn list(&self) -> Vec<(PhaseId, &'static str)> {
        self.phases.iter().map(|(id, p)| (*id, p.name())).collect()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::FinishPhase;

    #[test]
    fn test_from_sequence_assigns_consecutive_ids() {
        let registry = PhaseRegistry::from_sequence(
            1,
            [
                Box::new(FinishPhase::new()) as Box<dyn Phase>,
                Box::new(FinishPhase::new()),
            ],
        );

        assert_eq!(registry.list(), [(1, "finish"), (2, "finish")]);
        assert!(registry.contains(2));
        assert!(!registry.contains(3));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = PhaseRegistry::new();
        assert!(registry.register(4, Box::new(FinishPhase::new())).is_none());
        assert!(registry.register(4, Box::new(FinishPhase::new())).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_id() {
        let mut registry = PhaseRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get_mut(1).is_none());
    }
}
