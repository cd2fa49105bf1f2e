//! Finish phase: ends the mission sequence without motion.

use super::{Phase, PhaseContext, PhaseError, PhaseState};

/// Completes on its first tick.
#[derive(Debug, Default)]
pub struct FinishPhase;

impl FinishPhase {
    pub fn new() -> Self {
        Self
    }
}

impl Phase for FinishPhase {
    fn name(&self) -> &'static str {
        "finish"
    }

    fn tick(
        &mut self,
        _state: &mut PhaseState,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<bool, PhaseError> {
        ctx.notifier().display("mission ended");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::testing::Harness;

    #[test]
    fn test_completes_immediately_without_motion() {
        let mut h = Harness::new();
        let mut phase = FinishPhase::new();
        let mut state = 0;

        assert!(h.tick(&mut phase, &mut state));
        assert!(h.slots.controller().sent().is_empty());
        assert_eq!(h.notifier.displays(), ["mission ended"]);
    }
}
