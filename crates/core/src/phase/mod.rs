//! Mission Phases
//!
//! A mission is a numbered sequence of phases. Each phase is a small state
//! machine over one integer state that the supervisor owns, resets to 0 on
//! entry and hands to the phase by reference once per poll.
//!
//! # Tick Contract
//!
//! - A tick never blocks: waiting for an event means returning `Ok(false)`
//!   without changing state
//! - Motion is requested by building a [`SnippetBuffer`] and submitting it
//!   through [`PhaseContext::submit`]; the snippet ends with a line that raises
//!   the completion event the phase waits for next
//! - `Ok(true)` is returned only from [`STATE_DONE`]
//! - A snippet that cannot be composed moves the phase to its
//!   [`fallback`](Phase::fallback) state; only link failures end the mission
//!
//! [`SnippetBuffer`]: crate::snippet::SnippetBuffer

pub mod finish;
pub mod marker;
pub mod pickup;
pub mod registry;

use core::fmt;

use crate::controller::LinkError;
use crate::event::{EventGate, EventId};
use crate::slot::{SnippetSink, SubmitReport};
use crate::snippet::{LineError, SnippetBuffer, SnippetError};
use crate::traits::{Notifier, Perception};

pub use finish::FinishPhase;
pub use marker::{MarkerConfig, MarkerSeekPhase, ReachPolicy};
pub use pickup::{PickupConfig, PickupPhase};
pub use registry::PhaseRegistry;

/// Phase number within a mission.
pub type PhaseId = u16;

/// State of the current phase.
pub type PhaseState = u16;

/// Terminal state: the phase reports completion from here.
pub const STATE_DONE: PhaseState = 999;

/// Errors a phase cannot resolve on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseError {
    /// Writing to the controller failed
    Link(LinkError),
    /// A snippet could not be composed
    Snippet(SnippetError),
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseError::Link(e) => write!(f, "{}", e),
            PhaseError::Snippet(e) => write!(f, "{}", e),
        }
    }
}

impl From<LinkError> for PhaseError {
    fn from(e: LinkError) -> Self {
        PhaseError::Link(e)
    }
}

impl From<SnippetError> for PhaseError {
    fn from(e: SnippetError) -> Self {
        PhaseError::Snippet(e)
    }
}

impl From<LineError> for PhaseError {
    fn from(e: LineError) -> Self {
        PhaseError::Snippet(SnippetError::Line(e))
    }
}

/// What a phase may touch during one tick.
pub struct PhaseContext<'c> {
    sink: &'c mut dyn SnippetSink,
    events: &'c dyn EventGate,
    perception: &'c dyn Perception,
    notifier: &'c dyn Notifier,
}

impl<'c> PhaseContext<'c> {
    pub fn new(
        sink: &'c mut dyn SnippetSink,
        events: &'c dyn EventGate,
        perception: &'c dyn Perception,
        notifier: &'c dyn Notifier,
    ) -> Self {
        Self {
            sink,
            events,
            perception,
            notifier,
        }
    }

    /// Upload and arm a snippet in the inactive slot.
    pub fn submit(&mut self, buffer: &SnippetBuffer) -> Result<SubmitReport, LinkError> {
        self.sink.submit(buffer)
    }

    /// Read (and consume) event `id`.
    pub fn event(&self, id: EventId) -> bool {
        self.events.is_set(id)
    }

    /// Consume any stale occurrence of `id` before arming a snippet that
    /// raises it.
    pub fn discard_event(&self, id: EventId) {
        let _ = self.events.is_set(id);
    }

    pub fn perception(&self) -> &dyn Perception {
        self.perception
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier
    }
}

/// One mission phase.
pub trait Phase {
    /// Name for logs and the display.
    fn name(&self) -> &'static str;

    /// Called once before the first tick after the phase becomes current.
    fn enter(&mut self) {}

    /// Advance by one poll. Returns `Ok(true)` once the phase is complete.
    fn tick(
        &mut self,
        state: &mut PhaseState,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<bool, PhaseError>;

    /// State to continue from when no snippet could be composed in `state`.
    ///
    /// Must lead to [`STATE_DONE`] without repeating the failing step.
    fn fallback(&self, state: PhaseState) -> PhaseState {
        let _ = state;
        STATE_DONE
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared harness for phase unit tests.

    use super::*;
    use crate::event::EventFlags;
    use crate::mock::{MockController, MockPerception, RecordingNotifier};
    use crate::slot::{SlotConfig, SlotExecutor, UploadMode};
    use crate::traits::MockTime;

    pub struct Harness {
        pub slots: SlotExecutor<MockController, MockTime>,
        pub events: EventFlags,
        pub perception: MockPerception,
        pub notifier: RecordingNotifier,
    }

    impl Harness {
        pub fn new() -> Self {
            let config = SlotConfig {
                upload: UploadMode::Modify,
                ..SlotConfig::default()
            };
            Self {
                slots: SlotExecutor::new(MockController::new(), MockTime::new(), config),
                events: EventFlags::new(),
                perception: MockPerception::new(),
                notifier: RecordingNotifier::new(),
            }
        }

        pub fn tick(&mut self, phase: &mut dyn Phase, state: &mut PhaseState) -> bool {
            let mut ctx = PhaseContext::new(
                &mut self.slots,
                &self.events,
                &self.perception,
                &self.notifier,
            );
            phase.tick(state, &mut ctx).unwrap()
        }

        /// Program lines of every armed snippet.
        pub fn snippets(&self) -> std::vec::Vec<std::vec::Vec<std::string::String>> {
            self.slots.controller().snippets()
        }
    }
}
