//! Mock collaborators for host testing.
//!
//! Always compiled, like [`MockTime`](crate::traits::MockTime), so integration
//! tests and downstream crates can drive the supervisor without a robot.
//! All mocks use interior mutability and are single-threaded.

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use crate::controller::{Controller, ControllerCommand, LinkError};
use crate::event::EventId;
use crate::traits::{
    Detection, Heartbeat, ManualOverride, MockTime, Notifier, Perception, TimeSource,
};

// ============================================================================
// Controller
// ============================================================================

/// Controller that records every command.
///
/// # Example
///
/// ```
/// use robobot_mission_core::controller::{Controller, ControllerCommand};
/// use robobot_mission_core::mock::MockController;
///
/// let mut controller = MockController::new();
/// controller.send(&ControllerCommand::Start).unwrap();
/// assert_eq!(controller.rendered(), ["start"]);
/// ```
#[derive(Default)]
pub struct MockController {
    sent: Vec<ControllerCommand>,
    stamps_ms: Vec<u64>,
    clock: Option<MockTime>,
    fail_after: Option<usize>,
    reject_displays: bool,
    stop_attempts: usize,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mock clock time of each command.
    pub fn with_clock(clock: MockTime) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Accept `n` more commands, then fail every send with
    /// [`LinkError::Disconnected`].
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after = Some(self.sent.len() + n);
    }

    /// Fail every display command with [`LinkError::WriteFailed`].
    pub fn reject_displays(&mut self) {
        self.reject_displays = true;
    }

    /// Stop commands attempted, including failed ones.
    pub fn stop_attempts(&self) -> usize {
        self.stop_attempts
    }

    pub fn sent(&self) -> &[ControllerCommand] {
        &self.sent
    }

    /// Commands as the text lines the bridge would receive.
    pub fn rendered(&self) -> Vec<String> {
        self.sent.iter().map(|c| c.to_string()).collect()
    }

    /// Clock time of each command (requires [`with_clock`](Self::with_clock)).
    pub fn stamps_ms(&self) -> &[u64] {
        &self.stamps_ms
    }

    pub fn clear(&mut self) {
        self.sent.clear();
        self.stamps_ms.clear();
    }

    /// Events raised with `<event=N`, in order.
    pub fn raised_events(&self) -> Vec<EventId> {
        self.sent
            .iter()
            .filter_map(|c| match c {
                ControllerCommand::RaiseEvent(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Number of `<mod` commands.
    pub fn modify_count(&self) -> usize {
        self.count(|c| matches!(c, ControllerCommand::ModifyLine { .. }))
    }

    /// Number of `stop` commands.
    pub fn stop_count(&self) -> usize {
        self.count(|c| matches!(c, ControllerCommand::Stop))
    }

    pub fn count(&self, pred: impl Fn(&ControllerCommand) -> bool) -> usize {
        self.sent.iter().filter(|c| pred(c)).count()
    }

    /// Program lines of each armed snippet, split at the arming events.
    ///
    /// Only `<mod` lines sent between two `<event=` commands are grouped;
    /// padding lines are included as sent.
    pub fn snippets(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let mut current = Vec::new();
        for c in &self.sent {
            match c {
                ControllerCommand::ModifyLine { line, .. } => {
                    current.push(line.as_str().to_string())
                }
                ControllerCommand::RaiseEvent(_) => out.push(core::mem::take(&mut current)),
                _ => {}
            }
        }
        out
    }
}

impl Controller for MockController {
    fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError> {
        if matches!(command, ControllerCommand::Stop) {
            self.stop_attempts += 1;
        }
        if self.reject_displays && matches!(command, ControllerCommand::Display { .. }) {
            return Err(LinkError::WriteFailed);
        }
        if let Some(limit) = self.fail_after {
            if self.sent.len() >= limit {
                return Err(LinkError::Disconnected);
            }
        }
        self.sent.push(command.clone());
        if let Some(clock) = &self.clock {
            self.stamps_ms.push(clock.now_ms());
        }
        Ok(())
    }
}

// ============================================================================
// Perception
// ============================================================================

/// Scripted perception collaborator.
///
/// Each request consumes the next scripted outcome. The request stays pending
/// for `busy_polls` calls to [`Perception::detection_pending`] before the
/// outcome is published. With an empty script every request yields
/// [`Detection::none`].
#[derive(Default)]
pub struct MockPerception {
    script: RefCell<VecDeque<Detection>>,
    latest: Cell<Detection>,
    pending: Cell<bool>,
    busy_polls: Cell<u32>,
    remaining: Cell<u32>,
    requests: Cell<u32>,
    never_completes: Cell<bool>,
}

impl MockPerception {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of a future request.
    pub fn push_result(&self, detection: Detection) {
        self.script.borrow_mut().push_back(detection);
    }

    /// Keep each request pending for `polls` pending-checks.
    pub fn set_busy_polls(&self, polls: u32) {
        self.busy_polls.set(polls);
    }

    /// Never clear the request flag.
    pub fn hang(&self) {
        self.never_completes.set(true);
    }

    /// Detection requests received.
    pub fn requests(&self) -> u32 {
        self.requests.get()
    }
}

impl Perception for MockPerception {
    fn request_detection(&self) {
        self.requests.set(self.requests.get() + 1);
        self.pending.set(true);
        self.remaining.set(self.busy_polls.get());
    }

    fn detection_pending(&self) -> bool {
        if !self.pending.get() || self.never_completes.get() {
            return self.pending.get();
        }
        if self.remaining.get() > 0 {
            self.remaining.set(self.remaining.get() - 1);
            return true;
        }
        let next = self.script.borrow_mut().pop_front().unwrap_or_default();
        self.latest.set(next);
        self.pending.set(false);
        false
    }

    fn latest(&self) -> Detection {
        self.latest.get()
    }
}

// ============================================================================
// Operator inputs
// ============================================================================

/// Manual-override switch.
#[derive(Default)]
pub struct MockOverride {
    active: Cell<bool>,
}

impl MockOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, active: bool) {
        self.active.set(active);
    }
}

impl ManualOverride for MockOverride {
    fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Heartbeat that becomes alive after a number of checks.
#[derive(Default)]
pub struct MockHeartbeat {
    alive_after: Cell<Option<u32>>,
    checks: Cell<u32>,
}

impl MockHeartbeat {
    /// Alive from the first check.
    pub fn alive() -> Self {
        let hb = Self::default();
        hb.alive_after.set(Some(0));
        hb
    }

    /// Never alive.
    pub fn dead() -> Self {
        Self::default()
    }

    /// Alive once `n` checks have failed.
    pub fn alive_after(n: u32) -> Self {
        let hb = Self::default();
        hb.alive_after.set(Some(n));
        hb
    }

    pub fn checks(&self) -> u32 {
        self.checks.get()
    }
}

impl Heartbeat for MockHeartbeat {
    fn is_alive(&self) -> bool {
        let n = self.checks.get();
        self.checks.set(n + 1);
        self.alive_after.get().is_some_and(|after| n >= after)
    }
}

/// Notifier that keeps everything it was told.
#[derive(Default)]
pub struct RecordingNotifier {
    announcements: RefCell<Vec<String>>,
    displays: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announcements(&self) -> Vec<String> {
        self.announcements.borrow().clone()
    }

    pub fn displays(&self) -> Vec<String> {
        self.displays.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn announce(&self, text: &str) {
        self.announcements.borrow_mut().push(text.to_string());
    }

    fn display(&self, text: &str) {
        self.displays.borrow_mut().push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_fail_after() {
        let mut c = MockController::new();
        c.fail_after(1);
        assert!(c.send(&ControllerCommand::Start).is_ok());
        assert_eq!(c.send(&ControllerCommand::Stop), Err(LinkError::Disconnected));
        assert_eq!(c.sent().len(), 1);
        assert_eq!(c.stop_attempts(), 1);
    }

    #[test]
    fn test_controller_reject_displays() {
        use crate::controller::DisplayRow;

        let mut c = MockController::new();
        c.reject_displays();
        assert_eq!(
            c.send(&ControllerCommand::display(DisplayRow::Status, "finished")),
            Err(LinkError::WriteFailed)
        );
        assert!(c.send(&ControllerCommand::Start).is_ok());
        assert_eq!(c.rendered(), ["start"]);
    }

    #[test]
    fn test_perception_script_and_busy_polls() {
        let p = MockPerception::new();
        p.set_busy_polls(2);
        p.push_result(Detection::found(300.0, -4.0));

        p.request_detection();
        assert!(p.detection_pending());
        assert!(p.detection_pending());
        assert!(!p.detection_pending());
        assert_eq!(p.latest(), Detection::found(300.0, -4.0));

        p.request_detection();
        assert!(!p.detection_pending());
        assert!(!p.latest().detected);
        assert_eq!(p.requests(), 2);
    }

    #[test]
    fn test_perception_hang() {
        let p = MockPerception::new();
        p.hang();
        p.request_detection();
        for _ in 0..10 {
            assert!(p.detection_pending());
        }
    }

    #[test]
    fn test_heartbeat_alive_after() {
        let hb = MockHeartbeat::alive_after(2);
        assert!(!hb.is_alive());
        assert!(!hb.is_alive());
        assert!(hb.is_alive());
        assert!(!MockHeartbeat::dead().is_alive());
    }
}
