//! Double-Buffered Slot Executor
//!
//! Owns the two alternating execution slots (controller threads) and swaps
//! between them so that the robot always has a running program.
//!
//! # Handoff Protocol
//!
//! 1. Pick the inactive slot
//! 2. Overwrite its lines with `<mod` commands, in program order
//! 3. Wait the settle delay
//! 4. Raise the slot's start event; the controller stops the old slot and
//!    starts the new one in the same step
//! 5. Record the new slot as active
//!
//! The active slot is never touched while the other one is prepared, so a
//! failed upload leaves the robot running the previous segment.
//!
//! # Upload Modes
//!
//! Slots are modified, never cleared. In [`UploadMode::Modify`] line positions
//! past the new program keep whatever the slot held before. In
//! [`UploadMode::Padded`] those positions are overwritten with the inert
//! no-op line, so a short program can never run into a stale tail.

use crate::controller::{Controller, ControllerCommand, LinkError, ThreadId};
use crate::event::{ids, EventId};
use crate::snippet::{MissionLine, SnippetBuffer};
use crate::traits::Delay;

/// Default number of line positions per slot.
pub const DEFAULT_LINE_CAPACITY: usize = 20;

/// Default wait between upload and arm.
pub const DEFAULT_SETTLE_MS: u32 = 10;

/// Inert line used to fill slots: stand still for 0.1 s.
pub const NOOP_LINE: &str = "vel=0: time=0.1";

/// One of the two execution slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    /// The complementary slot.
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }
}

/// How line positions past the new program are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Overwrite every remaining position with the no-op line
    #[default]
    Padded,
    /// Leave remaining positions as they were
    Modify,
}

/// Controller thread and start event of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBinding {
    pub thread: ThreadId,
    pub start_event: EventId,
}

/// Slot executor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotConfig {
    /// Line positions per slot
    pub line_capacity: usize,
    /// Wait between upload and arm (ms)
    pub settle_ms: u32,
    pub upload: UploadMode,
    /// Inert line used for initial fill and padding
    pub noop_line: MissionLine,
    pub slot_a: SlotBinding,
    pub slot_b: SlotBinding,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            line_capacity: DEFAULT_LINE_CAPACITY,
            settle_ms: DEFAULT_SETTLE_MS,
            upload: UploadMode::Padded,
            noop_line: MissionLine::new(NOOP_LINE).unwrap_or_default(),
            slot_a: SlotBinding {
                thread: 100,
                start_event: ids::SLOT_A_START,
            },
            slot_b: SlotBinding {
                thread: 101,
                start_event: ids::SLOT_B_START,
            },
        }
    }
}

/// Bookkeeping for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSlot {
    pub id: SlotId,
    pub binding: SlotBinding,
    /// Program most recently armed in this slot
    pub program: SnippetBuffer,
    /// Number of times this slot was armed
    pub armed: u32,
    active: bool,
}

impl ExecutionSlot {
    fn new(id: SlotId, binding: SlotBinding) -> Self {
        Self {
            id,
            binding,
            program: SnippetBuffer::new(),
            armed: 0,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Outcome of one [`SnippetSink::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    /// Slot that was uploaded and armed
    pub slot: SlotId,
    /// Program lines written
    pub uploaded: usize,
    /// No-op lines written after the program
    pub padded: usize,
    /// Buffer was longer than the slot capacity
    pub truncated: bool,
    /// Lines cut off by truncation
    pub dropped: usize,
}

/// Anything that accepts a snippet for execution.
///
/// Phases only see this seam, not the controller.
pub trait SnippetSink {
    /// Upload `buffer` into the inactive slot and arm it.
    fn submit(&mut self, buffer: &SnippetBuffer) -> Result<SubmitReport, LinkError>;
}

/// Owner of the two execution slots on the controller.
pub struct SlotExecutor<C, D> {
    controller: C,
    delay: D,
    config: SlotConfig,
    slots: [ExecutionSlot; 2],
    active: SlotId,
    submissions: u32,
    overflows: u32,
    dropped_lines: u32,
    last_report: Option<SubmitReport>,
}

impl<C: Controller, D: Delay> SlotExecutor<C, D> {
    /// Create the executor with slot A recorded as active, so the first
    /// submission goes to slot B.
    pub fn new(controller: C, delay: D, config: SlotConfig) -> Self {
        let mut slots = [
            ExecutionSlot::new(SlotId::A, config.slot_a),
            ExecutionSlot::new(SlotId::B, config.slot_b),
        ];
        slots[SlotId::A.index()].active = true;

        Self {
            controller,
            delay,
            config,
            slots,
            active: SlotId::A,
            submissions: 0,
            overflows: 0,
            dropped_lines: 0,
            last_report: None,
        }
    }

    /// Add both slot threads to the controller program, each filled with
    /// `line_capacity` no-op lines.
    ///
    /// Afterwards lines can only be modified, not added.
    pub fn install(&mut self) -> Result<(), LinkError> {
        for id in [SlotId::A, SlotId::B] {
            let binding = self.slots[id.index()].binding;
            let stop = self.slots[id.other().index()].binding.start_event;
            self.controller.send(&ControllerCommand::AddThread {
                thread: binding.thread,
                start_event: Some(binding.start_event),
                stop_event: Some(stop),
            })?;
            for _ in 0..self.config.line_capacity {
                self.controller
                    .send(&ControllerCommand::AddLine(self.config.noop_line.clone()))?;
            }
        }
        Ok(())
    }

    /// Currently running slot.
    pub fn active(&self) -> SlotId {
        self.active
    }

    /// Slot the next submission will use.
    pub fn inactive(&self) -> SlotId {
        self.active.other()
    }

    pub fn slot(&self, id: SlotId) -> &ExecutionSlot {
        &self.slots[id.index()]
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Completed submissions.
    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    /// Submissions that were truncated.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Total lines lost to truncation.
    pub fn dropped_lines(&self) -> u32 {
        self.dropped_lines
    }

    pub fn last_report(&self) -> Option<SubmitReport> {
        self.last_report
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Block for the configured settle delay.
    pub fn settle(&self) {
        self.delay.delay_ms(self.config.settle_ms);
    }
}

impl<C: Controller, D: Delay> SnippetSink for SlotExecutor<C, D> {
    fn submit(&mut self, buffer: &SnippetBuffer) -> Result<SubmitReport, LinkError> {
        let target = self.active.other();
        let binding = self.slots[target.index()].binding;
        let capacity = self.config.line_capacity;

        let dropped = buffer.len().saturating_sub(capacity);
        let truncated = dropped > 0;

        let mut program = SnippetBuffer::with_capacity(capacity);
        for (i, line) in buffer.lines().iter().take(capacity).enumerate() {
            if line.is_empty() {
                break;
            }
            self.controller.send(&ControllerCommand::ModifyLine {
                thread: binding.thread,
                line_no: (i + 1) as u16,
                line: line.clone(),
            })?;
            // capacity of `program` equals the slot capacity, so this cannot fail
            let _ = program.push(line.clone());
        }
        let uploaded = program.len();

        let mut padded = 0;
        if self.config.upload == UploadMode::Padded {
            for i in uploaded..capacity {
                self.controller.send(&ControllerCommand::ModifyLine {
                    thread: binding.thread,
                    line_no: (i + 1) as u16,
                    line: self.config.noop_line.clone(),
                })?;
                padded += 1;
            }
        }

        self.settle();
        self.controller
            .send(&ControllerCommand::RaiseEvent(binding.start_event))?;

        self.slots[self.active.index()].active = false;
        let slot = &mut self.slots[target.index()];
        slot.active = true;
        slot.armed += 1;
        slot.program = program;
        self.active = target;

        self.submissions += 1;
        if truncated {
            self.overflows += 1;
            self.dropped_lines += dropped as u32;
        }

        let report = SubmitReport {
            slot: target,
            uploaded,
            padded,
            truncated,
            dropped,
        };
        self.last_report = Some(report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockController;
    use crate::traits::MockTime;
    use std::vec::Vec;

    fn modify_config(capacity: usize) -> SlotConfig {
        SlotConfig {
            line_capacity: capacity,
            upload: UploadMode::Modify,
            ..SlotConfig::default()
        }
    }

    fn buffer(texts: &[&str]) -> SnippetBuffer {
        let mut buf = SnippetBuffer::new();
        for t in texts {
            buf.push(MissionLine::new(t).unwrap()).unwrap();
        }
        buf
    }

    #[test]
    fn test_initial_state_slot_a_active() {
        let exec = SlotExecutor::new(MockController::new(), MockTime::new(), SlotConfig::default());
        assert_eq!(exec.active(), SlotId::A);
        assert_eq!(exec.inactive(), SlotId::B);
        assert!(exec.slot(SlotId::A).is_active());
        assert!(!exec.slot(SlotId::B).is_active());
    }

    #[test]
    fn test_slots_alternate_strictly() {
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), modify_config(4));
        let buf = buffer(&["vel=0.1: dist=0.1"]);

        let mut order = Vec::new();
        for _ in 0..6 {
            order.push(exec.submit(&buf).unwrap().slot);
            let active = [SlotId::A, SlotId::B]
                .iter()
                .filter(|id| exec.slot(**id).is_active())
                .count();
            assert_eq!(active, 1);
        }

        assert_eq!(
            order,
            [SlotId::B, SlotId::A, SlotId::B, SlotId::A, SlotId::B, SlotId::A]
        );
        assert_eq!(exec.controller().raised_events(), [31, 30, 31, 30, 31, 30]);
    }

    #[test]
    fn test_upload_targets_inactive_thread_in_order() {
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), modify_config(4));
        exec.submit(&buffer(&["a", "b", "c"])).unwrap();

        assert_eq!(
            exec.controller().rendered(),
            ["<mod 101 1 a", "<mod 101 2 b", "<mod 101 3 c", "<event=31"]
        );
    }

    #[test]
    fn test_truncates_to_capacity() {
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), modify_config(3));
        let report = exec.submit(&buffer(&["a", "b", "c", "d", "e"])).unwrap();

        assert_eq!(report.uploaded, 3);
        assert!(report.truncated);
        assert_eq!(report.dropped, 2);
        assert_eq!(exec.controller().modify_count(), 3);
        assert_eq!(exec.overflows(), 1);
        assert_eq!(exec.dropped_lines(), 2);
        // truncated snippet is still armed
        assert_eq!(exec.active(), SlotId::B);
    }

    #[test]
    fn test_within_capacity_uploads_used_count() {
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), modify_config(5));
        let report = exec.submit(&buffer(&["a", "b"])).unwrap();

        assert_eq!(report.uploaded, 2);
        assert_eq!(report.padded, 0);
        assert!(!report.truncated);
        assert_eq!(exec.controller().modify_count(), 2);
    }

    #[test]
    fn test_empty_line_terminates_upload() {
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), modify_config(5));
        let mut buf = buffer(&["a"]);
        buf.push(MissionLine::empty()).unwrap();
        buf.push(MissionLine::new("never").unwrap()).unwrap();

        let report = exec.submit(&buf).unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(exec.controller().rendered(), ["<mod 101 1 a", "<event=31"]);
        assert_eq!(exec.slot(SlotId::B).program.len(), 1);
    }

    #[test]
    fn test_empty_buffer_arms_without_upload() {
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), modify_config(5));
        let report = exec.submit(&SnippetBuffer::new()).unwrap();

        assert_eq!(report.uploaded, 0);
        assert_eq!(exec.controller().rendered(), ["<event=31"]);
    }

    #[test]
    fn test_padded_mode_overwrites_tail() {
        let config = SlotConfig {
            line_capacity: 4,
            ..SlotConfig::default()
        };
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), config);
        let report = exec.submit(&buffer(&["a"])).unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.padded, 3);
        assert_eq!(
            exec.controller().rendered(),
            [
                "<mod 101 1 a",
                "<mod 101 2 vel=0: time=0.1",
                "<mod 101 3 vel=0: time=0.1",
                "<mod 101 4 vel=0: time=0.1",
                "<event=31",
            ]
        );
    }

    #[test]
    fn test_settle_delay_precedes_arm() {
        let time = MockTime::new();
        let mut exec = SlotExecutor::new(
            MockController::with_clock(time.clone()),
            time.clone(),
            modify_config(2),
        );
        exec.submit(&buffer(&["a"])).unwrap();

        let stamps = exec.controller().stamps_ms();
        assert_eq!(stamps, [0, DEFAULT_SETTLE_MS as u64]);
        assert_eq!(time.delay_calls(), 1);
    }

    #[test]
    fn test_failed_upload_keeps_active_slot() {
        let mut controller = MockController::new();
        controller.fail_after(1);
        let mut exec = SlotExecutor::new(controller, MockTime::new(), modify_config(4));

        let result = exec.submit(&buffer(&["a", "b"]));

        assert_eq!(result, Err(LinkError::Disconnected));
        assert_eq!(exec.active(), SlotId::A);
        assert_eq!(exec.submissions(), 0);
        assert!(exec.controller().raised_events().is_empty());
    }

    #[test]
    fn test_install_fills_both_threads() {
        let mut exec = SlotExecutor::new(MockController::new(), MockTime::new(), modify_config(2));
        exec.install().unwrap();

        assert_eq!(
            exec.controller().rendered(),
            [
                "robot <add thread=100,event=30 : event=31",
                "robot <add vel=0: time=0.1",
                "robot <add vel=0: time=0.1",
                "robot <add thread=101,event=31 : event=30",
                "robot <add vel=0: time=0.1",
                "robot <add vel=0: time=0.1",
            ]
        );
    }
}
