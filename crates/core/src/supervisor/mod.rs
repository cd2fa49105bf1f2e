//! Mission Supervisor
//!
//! Owns the slot executor and the phase registry and drives the current phase
//! once per poll. Modeled as `initializing → running(phase, state) → finished`.
//!
//! # Poll Order
//!
//! 1. Manual override asserted: no phase tick, announce the pause once
//! 2. Not started: wait for the operator go event
//! 3. Running: tick the current phase; on completion advance the phase id and
//!    reset the state to 0; a missing handler finishes the mission
//! 4. Always: the all-stop event or a phase id past `last_phase` finishes the
//!    mission
//!
//! Finishing sends exactly one stop command, whatever the cause. A failed
//! controller write ends the mission through the same path with a best-effort
//! stop; a failed display write is only reported.
//!
//! The supervisor does not log. [`poll`](MissionSupervisor::poll) returns the
//! [`SupervisorEvent`]s of the cycle and the owner decides what to record.

use core::fmt;

use heapless::Vec;

use crate::controller::{
    Controller, ControllerCommand, DataChannel, DisplayRow, LinkError, ThreadId,
};
use crate::event::{ids, EventGate, EventId};
use crate::phase::{PhaseContext, PhaseError, PhaseId, PhaseRegistry, PhaseState};
use crate::slot::{SlotConfig, SlotExecutor, SlotId};
use crate::snippet::MissionLine;
use crate::traits::{Delay, Heartbeat, ManualOverride, Notifier, Perception, TimeSource};

/// Maximum supervisor events emitted per poll.
pub const MAX_SUPERVISOR_EVENTS: usize = 8;

/// Events of one poll.
pub type Events = Vec<SupervisorEvent, MAX_SUPERVISOR_EVENTS>;

/// Warm-up line of the idle thread: IR sensors on, stand still.
pub const IDLE_LINE: &str = "irsensor=1, vel=0: dist<0.2";

/// Supervisor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub first_phase: PhaseId,
    /// The mission finishes once the phase id passes this
    pub last_phase: PhaseId,
    pub poll_interval_ms: u32,
    /// Heartbeat checks before giving up on the link
    pub heartbeat_checks: u32,
    /// Wait after a failed heartbeat check (ms)
    pub heartbeat_retry_ms: u32,
    pub operator_go_event: EventId,
    pub all_stop_event: EventId,
    pub idle_thread: ThreadId,
    pub idle_line: MissionLine,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            first_phase: 1,
            last_phase: 2,
            poll_interval_ms: 10,
            heartbeat_checks: 3,
            heartbeat_retry_ms: 1000,
            operator_go_event: ids::OPERATOR_GO,
            all_stop_event: ids::ALL_STOP,
            idle_thread: 1,
            idle_line: MissionLine::new(IDLE_LINE).unwrap_or_default(),
        }
    }
}

/// Borrowed collaborators owned by other execution contexts.
#[derive(Clone, Copy)]
pub struct MissionInputs<'a> {
    pub events: &'a dyn EventGate,
    pub heartbeat: &'a dyn Heartbeat,
    pub perception: &'a dyn Perception,
    pub manual: &'a dyn ManualOverride,
    pub notifier: &'a dyn Notifier,
}

/// Phase id and state pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: PhaseId,
    pub state: PhaseState,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mission {} state {}", self.phase, self.state)
    }
}

/// Why the mission finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every configured phase completed
    Completed,
    /// The all-stop event was raised
    AllStop,
    /// The owner cancelled the run
    Cancelled,
    /// The controller link failed during the run
    LinkFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::AllStop => write!(f, "all-stop event"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::LinkFailed => write!(f, "controller link failed"),
        }
    }
}

/// Something the owner may want to log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupervisorEvent {
    /// Operator go received; phases start ticking
    Started { at_ms: u64 },
    /// Phase id or state changed
    Transition {
        at_ms: u64,
        from: Progress,
        to: Progress,
    },
    /// A snippet was uploaded and armed
    SnippetArmed { slot: SlotId, lines: usize },
    /// A snippet was longer than the slot and lost lines
    CapacityExceeded { phase: PhaseId, dropped: usize },
    /// Manual override asserted (true) or released (false)
    ManualOverride { active: bool },
    /// A phase failed to compose a snippet and fell back to `fallback`
    PhaseFault {
        phase: PhaseId,
        error: PhaseError,
        fallback: PhaseState,
    },
    /// A display line could not be written; the mission continues
    DisplayFailed { row: DisplayRow, error: LinkError },
    /// Terminal: the stop command has been sent
    Finished { reason: StopReason },
}

/// Errors that end the mission early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionError {
    /// No heartbeat after the configured number of checks
    NoHeartbeat { checks: u32 },
    /// Writing to the controller failed
    Link(LinkError),
}

impl fmt::Display for MissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionError::NoHeartbeat { checks } => {
                write!(f, "no heartbeat from controller after {} checks", checks)
            }
            MissionError::Link(e) => write!(f, "controller link failed: {}", e),
        }
    }
}

impl From<LinkError> for MissionError {
    fn from(e: LinkError) -> Self {
        MissionError::Link(e)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionReport {
    pub reason: Option<StopReason>,
    /// Phase and state when the mission finished
    pub last: Progress,
    pub polls: u32,
    pub transitions: u32,
    pub submissions: u32,
    pub overflows: u32,
    pub dropped_lines: u32,
    pub elapsed_ms: u64,
}

/// Top-level mission loop.
pub struct MissionSupervisor<'a, C, T> {
    config: SupervisorConfig,
    slots: SlotExecutor<C, T>,
    registry: PhaseRegistry,
    inputs: MissionInputs<'a>,
    time: T,
    phase: PhaseId,
    state: PhaseState,
    entered: Option<PhaseId>,
    started: bool,
    manual: bool,
    finished: bool,
    stop_sent: bool,
    reason: Option<StopReason>,
    polls: u32,
    transitions: u32,
    started_at_ms: u64,
}

impl<'a, C, T> MissionSupervisor<'a, C, T>
where
    C: Controller,
    T: TimeSource + Delay,
{
    pub fn new(
        controller: C,
        time: T,
        config: SupervisorConfig,
        slot_config: SlotConfig,
        registry: PhaseRegistry,
        inputs: MissionInputs<'a>,
    ) -> Self {
        let started_at_ms = time.now_ms();
        Self {
            phase: config.first_phase,
            slots: SlotExecutor::new(controller, time.clone(), slot_config),
            config,
            registry,
            inputs,
            time,
            state: 0,
            entered: None,
            started: false,
            manual: false,
            finished: false,
            stop_sent: false,
            reason: None,
            polls: 0,
            transitions: 0,
            started_at_ms,
        }
    }

    pub fn phase(&self) -> PhaseId {
        self.phase
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn progress(&self) -> Progress {
        Progress {
            phase: self.phase,
            state: self.state,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.reason
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn slots(&self) -> &SlotExecutor<C, T> {
        &self.slots
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    /// Prepare the controller program and verify the link.
    ///
    /// Sends, in order: halt, clear, the idle thread, both slot threads,
    /// data subscriptions and start. Fails with
    /// [`MissionError::NoHeartbeat`] (after sending stop) when the controller
    /// never reports alive.
    pub fn initialize(&mut self) -> Result<(), MissionError> {
        match self.prepare() {
            Ok(true) => Ok(()),
            Ok(false) => {
                let checks = self.config.heartbeat_checks.max(1);
                self.finished = true;
                if let Err(e) = self.send_stop() {
                    return Err(self.abort(e));
                }
                self.inputs.notifier.announce("No connection to robot.");
                Err(MissionError::NoHeartbeat { checks })
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Program the controller and wait for its heartbeat.
    fn prepare(&mut self) -> Result<bool, LinkError> {
        // startup display failures are not reported
        let mut ignored: Events = Vec::new();

        let c = self.slots.controller_mut();
        c.send(&ControllerCommand::Halt)?;
        c.send(&ControllerCommand::ClearProgram)?;
        c.send(&ControllerCommand::AddThread {
            thread: self.config.idle_thread,
            start_event: None,
            stop_event: None,
        })?;
        c.send(&ControllerCommand::AddLine(self.config.idle_line.clone()))?;
        self.slots.install()?;
        self.slots.settle();

        for channel in DataChannel::ALL {
            self.slots
                .controller_mut()
                .send(&ControllerCommand::Subscribe(channel))?;
        }
        self.slots.settle();

        self.inputs.events.clear_all();
        self.slots.controller_mut().send(&ControllerCommand::Start)?;
        self.status("waiting for REGBOT", &mut ignored);

        let checks = self.config.heartbeat_checks.max(1);
        for n in 0..checks {
            if self.inputs.heartbeat.is_alive() {
                self.status("waiting for go", &mut ignored);
                self.started_at_ms = self.time.now_ms();
                return Ok(true);
            }
            if n + 1 < checks {
                self.time.delay_ms(self.config.heartbeat_retry_ms);
            }
        }
        Ok(false)
    }

    /// Run one supervisor cycle.
    ///
    /// A controller write failure finishes the mission with
    /// [`StopReason::LinkFailed`] and returns [`MissionError::Link`].
    pub fn poll(&mut self) -> Result<Events, MissionError> {
        let mut events = Vec::new();
        if self.finished {
            return Ok(events);
        }
        self.polls += 1;

        match self.cycle(&mut events) {
            Ok(()) => Ok(events),
            Err(e) => Err(self.abort(e)),
        }
    }

    fn cycle(&mut self, events: &mut Events) -> Result<(), LinkError> {
        if self.inputs.manual.is_active() {
            if !self.manual {
                self.manual = true;
                self.inputs.notifier.announce("Mission paused.");
                self.status("GAMEPAD control", events);
                let _ = events.push(SupervisorEvent::ManualOverride { active: true });
            }
        } else {
            if self.manual {
                self.manual = false;
                if self.started {
                    self.inputs.notifier.announce("Mission resuming.");
                    self.status("running AUTO", events);
                }
                let _ = events.push(SupervisorEvent::ManualOverride { active: false });
            }
            if !self.started && self.inputs.events.is_set(self.config.operator_go_event) {
                self.started = true;
                self.status("running AUTO", events);
                let _ = events.push(SupervisorEvent::Started {
                    at_ms: self.time.now_ms(),
                });
            }
            if self.started {
                self.step(events)?;
            }
        }

        if !self.finished {
            if self.inputs.events.is_set(self.config.all_stop_event) {
                self.finish(StopReason::AllStop, events)?;
            } else if self.phase > self.config.last_phase {
                self.finish(StopReason::Completed, events)?;
            }
        }
        Ok(())
    }

    /// Poll until finished or `cancel` returns true, sleeping the poll
    /// interval between cycles. Every event is handed to `observer`.
    pub fn run(
        &mut self,
        mut observer: impl FnMut(&SupervisorEvent),
        cancel: impl Fn() -> bool,
    ) -> Result<MissionReport, MissionError> {
        while !self.finished {
            if cancel() {
                let mut events: Events = Vec::new();
                if let Err(e) = self.finish(StopReason::Cancelled, &mut events) {
                    return Err(self.abort(e));
                }
                events.iter().for_each(&mut observer);
                break;
            }
            let events = self.poll()?;
            events.iter().for_each(&mut observer);
            if !self.finished {
                self.time.delay_ms(self.config.poll_interval_ms);
            }
        }
        Ok(self.report())
    }

    pub fn report(&self) -> MissionReport {
        MissionReport {
            reason: self.reason,
            last: self.progress(),
            polls: self.polls,
            transitions: self.transitions,
            submissions: self.slots.submissions(),
            overflows: self.slots.overflows(),
            dropped_lines: self.slots.dropped_lines(),
            elapsed_ms: self.time.elapsed_ms_since(self.started_at_ms),
        }
    }

    /// Tick the current phase once.
    fn step(&mut self, events: &mut Events) -> Result<(), LinkError> {
        let before = self.progress();
        let submissions = self.slots.submissions();
        let overflows = self.slots.overflows();

        let Some(handler) = self.registry.get_mut(self.phase) else {
            return self.finish(StopReason::Completed, events);
        };
        if self.entered != Some(self.phase) {
            handler.enter();
            self.entered = Some(self.phase);
        }

        let mut ctx = PhaseContext::new(
            &mut self.slots,
            self.inputs.events,
            self.inputs.perception,
            self.inputs.notifier,
        );
        let outcome = match handler.tick(&mut self.state, &mut ctx) {
            Ok(done) => Ok(done),
            Err(PhaseError::Link(e)) => return Err(e),
            // resolved inside the phase, the mission carries on
            Err(PhaseError::Snippet(e)) => Err((e, handler.fallback(self.state))),
        };

        if self.slots.submissions() > submissions {
            if let Some(report) = self.slots.last_report() {
                let _ = events.push(SupervisorEvent::SnippetArmed {
                    slot: report.slot,
                    lines: report.uploaded,
                });
                if self.slots.overflows() > overflows {
                    let _ = events.push(SupervisorEvent::CapacityExceeded {
                        phase: self.phase,
                        dropped: report.dropped,
                    });
                }
            }
        }

        match outcome {
            Ok(true) => {
                self.phase = self.phase.saturating_add(1);
                self.state = 0;
            }
            Ok(false) => {}
            Err((error, fallback)) => {
                let _ = events.push(SupervisorEvent::PhaseFault {
                    phase: self.phase,
                    error: PhaseError::Snippet(error),
                    fallback,
                });
                self.state = fallback;
            }
        }

        let after = self.progress();
        if after != before {
            self.transitions += 1;
            let _ = events.push(SupervisorEvent::Transition {
                at_ms: self.time.now_ms(),
                from: before,
                to: after,
            });
            let mut text: heapless::String<32> = heapless::String::new();
            let _ = fmt::Write::write_fmt(&mut text, format_args!("{}", after));
            self.show(DisplayRow::Progress, &text, events);
        }
        Ok(())
    }

    /// Enter the finished state and send the single stop command.
    fn finish(&mut self, reason: StopReason, events: &mut Events) -> Result<(), LinkError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.reason = Some(reason);
        self.send_stop()?;
        self.inputs.notifier.announce("Mission finished.");
        self.status("finished", events);
        let _ = events.push(SupervisorEvent::Finished { reason });
        Ok(())
    }

    /// Finish after a controller write failed, attempting the stop once.
    fn abort(&mut self, error: LinkError) -> MissionError {
        self.finished = true;
        self.reason = Some(StopReason::LinkFailed);
        let _ = self.send_stop();
        self.inputs.notifier.announce("Connection to robot lost.");
        MissionError::Link(error)
    }

    /// Send stop unless it has already been attempted.
    fn send_stop(&mut self) -> Result<(), LinkError> {
        if self.stop_sent {
            return Ok(());
        }
        self.stop_sent = true;
        self.slots.controller_mut().send(&ControllerCommand::Stop)
    }

    fn status(&mut self, text: &str, events: &mut Events) {
        self.inputs.notifier.display(text);
        self.show(DisplayRow::Status, text, events);
    }

    fn show(&mut self, row: DisplayRow, text: &str, events: &mut Events) {
        let command = ControllerCommand::display(row, text);
        if let Err(error) = self.slots.controller_mut().send(&command) {
            let _ = events.push(SupervisorEvent::DisplayFailed { row, error });
        }
    }
}
