//! Pickup Phase
//!
//! Search for an object beside the track, approach and grab it, deliver it
//! past the crossing line and return to the home line.
//!
//! # States
//!
//! | state | waits for | then |
//! |-------|-----------|------|
//! | 0  | -                       | prepare snippet, → 10 |
//! | 10 | search event            | request detection, → 11 |
//! | 11 | detection result        | target → 30, none → 20 |
//! | 20 | -                       | retry snippet → 10, or → 50 when retries are spent |
//! | 30 | -                       | approach snippet, → 40 |
//! | 40 | approach event          | grab snippet, → 41 |
//! | 41 | approach event          | deliver snippet, → 66 |
//! | 50 | -                       | stop-and-signal snippet, → 66 |
//! | 66 | approach event          | return snippet, → 999 |
//!
//! Each search attempt signals on its own event id
//! (`search_event_base + attempt`) so a late event from an earlier attempt
//! cannot complete a later one.

use crate::event::{ids, EventId};
use crate::snippet::{LineBuilder, MissionLine, Sensor, SnippetBuffer, SnippetError};
use crate::traits::Detection;

use super::{Phase, PhaseContext, PhaseError, PhaseState, STATE_DONE};

/// State numbers of the pickup phase.
pub mod state {
    use crate::phase::PhaseState;

    pub const PREPARE: PhaseState = 0;
    pub const AWAIT_SEARCH: PhaseState = 10;
    pub const DETECT: PhaseState = 11;
    pub const RETRY: PhaseState = 20;
    pub const APPROACH: PhaseState = 30;
    pub const GRAB: PhaseState = 40;
    pub const DELIVER: PhaseState = 41;
    pub const GIVE_UP: PhaseState = 50;
    pub const RETURN: PhaseState = 66;
    pub const DONE: PhaseState = crate::phase::STATE_DONE;
}

/// Tuning for the pickup phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PickupConfig {
    /// Driving speed (m/s)
    pub speed: f32,
    /// Acceleration limit (m/s²)
    pub accel: f32,
    /// Gripper servo index
    pub servo: u8,
    /// Gripper raised/open position
    pub servo_up: i32,
    /// Gripper closed position
    pub servo_grip: i32,
    /// Drive past the crossing line before the search turn (m)
    pub bump_distance: f32,
    /// Line-follow step between search attempts (m)
    pub reposition_distance: f32,
    /// Crossing-line and line-valid sensor threshold
    pub crossing_threshold: f32,
    /// Detections at or beyond this distance are ignored (mm)
    pub detect_max_mm: f32,
    /// Stop this far short of the object (m)
    pub standoff: f32,
    /// Search retries after the first attempt
    pub max_retries: u8,
    pub search_event_base: EventId,
    pub approach_event: EventId,
    /// Polls to wait for perception before assuming no detection
    pub detection_poll_limit: u32,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            speed: 0.2,
            accel: 2.0,
            servo: 3,
            servo_up: 900,
            servo_grip: -100,
            bump_distance: 0.5,
            reposition_distance: 0.3,
            crossing_threshold: 16.0,
            detect_max_mm: 1100.0,
            standoff: 0.20,
            max_retries: 3,
            search_event_base: ids::SEARCH_BASE,
            approach_event: ids::APPROACH_DONE,
            detection_poll_limit: 500,
        }
    }
}

impl PickupConfig {
    /// Every event id the phase may wait on.
    pub fn event_ids(&self) -> impl Iterator<Item = EventId> + '_ {
        (0..=self.max_retries)
            .map(move |n| self.search_event_base.saturating_add(n))
            .chain(core::iter::once(self.approach_event))
    }
}

/// Search, approach, grab, deliver, return.
#[derive(Debug, Clone)]
pub struct PickupPhase {
    config: PickupConfig,
    attempt: u8,
    polls: u32,
    target: Detection,
}

impl PickupPhase {
    pub fn new(config: PickupConfig) -> Self {
        Self {
            config,
            attempt: 0,
            polls: 0,
            target: Detection::none(),
        }
    }

    /// Search retries used so far.
    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    /// Detection the approach is based on.
    pub fn target(&self) -> Detection {
        self.target
    }

    fn search_event(&self) -> EventId {
        self.config.search_event_base.saturating_add(self.attempt)
    }

    /// Drive-by distance for the approach: object distance less the standoff.
    pub fn approach_distance(&self) -> f32 {
        let d = self.target.distance_mm / 1000.0 - self.config.standoff;
        if d > 0.0 {
            d
        } else {
            0.0
        }
    }

    // ========================================================================
    // Snippets
    // ========================================================================

    fn drive(&self) -> LineBuilder {
        MissionLine::builder().vel(self.config.speed).acc(self.config.accel)
    }

    fn follow_line(&self) -> LineBuilder {
        self.drive().white(true).edge_left(0.0)
    }

    fn spin(&self, degrees: f32) -> LineBuilder {
        self.drive().turn_radius(0.0).until_turn(degrees)
    }

    fn reverse_to_line(&self) -> LineBuilder {
        MissionLine::builder()
            .vel(-self.config.speed)
            .acc(self.config.accel)
            .until_above(Sensor::LineValid, self.config.crossing_threshold)
    }

    fn pause(seconds: f32) -> LineBuilder {
        MissionLine::builder().vel(0.0).until_time(seconds)
    }

    fn signal(event: EventId, seconds: f32) -> LineBuilder {
        MissionLine::builder().vel(0.0).event(event).until_time(seconds)
    }

    fn prepare_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let c = &self.config;
        let mut buf = SnippetBuffer::new();
        buf.push_line(
            MissionLine::builder()
                .vel(0.0)
                .acc(0.0)
                .log(5.0)
                .white(true)
                .edge_left(0.0)
                .until_time(1.0),
        )?;
        buf.push_line(MissionLine::builder().servo(c.servo, c.servo_up).until_time(2.0))?;
        buf.push_line(
            self.follow_line()
                .until_above(Sensor::CrossingLine, c.crossing_threshold),
        )?;
        buf.push_line(self.follow_line().until_dist(c.bump_distance))?;
        buf.push_line(MissionLine::builder().vel(0.0).acc(c.accel).until_time(0.2))?;
        buf.push_line(self.spin(-100.0))?;
        buf.push_line(self.spin(5.0))?;
        buf.push_line(self.reverse_to_line())?;
        buf.push_line(Self::signal(self.search_event(), 1.0))?;
        Ok(buf)
    }

    fn retry_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let mut buf = SnippetBuffer::new();
        buf.push_line(self.spin(90.0))?;
        buf.push_line(self.spin(-5.0))?;
        buf.push_line(self.follow_line().until_dist(self.config.reposition_distance))?;
        buf.push_line(Self::pause(0.1))?;
        buf.push_line(self.spin(-90.0))?;
        buf.push_line(self.spin(5.0))?;
        buf.push_line(self.reverse_to_line())?;
        buf.push_line(Self::signal(self.search_event(), 0.1))?;
        Ok(buf)
    }

    fn approach_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let mut buf = SnippetBuffer::new();
        buf.push_line(self.spin(self.target.angle_deg))?;
        buf.push_line(self.drive().until_dist(self.approach_distance()))?;
        buf.push_line(Self::signal(self.config.approach_event, 0.1))?;
        Ok(buf)
    }

    fn grab_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let c = &self.config;
        let mut buf = SnippetBuffer::new();
        buf.push_line(MissionLine::builder().servo(c.servo, c.servo_grip).until_time(2.0))?;
        buf.push_line(self.spin(-self.target.angle_deg))?;
        buf.push_line(self.reverse_to_line())?;
        buf.push_line(Self::signal(c.approach_event, 0.1))?;
        Ok(buf)
    }

    fn deliver_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let c = &self.config;
        let turn = |deg: f32| MissionLine::builder().vel(c.speed).turn_radius(0.0).until_turn(deg);
        let mut buf = SnippetBuffer::new();
        buf.push_line(turn(90.0))?;
        buf.push_line(turn(-5.0))?;
        buf.push_line(
            self.follow_line()
                .until_above(Sensor::CrossingLine, c.crossing_threshold),
        )?;
        buf.push_line(Self::pause(0.1))?;
        buf.push_line(turn(90.0))?;
        buf.push_line(Self::pause(0.1))?;
        buf.push_line(self.follow_line().until_dist(0.1))?;
        buf.push_line(Self::pause(0.1))?;
        buf.push_line(MissionLine::builder().servo(c.servo, c.servo_up).until_time(2.0))?;
        buf.push_line(Self::signal(c.approach_event, 0.1))?;
        Ok(buf)
    }

    fn give_up_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let mut buf = SnippetBuffer::new();
        buf.push_line(Self::signal(self.config.approach_event, 0.1))?;
        Ok(buf)
    }

    fn return_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let mut buf = SnippetBuffer::new();
        buf.push_line(self.drive().turn_radius(0.0).until_turn(180.0).until_time(2.0))?;
        buf.push_line(self.drive().turn_radius(0.0).until_turn(-5.0).until_time(2.0))?;
        buf.push_line(
            self.follow_line()
                .until_above(Sensor::CrossingLine, self.config.crossing_threshold),
        )?;
        buf.push_line(Self::pause(0.1))?;
        Ok(buf)
    }
}

impl Phase for PickupPhase {
    fn name(&self) -> &'static str {
        "pickup"
    }

    fn enter(&mut self) {
        self.attempt = 0;
        self.polls = 0;
        self.target = Detection::none();
    }

    fn tick(
        &mut self,
        state: &mut PhaseState,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<bool, PhaseError> {
        match *state {
            state::PREPARE => {
                ctx.discard_event(self.search_event());
                ctx.submit(&self.prepare_snippet()?)?;
                ctx.notifier().display("searching");
                *state = state::AWAIT_SEARCH;
            }
            state::AWAIT_SEARCH => {
                if ctx.event(self.search_event()) {
                    ctx.perception().request_detection();
                    self.polls = 0;
                    *state = state::DETECT;
                }
            }
            state::DETECT => {
                if ctx.perception().detection_pending() {
                    self.polls += 1;
                    if self.polls >= self.config.detection_poll_limit {
                        ctx.notifier().display("detection unavailable");
                        *state = state::RETRY;
                    }
                } else {
                    let detection = ctx.perception().latest();
                    if detection.within(self.config.detect_max_mm) {
                        self.target = detection;
                        ctx.notifier().display("object detected");
                        *state = state::APPROACH;
                    } else {
                        *state = state::RETRY;
                    }
                }
            }
            state::RETRY => {
                if self.attempt < self.config.max_retries {
                    self.attempt += 1;
                    ctx.discard_event(self.search_event());
                    ctx.submit(&self.retry_snippet()?)?;
                    *state = state::AWAIT_SEARCH;
                } else {
                    *state = state::GIVE_UP;
                }
            }
            state::APPROACH => {
                ctx.discard_event(self.config.approach_event);
                ctx.submit(&self.approach_snippet()?)?;
                *state = state::GRAB;
            }
            state::GRAB => {
                if ctx.event(self.config.approach_event) {
                    ctx.submit(&self.grab_snippet()?)?;
                    *state = state::DELIVER;
                }
            }
            state::DELIVER => {
                if ctx.event(self.config.approach_event) {
                    ctx.submit(&self.deliver_snippet()?)?;
                    *state = state::RETURN;
                }
            }
            state::GIVE_UP => {
                ctx.discard_event(self.config.approach_event);
                ctx.submit(&self.give_up_snippet()?)?;
                ctx.notifier().announce("No object found, returning.");
                *state = state::RETURN;
            }
            state::RETURN => {
                if ctx.event(self.config.approach_event) {
                    ctx.submit(&self.return_snippet()?)?;
                    *state = STATE_DONE;
                }
            }
            _ => {
                ctx.notifier().display("pickup ended");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn fallback(&self, state: PhaseState) -> PhaseState {
        match state {
            state::APPROACH => state::RETRY,
            state::PREPARE | state::RETRY | state::GRAB | state::DELIVER => state::GIVE_UP,
            _ => STATE_DONE,
        }
    }
}
