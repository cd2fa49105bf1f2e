//! Marker-seek phase: turn in place until a marker is seen, then drive up to
//! it and stop a standoff distance in front.
//!
//! After arriving, [`ReachPolicy`] decides whether to look for the next marker
//! or end the phase. A marker with the configured stop identity ends the phase
//! immediately.

use crate::event::{ids, EventId};
use crate::snippet::{MissionLine, SnippetBuffer, SnippetError};
use crate::traits::Detection;

use super::{Phase, PhaseContext, PhaseError, PhaseState, STATE_DONE};

/// State numbers of the marker-seek phase.
pub mod state {
    use crate::phase::PhaseState;

    pub const START: PhaseState = 0;
    pub const LOOK: PhaseState = 11;
    pub const DETECT: PhaseState = 12;
    pub const TURN: PhaseState = 20;
    pub const AWAIT_TURN: PhaseState = 21;
    pub const APPROACH: PhaseState = 30;
    pub const AWAIT_ARRIVAL: PhaseState = 31;
}

/// What to do once the robot has reached a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachPolicy {
    /// Look for another marker
    Rescan,
    /// End the phase
    #[default]
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerConfig {
    /// Completion event of every marker snippet
    pub event: EventId,
    /// Stop this far in front of the marker (m)
    pub standoff: f32,
    /// Movements shorter than this count as already there (m)
    pub min_move: f32,
    /// Search turns before giving up
    pub max_turns: u32,
    /// Search turn step (degrees)
    pub turn_step: f32,
    pub turn_speed: f32,
    pub turn_radius: f32,
    pub approach_speed: f32,
    pub accel: f32,
    /// Detections at or beyond this distance are ignored (mm)
    pub detect_max_mm: f32,
    pub detection_poll_limit: u32,
    pub on_reach: ReachPolicy,
    /// Marker identity that ends the phase when seen
    pub stop_identity: Option<u32>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            event: ids::MARKER_DONE,
            standoff: 0.3,
            min_move: 0.03,
            max_turns: 36,
            turn_step: 10.0,
            turn_speed: 0.25,
            turn_radius: 0.15,
            approach_speed: 0.3,
            accel: 1.0,
            detect_max_mm: 3000.0,
            detection_poll_limit: 500,
            on_reach: ReachPolicy::Stop,
            stop_identity: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkerSeekPhase {
    config: MarkerConfig,
    turns: u32,
    polls: u32,
    reached: u32,
    target: Detection,
}

impl MarkerSeekPhase {
    pub fn new(config: MarkerConfig) -> Self {
        Self {
            config,
            turns: 0,
            polls: 0,
            reached: 0,
            target: Detection::none(),
        }
    }

    /// Search turns made so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Markers reached so far.
    pub fn reached(&self) -> u32 {
        self.reached
    }

    fn movement(&self) -> f32 {
        self.target.distance_mm / 1000.0 - self.config.standoff
    }

    fn turn_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let c = &self.config;
        let mut buf = SnippetBuffer::new();
        buf.push_line(
            MissionLine::builder()
                .vel(c.turn_speed)
                .turn_radius(c.turn_radius)
                .until_turn(c.turn_step)
                .until_time(10.0),
        )?;
        buf.push_line(MissionLine::builder().vel(0.0).event(c.event).until_time(0.1))?;
        Ok(buf)
    }

    fn approach_snippet(&self) -> Result<SnippetBuffer, SnippetError> {
        let c = &self.config;
        let mut buf = SnippetBuffer::new();
        buf.push_line(
            MissionLine::builder()
                .vel(c.approach_speed)
                .acc(c.accel)
                .turn_radius(0.0)
                .until_turn(self.target.angle_deg),
        )?;
        buf.push_line(
            MissionLine::builder()
                .vel(c.approach_speed)
                .acc(c.accel)
                .until_dist(self.movement()),
        )?;
        buf.push_line(MissionLine::builder().vel(0.0).event(c.event).until_time(0.1))?;
        Ok(buf)
    }

    fn after_reach(&self) -> PhaseState {
        match self.config.on_reach {
            ReachPolicy::Rescan => state::LOOK,
            ReachPolicy::Stop => STATE_DONE,
        }
    }
}

impl Phase for MarkerSeekPhase {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn enter(&mut self) {
        self.turns = 0;
        self.polls = 0;
        self.reached = 0;
        self.target = Detection::none();
    }

    fn tick(
        &mut self,
        state: &mut PhaseState,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<bool, PhaseError> {
        match *state {
            state::START => {
                ctx.notifier().announce("Looking for marker.");
                ctx.notifier().display("looking for marker");
                *state = state::LOOK;
            }
            state::LOOK => {
                ctx.perception().request_detection();
                self.polls = 0;
                *state = state::DETECT;
            }
            state::DETECT => {
                if ctx.perception().detection_pending() {
                    self.polls += 1;
                    if self.polls >= self.config.detection_poll_limit {
                        *state = state::TURN;
                    }
                } else {
                    let detection = ctx.perception().latest();
                    if detection.within(self.config.detect_max_mm) {
                        self.target = detection;
                        ctx.notifier().display("found marker");
                        *state = state::APPROACH;
                    } else {
                        *state = state::TURN;
                    }
                }
            }
            state::TURN => {
                ctx.discard_event(self.config.event);
                ctx.submit(&self.turn_snippet()?)?;
                *state = state::AWAIT_TURN;
            }
            state::AWAIT_TURN => {
                if ctx.event(self.config.event) {
                    *state = if self.turns < self.config.max_turns {
                        state::LOOK
                    } else {
                        ctx.notifier().display("no marker found");
                        STATE_DONE
                    };
                    self.turns += 1;
                }
            }
            state::APPROACH => {
                let stop = self.config.stop_identity;
                if stop.is_some() && self.target.identity == stop {
                    ctx.notifier().display("stop marker");
                    *state = STATE_DONE;
                } else if self.movement() > self.config.min_move {
                    ctx.discard_event(self.config.event);
                    ctx.submit(&self.approach_snippet()?)?;
                    ctx.notifier().display("driving to marker");
                    *state = state::AWAIT_ARRIVAL;
                } else {
                    self.reached += 1;
                    *state = self.after_reach();
                }
            }
            state::AWAIT_ARRIVAL => {
                if ctx.event(self.config.event) {
                    self.reached += 1;
                    *state = self.after_reach();
                }
            }
            _ => {
                ctx.notifier().display("marker ended");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn fallback(&self, state: PhaseState) -> PhaseState {
        match state {
            state::APPROACH => state::TURN,
            _ => STATE_DONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::testing::Harness;

    fn phase(config: MarkerConfig) -> MarkerSeekPhase {
        let mut p = MarkerSeekPhase::new(config);
        p.enter();
        p
    }

    fn marker(distance_mm: f32, angle_deg: f32, identity: u32) -> Detection {
        Detection {
            identity: Some(identity),
            ..Detection::found(distance_mm, angle_deg)
        }
    }

    #[test]
    fn test_turns_until_marker_seen() {
        let mut h = Harness::new();
        h.perception.push_result(Detection::none());
        h.perception.push_result(marker(800.0, -20.0, 3));
        let mut p = phase(MarkerConfig::default());
        let mut s = state::START;

        h.tick(&mut p, &mut s); // announce
        h.tick(&mut p, &mut s); // request
        h.tick(&mut p, &mut s); // nothing seen
        assert_eq!(s, state::TURN);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::AWAIT_TURN);
        assert_eq!(
            h.snippets()[0],
            ["vel=0.25, tr=0.15: turn=10, time=10", "vel=0, event=6: time=0.1"]
        );

        h.events.raise(6);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::LOOK);
        assert_eq!(p.turns(), 1);

        h.tick(&mut p, &mut s);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::APPROACH);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::AWAIT_ARRIVAL);
        assert_eq!(
            h.snippets()[1],
            [
                "vel=0.3, acc=1, tr=0: turn=-20",
                "vel=0.3, acc=1: dist=0.5",
                "vel=0, event=6: time=0.1",
            ]
        );
        assert_eq!(h.perception.requests(), 2);
    }

    #[test]
    fn test_gives_up_after_full_circle() {
        let mut h = Harness::new();
        let config = MarkerConfig {
            max_turns: 2,
            ..MarkerConfig::default()
        };
        let mut p = phase(config);
        let mut s = state::LOOK;

        for _ in 0..50 {
            if s == state::AWAIT_TURN {
                h.events.raise(6);
            }
            if h.tick(&mut p, &mut s) {
                break;
            }
        }

        assert_eq!(s, STATE_DONE);
        assert_eq!(p.turns(), 3);
        assert_eq!(h.snippets().len(), 3);
        assert!(h.notifier.displays().contains(&"no marker found".to_string()));
    }

    #[test]
    fn test_stop_policy_ends_after_arrival() {
        let mut h = Harness::new();
        let mut p = phase(MarkerConfig::default());
        p.target = marker(600.0, 0.0, 1);
        let mut s = state::APPROACH;

        h.tick(&mut p, &mut s);
        h.events.raise(6);
        h.tick(&mut p, &mut s);

        assert_eq!(s, STATE_DONE);
        assert_eq!(p.reached(), 1);
    }

    #[test]
    fn test_rescan_policy_looks_again() {
        let mut h = Harness::new();
        let config = MarkerConfig {
            on_reach: ReachPolicy::Rescan,
            ..MarkerConfig::default()
        };
        let mut p = phase(config);
        p.target = marker(600.0, 0.0, 1);
        let mut s = state::APPROACH;

        h.tick(&mut p, &mut s);
        h.events.raise(6);
        h.tick(&mut p, &mut s);

        assert_eq!(s, state::LOOK);
    }

    #[test]
    fn test_close_marker_needs_no_motion() {
        let mut h = Harness::new();
        let mut p = phase(MarkerConfig::default());
        p.target = marker(320.0, 5.0, 1);
        let mut s = state::APPROACH;

        h.tick(&mut p, &mut s);

        assert_eq!(s, STATE_DONE);
        assert!(h.snippets().is_empty());
    }

    #[test]
    fn test_stop_identity_ends_phase() {
        let mut h = Harness::new();
        let config = MarkerConfig {
            stop_identity: Some(6),
            ..MarkerConfig::default()
        };
        let mut p = phase(config);
        p.target = marker(900.0, 0.0, 6);
        let mut s = state::APPROACH;

        h.tick(&mut p, &mut s);

        assert_eq!(s, STATE_DONE);
        assert!(h.snippets().is_empty());
    }

    #[test]
    fn test_out_of_range_detection_turns_instead() {
        let mut h = Harness::new();
        h.perception.push_result(Detection::found(1.0e35, 0.0));
        h.perception.push_result(Detection::found(f32::NAN, f32::NAN));
        let mut p = phase(MarkerConfig::default());
        let mut s = state::LOOK;

        h.tick(&mut p, &mut s);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::TURN);

        s = state::LOOK;
        h.tick(&mut p, &mut s);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::TURN);
        assert!(h.snippets().is_empty());
    }

    #[test]
    fn test_fallback_states() {
        let p = phase(MarkerConfig::default());
        assert_eq!(p.fallback(state::APPROACH), state::TURN);
        assert_eq!(p.fallback(state::TURN), STATE_DONE);
    }

    #[test]
    fn test_detection_timeout_turns() {
        let mut h = Harness::new();
        h.perception.hang();
        let config = MarkerConfig {
            detection_poll_limit: 2,
            ..MarkerConfig::default()
        };
        let mut p = phase(config);
        let mut s = state::LOOK;

        h.tick(&mut p, &mut s);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::DETECT);
        h.tick(&mut p, &mut s);
        assert_eq!(s, state::TURN);
    }
}
