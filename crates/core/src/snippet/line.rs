//! Mission line text and its builder.
//!
//! A mission line is one REGBOT primitive: a comma separated list of action
//! fields, optionally followed by `:` and the condition that ends it, e.g.
//! `vel=0.2, acc=2: dist=0.5`. The core never parses lines; it only composes
//! them from typed fields.

use core::fmt::{self, Write};
use core::str::FromStr;

use heapless::{String, Vec};

use crate::event::EventId;

/// Maximum length of one mission line in bytes.
pub const MISSION_LINE_LEN: usize = 100;

/// Maximum action fields on one line.
const MAX_ACTIONS: usize = 10;

/// Maximum condition fields on one line.
const MAX_CONDITIONS: usize = 4;

/// Errors from composing a mission line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineError {
    /// Rendered text does not fit in [`MISSION_LINE_LEN`]
    TooLong,
    /// Text contains a line break, which would split the command
    LineBreak,
    /// Builder was finished without any field
    Empty,
    /// More fields than the builder holds
    TooManyFields,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::TooLong => write!(f, "mission line longer than {} bytes", MISSION_LINE_LEN),
            LineError::LineBreak => write!(f, "mission line contains a line break"),
            LineError::Empty => write!(f, "mission line has no fields"),
            LineError::TooManyFields => write!(f, "too many fields on one mission line"),
        }
    }
}

/// One bounded mission line.
///
/// The empty line is valid: it marks the end of a snippet during upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissionLine(String<MISSION_LINE_LEN>);

impl MissionLine {
    /// Wrap literal text, rejecting oversize text and line breaks.
    pub fn new(text: &str) -> Result<Self, LineError> {
        if text.contains(['\n', '\r']) {
            return Err(LineError::LineBreak);
        }
        let mut s = String::new();
        s.push_str(text).map_err(|_| LineError::TooLong)?;
        Ok(Self(s))
    }

    /// The early-terminator line.
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Start composing a line from typed fields.
    pub fn builder() -> LineBuilder {
        LineBuilder::new()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for MissionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionLine {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for MissionLine {
    type Error = LineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Controller-side sensor readings usable in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    /// Crossing-line detector value (`xl`)
    CrossingLine,
    /// Line-valid counter of the edge sensor (`lv`)
    LineValid,
    /// IR distance sensor 1 (`ir1`)
    Ir1,
    /// IR distance sensor 2 (`ir2`)
    Ir2,
    /// Distance driven on this line (`dist`)
    Distance,
}

impl Sensor {
    fn key(self) -> &'static str {
        match self {
            Sensor::CrossingLine => "xl",
            Sensor::LineValid => "lv",
            Sensor::Ir1 => "ir1",
            Sensor::Ir2 => "ir2",
            Sensor::Distance => "dist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Vel(f32),
    Acc(f32),
    TurnRadius(f32),
    Log(f32),
    White(bool),
    EdgeLeft(f32),
    Servo(u8),
    ServoPosition(i32),
    Event(EventId),
    IrSensor(bool),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Action::Vel(v) => write!(f, "vel={}", Num(v)),
            Action::Acc(v) => write!(f, "acc={}", Num(v)),
            Action::TurnRadius(v) => write!(f, "tr={}", Num(v)),
            Action::Log(v) => write!(f, "log={}", Num(v)),
            Action::White(on) => write!(f, "white={}", u8::from(on)),
            Action::EdgeLeft(v) => write!(f, "edgel={}", Num(v)),
            Action::Servo(id) => write!(f, "servo={}", id),
            Action::ServoPosition(p) => write!(f, "pservo={}", p),
            Action::Event(id) => write!(f, "event={}", id),
            Action::IrSensor(on) => write!(f, "irsensor={}", u8::from(on)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Condition {
    Dist(f32),
    Turn(f32),
    Time(f32),
    Above(Sensor, f32),
    Below(Sensor, f32),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Condition::Dist(v) => write!(f, "dist={}", Num(v)),
            Condition::Turn(v) => write!(f, "turn={}", Num(v)),
            Condition::Time(v) => write!(f, "time={}", Num(v)),
            Condition::Above(s, v) => write!(f, "{}>{}", s.key(), Num(v)),
            Condition::Below(s, v) => write!(f, "{}<{}", s.key(), Num(v)),
        }
    }
}

/// Number rendered with at most three decimals and no trailing zeros.
struct Num(f32);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf: String<32> = String::new();
        write!(buf, "{:.3}", self.0)?;
        let mut text = buf.as_str();
        if text.contains('.') {
            text = text.trim_end_matches('0').trim_end_matches('.');
        }
        if text == "-0" {
            text = "0";
        }
        f.write_str(text)
    }
}

/// Typed composer for [`MissionLine`].
///
/// # Example
///
/// ```
/// use robobot_mission_core::snippet::{MissionLine, Sensor};
///
/// let line = MissionLine::builder()
///     .vel(0.2)
///     .acc(2.0)
///     .until_above(Sensor::CrossingLine, 16.0)
///     .build()
///     .unwrap();
/// assert_eq!(line.as_str(), "vel=0.2, acc=2: xl>16");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LineBuilder {
    actions: Vec<Action, MAX_ACTIONS>,
    conditions: Vec<Condition, MAX_CONDITIONS>,
    overflow: bool,
}

impl LineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn action(mut self, action: Action) -> Self {
        if self.actions.push(action).is_err() {
            self.overflow = true;
        }
        self
    }

    fn condition(mut self, condition: Condition) -> Self {
        if self.conditions.push(condition).is_err() {
            self.overflow = true;
        }
        self
    }

    /// Reference velocity in m/s (negative reverses).
    pub fn vel(self, v: f32) -> Self {
        self.action(Action::Vel(v))
    }

    /// Acceleration limit in m/s².
    pub fn acc(self, a: f32) -> Self {
        self.action(Action::Acc(a))
    }

    /// Turn radius in metres (0 turns on the spot).
    pub fn turn_radius(self, r: f32) -> Self {
        self.action(Action::TurnRadius(r))
    }

    /// Controller log interval in milliseconds.
    pub fn log(self, interval: f32) -> Self {
        self.action(Action::Log(interval))
    }

    /// Follow a white (true) or black line.
    pub fn white(self, on: bool) -> Self {
        self.action(Action::White(on))
    }

    /// Follow the left line edge with the given offset.
    pub fn edge_left(self, offset: f32) -> Self {
        self.action(Action::EdgeLeft(offset))
    }

    /// Move servo `id` to `position`.
    pub fn servo(self, id: u8, position: i32) -> Self {
        self.action(Action::Servo(id)).action(Action::ServoPosition(position))
    }

    /// Raise event `id` when this line starts.
    pub fn event(self, id: EventId) -> Self {
        self.action(Action::Event(id))
    }

    /// Switch the IR distance sensors on or off.
    pub fn ir_sensor(self, on: bool) -> Self {
        self.action(Action::IrSensor(on))
    }

    /// End after driving `metres`.
    pub fn until_dist(self, metres: f32) -> Self {
        self.condition(Condition::Dist(metres))
    }

    /// End after turning `degrees` (positive is counter-clockwise).
    pub fn until_turn(self, degrees: f32) -> Self {
        self.condition(Condition::Turn(degrees))
    }

    /// End after `seconds`.
    pub fn until_time(self, seconds: f32) -> Self {
        self.condition(Condition::Time(seconds))
    }

    /// End when `sensor` reads above `value`.
    pub fn until_above(self, sensor: Sensor, value: f32) -> Self {
        self.condition(Condition::Above(sensor, value))
    }

    /// End when `sensor` reads below `value`.
    pub fn until_below(self, sensor: Sensor, value: f32) -> Self {
        self.condition(Condition::Below(sensor, value))
    }

    /// Render the line.
    pub fn build(self) -> Result<MissionLine, LineError> {
        if self.overflow {
            return Err(LineError::TooManyFields);
        }
        if self.actions.is_empty() && self.conditions.is_empty() {
            return Err(LineError::Empty);
        }

        let mut text: String<MISSION_LINE_LEN> = String::new();
        self.render(&mut text).map_err(|_| LineError::TooLong)?;
        Ok(MissionLine(text))
    }

    fn render(&self, out: &mut impl Write) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            write!(out, "{}", action)?;
        }
        if !self.conditions.is_empty() {
            out.write_str(": ")?;
            for (i, condition) in self.conditions.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{}", condition)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_line() {
        let line = MissionLine::new("vel=0 : time=0.1").unwrap();
        assert_eq!(line.as_str(), "vel=0 : time=0.1");
        assert!(!line.is_empty());
    }

    #[test]
    fn test_literal_rejects_line_break() {
        assert_eq!(MissionLine::new("vel=0\nstop"), Err(LineError::LineBreak));
    }

    #[test]
    fn test_literal_rejects_oversize_text() {
        let long = "x".repeat(MISSION_LINE_LEN + 1);
        assert_eq!(MissionLine::new(&long), Err(LineError::TooLong));
        assert!(MissionLine::new(&"x".repeat(MISSION_LINE_LEN)).is_ok());
    }

    #[test]
    fn test_empty_line_is_terminator() {
        assert!(MissionLine::empty().is_empty());
        assert_eq!(MissionLine::default(), MissionLine::empty());
    }

    #[test]
    fn test_builder_actions_and_condition() {
        let line = MissionLine::builder()
            .vel(0.2)
            .acc(2.0)
            .turn_radius(0.0)
            .until_turn(-100.0)
            .build()
            .unwrap();
        assert_eq!(line.as_str(), "vel=0.2, acc=2, tr=0: turn=-100");
    }

    #[test]
    fn test_builder_condition_only() {
        let line = MissionLine::builder().until_dist(1.0).build().unwrap();
        assert_eq!(line.as_str(), ": dist=1");
    }

    #[test]
    fn test_builder_actions_only() {
        let line = MissionLine::builder().vel(0.0).event(1).build().unwrap();
        assert_eq!(line.as_str(), "vel=0, event=1");
    }

    #[test]
    fn test_builder_servo_and_sensor_fields() {
        let line = MissionLine::builder()
            .servo(3, -100)
            .until_time(2.0)
            .build()
            .unwrap();
        assert_eq!(line.as_str(), "servo=3, pservo=-100: time=2");

        let line = MissionLine::builder()
            .ir_sensor(true)
            .vel(0.0)
            .until_below(Sensor::Distance, 0.2)
            .build()
            .unwrap();
        assert_eq!(line.as_str(), "irsensor=1, vel=0: dist<0.2");
    }

    #[test]
    fn test_builder_multiple_conditions() {
        let line = MissionLine::builder()
            .vel(0.25)
            .turn_radius(0.15)
            .until_turn(10.0)
            .until_time(10.0)
            .build()
            .unwrap();
        assert_eq!(line.as_str(), "vel=0.25, tr=0.15: turn=10, time=10");
    }

    #[test]
    fn test_number_rounding_and_trimming() {
        // 0.45 - 0.2 in f32 is not exactly 0.25
        let drive = 450.0f32 / 1000.0 - 0.20;
        let line = MissionLine::builder().until_dist(drive).build().unwrap();
        assert_eq!(line.as_str(), ": dist=0.25");

        let line = MissionLine::builder().until_turn(-0.0001).build().unwrap();
        assert_eq!(line.as_str(), ": turn=0");

        let line = MissionLine::builder().until_turn(12.345_6).build().unwrap();
        assert_eq!(line.as_str(), ": turn=12.346");
    }

    #[test]
    fn test_builder_empty_is_error() {
        assert_eq!(LineBuilder::new().build(), Err(LineError::Empty));
    }

    #[test]
    fn test_builder_too_many_fields() {
        let mut b = LineBuilder::new();
        for _ in 0..=MAX_ACTIONS {
            b = b.vel(0.1);
        }
        assert_eq!(b.build(), Err(LineError::TooManyFields));
    }
}
