//! Controller Link Commands
//!
//! Typed commands for the motion-controller bridge. Each command renders to
//! exactly one text line (without the trailing newline); the transport adds
//! the terminator. Line content inside [`MissionLine`] is opaque here.

use core::fmt;

use crate::event::EventId;
use crate::snippet::MissionLine;

/// Controller-side thread identity.
pub type ThreadId = u16;

/// Errors reported by a [`Controller`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The connection is gone
    Disconnected,
    /// The command could not be written completely
    WriteFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Disconnected => write!(f, "controller link disconnected"),
            LinkError::WriteFailed => write!(f, "failed to write command to controller link"),
        }
    }
}

/// Data channels the host subscribes to during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannel {
    Pose,
    Edge,
    Motor,
    Event,
    Joy,
    Info,
    IrDistance,
    Imu,
}

impl DataChannel {
    /// Every channel the mission reads.
    pub const ALL: [DataChannel; 8] = [
        DataChannel::Pose,
        DataChannel::Edge,
        DataChannel::Motor,
        DataChannel::Event,
        DataChannel::Joy,
        DataChannel::Info,
        DataChannel::IrDistance,
        DataChannel::Imu,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataChannel::Pose => "pose",
            DataChannel::Edge => "edge",
            DataChannel::Motor => "motor",
            DataChannel::Event => "event",
            DataChannel::Joy => "joy",
            DataChannel::Info => "info",
            DataChannel::IrDistance => "irdist",
            DataChannel::Imu => "imu",
        }
    }
}

/// Display rows on the robot's small screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRow {
    /// Link and override status
    Status = 3,
    /// Current phase and state
    Progress = 4,
    /// Phase-specific messages
    Phase = 5,
}

/// One command to the controller bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    /// Stop any running program on the controller (`robot stop`)
    Halt,
    /// Drop the whole loaded program (`robot <clear`)
    ClearProgram,
    /// Append a thread; optional start and stop events
    AddThread {
        thread: ThreadId,
        start_event: Option<EventId>,
        stop_event: Option<EventId>,
    },
    /// Append a line to the thread added last
    AddLine(MissionLine),
    /// Replace line `line_no` (1-based) of `thread`
    ModifyLine {
        thread: ThreadId,
        line_no: u16,
        line: MissionLine,
    },
    /// Raise an event on the controller
    RaiseEvent(EventId),
    /// Begin controlled run
    Start,
    /// End controlled run (raises the all-stop event on the controller)
    Stop,
    /// Subscribe to a data channel
    Subscribe(DataChannel),
    /// Write text to a display row
    Display {
        row: DisplayRow,
        text: heapless::String<64>,
    },
}

impl ControllerCommand {
    /// Display command, truncating text that does not fit the row buffer.
    pub fn display(row: DisplayRow, text: &str) -> Self {
        let mut s = heapless::String::new();
        for c in text.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        ControllerCommand::Display { row, text: s }
    }
}

impl fmt::Display for ControllerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerCommand::Halt => write!(f, "robot stop"),
            ControllerCommand::ClearProgram => write!(f, "robot <clear"),
            ControllerCommand::AddThread {
                thread,
                start_event,
                stop_event,
            } => {
                write!(f, "robot <add thread={}", thread)?;
                if let Some(start) = start_event {
                    write!(f, ",event={}", start)?;
                }
                if let Some(stop) = stop_event {
                    write!(f, " : event={}", stop)?;
                }
                Ok(())
            }
            ControllerCommand::AddLine(line) => write!(f, "robot <add {}", line),
            ControllerCommand::ModifyLine {
                thread,
                line_no,
                line,
            } => write!(f, "<mod {} {} {}", thread, line_no, line),
            ControllerCommand::RaiseEvent(id) => write!(f, "<event={}", id),
            ControllerCommand::Start => write!(f, "start"),
            ControllerCommand::Stop => write!(f, "stop"),
            ControllerCommand::Subscribe(channel) => write!(f, "{} subscribe", channel.name()),
            ControllerCommand::Display { row, text } => write!(f, "oled {} {}", *row as u8, text),
        }
    }
}

/// Write side of the controller link.
///
/// Implementations must deliver commands in call order.
pub trait Controller {
    fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError>;
}

impl<T: Controller + ?Sized> Controller for &mut T {
    fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError> {
        (**self).send(command)
    }
}
