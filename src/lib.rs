//! robobot_mission - Host-side mission sequencer for a REGBOT motion controller
//!
//! Wires the pure mission logic of [`robobot_mission_core`] to the host: TOML
//! configuration, tracing-based logging, the mission log file, the text
//! controller link, thread-safe published inputs and the worker thread that
//! runs the supervisor.

pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod link;
pub mod notifier;
pub mod runtime;

#[doc(hidden)]
pub use tracing as __tracing;

pub use config::{ConfigError, MissionConfig, PhaseKind};
pub use error::RuntimeError;
pub use link::{BridgeState, TextLink};
pub use runtime::MissionRuntime;

pub use robobot_mission_core as mission;
