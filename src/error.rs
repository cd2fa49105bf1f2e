use robobot_mission_core::controller::LinkError;
use robobot_mission_core::supervisor::MissionError;

use crate::config::ConfigError;

/// Errors from setting up or running a mission on the host.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mission aborted: {0}")]
    Mission(MissionError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mission worker panicked")]
    WorkerPanic,
}

impl From<MissionError> for RuntimeError {
    fn from(e: MissionError) -> Self {
        RuntimeError::Mission(e)
    }
}

impl From<LinkError> for RuntimeError {
    fn from(e: LinkError) -> Self {
        RuntimeError::Mission(MissionError::Link(e))
    }
}
