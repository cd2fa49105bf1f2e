//! Core host infrastructure
//!
//! Logging setup and the per-run mission log file.

pub mod logging;
pub mod mission_log;
