//! Core traits for platform-agnostic mission sequencing.
//!
//! This module provides trait abstractions that decouple the supervisor from
//! the controller link, the perception process and the operator channel.
//!
//! # Design
//!
//! - Trait definitions are pure and have no feature gates
//! - Mock implementations are always available for host testing
//! - Platform implementations live in the host crate

pub mod inputs;
pub mod time;

pub use inputs::{Detection, Heartbeat, ManualOverride, Notifier, Perception, SilentNotifier};
pub use time::{Delay, MockTime, TimeSource};
