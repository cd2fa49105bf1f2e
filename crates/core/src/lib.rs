//! robobot_mission_core - Pure no_std mission sequencing for a REGBOT robot
//!
//! This crate contains the platform-agnostic mission logic: event gate,
//! mission line composition, double-buffered slot execution, phase state
//! machines and the supervisor loop. It runs on the host against mocks without
//! any feature flags.
//!
//! # Design Principles
//!
//! - **Zero cfg**: No `#[cfg(feature = ...)]` directives
//! - **no_std + alloc**: Bounded buffers come from `heapless`; only the phase
//!   registry allocates
//! - **Trait abstractions**: Controller link, time, perception, heartbeat,
//!   manual override and operator feedback are injected
//!
//! # Modules
//!
//! - [`event`]: Clear-on-read event flags
//! - [`snippet`]: Mission lines and bounded snippet buffers
//! - [`controller`]: Typed controller commands and the link trait
//! - [`slot`]: Double-buffered slot executor
//! - [`phase`]: Phase trait, registry and the pickup/marker/finish phases
//! - [`supervisor`]: Mission supervisor loop
//! - [`traits`]: Time and collaborator traits
//! - [`mock`]: Recording and scripted collaborators for tests

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod controller;
pub mod event;
pub mod mock;
pub mod phase;
pub mod slot;
pub mod snippet;
pub mod supervisor;
pub mod traits;
