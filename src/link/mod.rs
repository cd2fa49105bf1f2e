//! Controller link for the host.
//!
//! - [`BridgeState`]: inputs published by the transport and perception
//!   threads, read by the mission worker
//! - [`TextLink`]: [`Controller`](robobot_mission_core::controller::Controller)
//!   writing one text command per line

pub mod bridge_state;
pub mod text;

pub use bridge_state::BridgeState;
pub use text::TextLink;
