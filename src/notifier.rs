//! Operator feedback through the log.
//!
//! Headless hosts have no speaker; announcements and display lines are logged
//! so an operator tailing the log sees what the robot would say.

use robobot_mission_core::traits::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn announce(&self, text: &str) {
        crate::log_info!(target: "robobot_mission::announce", "{}", text);
    }

    fn display(&self, text: &str) {
        crate::log_debug!(target: "robobot_mission::display", "{}", text);
    }
}
