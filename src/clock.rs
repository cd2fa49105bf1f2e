//! Wall-clock time source for the host.

use std::thread;
use std::time::Duration;

use chrono::Utc;
use robobot_mission_core::traits::{Delay, TimeSource};

/// Milliseconds since the Unix epoch; delays sleep the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for WallClock {
    fn now_ms(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

impl Delay for WallClock {
    fn delay_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_advances_clock() {
        let clock = WallClock::new();
        let start = clock.now_ms();
        clock.delay_ms(5);
        assert!(clock.elapsed_ms_since(start) >= 5);
    }
}
