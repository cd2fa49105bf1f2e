//! Published bridge state.
//!
//! The transport thread injects what the controller reports (events,
//! heartbeats, the gamepad override) and the perception worker serves
//! detection requests. The mission worker reads the same state through the
//! core input traits. Every read is a snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use robobot_mission_core::event::{EventFlags, EventGate, EventId};
use robobot_mission_core::traits::{Detection, Heartbeat, ManualOverride, Perception};

/// Thread-safe inputs shared between producers and the mission worker.
///
/// Wrap in an `Arc` and hand clones to each producer.
pub struct BridgeState {
    events: EventFlags,
    last_heartbeat: Mutex<Option<Instant>>,
    heartbeat_timeout: Duration,
    manual: AtomicBool,
    /// Set by the mission, cleared when a result is published
    detection_requested: AtomicBool,
    /// Set once a perception worker has taken the request
    detection_claimed: AtomicBool,
    detection: Mutex<Detection>,
}

impl BridgeState {
    /// Heartbeats older than `heartbeat_timeout` do not count.
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            events: EventFlags::new(),
            last_heartbeat: Mutex::new(None),
            heartbeat_timeout,
            manual: AtomicBool::new(false),
            detection_requested: AtomicBool::new(false),
            detection_claimed: AtomicBool::new(false),
            detection: Mutex::new(Detection::none()),
        }
    }

    // ========================================================================
    // Producer API
    // ========================================================================

    /// Record an event reported by the controller.
    pub fn raise_event(&self, id: EventId) {
        self.events.raise(id);
    }

    /// Record a heartbeat received now.
    pub fn heartbeat(&self) {
        *self
            .last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Instant::now());
    }

    /// Gamepad manual-control switch.
    pub fn set_manual(&self, active: bool) {
        self.manual.store(active, Ordering::Release);
    }

    /// Claim a pending detection request. Returns true once per request.
    pub fn take_detection_request(&self) -> bool {
        self.detection_requested.load(Ordering::Acquire)
            && self
                .detection_claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Publish a result and clear the request.
    pub fn publish_detection(&self, detection: Detection) {
        *self.detection.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = detection;
        self.detection_claimed.store(false, Ordering::Release);
        self.detection_requested.store(false, Ordering::Release);
    }

    /// Peek at an event without consuming it.
    pub fn event_pending(&self, id: EventId) -> bool {
        self.events.pending(id)
    }
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl EventGate for BridgeState {
    fn is_set(&self, id: EventId) -> bool {
        self.events.is_set(id)
    }

    fn clear_all(&self) {
        self.events.clear_all();
    }
}

impl Heartbeat for BridgeState {
    fn is_alive(&self) -> bool {
        self.last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some_and(|at| at.elapsed() <= self.heartbeat_timeout)
    }
}

impl ManualOverride for BridgeState {
    fn is_active(&self) -> bool {
        self.manual.load(Ordering::Acquire)
    }
}

impl Perception for BridgeState {
    fn request_detection(&self) {
        self.detection_claimed.store(false, Ordering::Release);
        self.detection_requested.store(true, Ordering::Release);
    }

    fn detection_pending(&self) -> bool {
        self.detection_requested.load(Ordering::Acquire)
    }

    fn latest(&self) -> Detection {
        *self.detection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_events_clear_on_read() {
        let state = BridgeState::default();
        state.raise_event(33);
        assert!(state.event_pending(33));
        assert!(state.is_set(33));
        assert!(!state.is_set(33));
    }

    #[test]
    fn test_heartbeat_expires() {
        let state = BridgeState::new(Duration::from_millis(20));
        assert!(!state.is_alive());
        state.heartbeat();
        assert!(state.is_alive());
        thread::sleep(Duration::from_millis(40));
        assert!(!state.is_alive());
    }

    #[test]
    fn test_detection_request_cycle() {
        let state = BridgeState::default();
        assert!(!state.take_detection_request());

        state.request_detection();
        assert!(state.detection_pending());
        assert!(state.take_detection_request());
        assert!(!state.take_detection_request());
        assert!(state.detection_pending());

        state.publish_detection(Detection::found(450.0, 12.0));
        assert!(!state.detection_pending());
        assert_eq!(state.latest(), Detection::found(450.0, 12.0));
    }

    #[test]
    fn test_producers_on_other_threads() {
        let state = Arc::new(BridgeState::default());
        let producer = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                state.heartbeat();
                state.set_manual(true);
                state.raise_event(1);
            })
        };
        producer.join().unwrap();

        assert!(state.is_alive());
        assert!(state.is_active());
        assert!(state.is_set(1));
    }
}
