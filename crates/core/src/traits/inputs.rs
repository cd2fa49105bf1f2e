//! Collaborator traits read by the supervisor and the phases.
//!
//! Every implementation is owned by another execution context (the transport
//! thread, the perception process, the operator gamepad). The core only takes
//! snapshots through `&self`; two reads in the same tick may disagree.

/// Result published by the perception collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Detection {
    /// Object found in the last analysed frame
    pub detected: bool,
    /// Distance to the object in millimetres
    pub distance_mm: f32,
    /// Bearing to the object in degrees, positive to the left
    pub angle_deg: f32,
    /// Marker or class identity, if the detector reports one
    pub identity: Option<u32>,
}

impl Detection {
    /// A positive detection at the given distance and bearing.
    pub const fn found(distance_mm: f32, angle_deg: f32) -> Self {
        Self {
            detected: true,
            distance_mm,
            angle_deg,
            identity: None,
        }
    }

    /// No object in view.
    pub const fn none() -> Self {
        Self {
            detected: false,
            distance_mm: 0.0,
            angle_deg: 0.0,
            identity: None,
        }
    }

    /// True when the detection is positive, closer than `max_mm` and its
    /// bearing is a finite angle within ±180°.
    ///
    /// NaN fails every comparison, so garbage from the detector reads as no
    /// detection.
    pub fn within(&self, max_mm: f32) -> bool {
        self.detected
            && self.distance_mm > 0.0
            && self.distance_mm < max_mm
            && self.angle_deg >= -180.0
            && self.angle_deg <= 180.0
    }
}

/// Asynchronous detection request/response channel.
///
/// Protocol: call [`request_detection`](Perception::request_detection), poll
/// [`detection_pending`](Perception::detection_pending) on later ticks until it
/// reads false, then read [`latest`](Perception::latest).
pub trait Perception {
    /// Raise the "start detection" flag.
    fn request_detection(&self);

    /// True while the last request has not been served.
    fn detection_pending(&self) -> bool;

    /// Most recently published result.
    fn latest(&self) -> Detection;
}

/// Operator takeover signal (gamepad).
pub trait ManualOverride {
    /// True while the operator holds manual control.
    fn is_active(&self) -> bool;
}

/// Controller liveness.
pub trait Heartbeat {
    /// True if a heartbeat arrived recently enough to trust the link.
    fn is_alive(&self) -> bool;
}

/// Operator feedback: spoken announcements and the on-robot display.
///
/// Purely presentational; no control decision depends on it.
pub trait Notifier {
    /// Short spoken message.
    fn announce(&self, text: &str);

    /// Status line for the robot display.
    fn display(&self, text: &str);
}

/// Notifier that drops everything, for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn announce(&self, _text: &str) {}

    fn display(&self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_within_range() {
        assert!(Detection::found(450.0, 12.0).within(1100.0));
        assert!(!Detection::found(1100.0, 0.0).within(1100.0));
        assert!(!Detection::found(0.0, 0.0).within(1100.0));
        assert!(!Detection::found(-5.0, 0.0).within(1100.0));
    }

    #[test]
    fn test_detection_rejects_garbage() {
        assert!(!Detection::found(f32::NAN, 0.0).within(1100.0));
        assert!(!Detection::found(f32::INFINITY, 0.0).within(f32::INFINITY));
        assert!(!Detection::found(1.0e35, 0.0).within(3000.0));
        assert!(!Detection::found(450.0, f32::NAN).within(1100.0));
        assert!(!Detection::found(450.0, 720.0).within(1100.0));
        assert!(Detection::found(450.0, -180.0).within(1100.0));
    }

    #[test]
    fn test_detection_none_is_never_within() {
        let mut d = Detection::none();
        d.distance_mm = 300.0;
        assert!(!d.within(1100.0));
    }
}
