//! Time abstraction traits for platform-agnostic timing operations.
//!
//! The supervisor loop and the slot executor never sleep directly. They read
//! time through [`TimeSource`] and block through [`Delay`], so the same code
//! runs against a wall clock on the host and against [`MockTime`] in tests.

use core::cell::Cell;

/// Monotonic time source for the supervisor loop.
///
/// # Example
///
/// ```
/// use robobot_mission_core::traits::{MockTime, TimeSource};
///
/// fn overdue<T: TimeSource>(time: &T, since_ms: u64, budget_ms: u64) -> bool {
///     time.elapsed_ms_since(since_ms) > budget_ms
/// }
///
/// let time = MockTime::new();
/// time.advance_ms(30);
/// assert!(overdue(&time, 0, 20));
/// ```
pub trait TimeSource: Clone {
    /// Returns current time in milliseconds since an arbitrary epoch.
    fn now_ms(&self) -> u64;

    /// Returns elapsed milliseconds since a reference point.
    ///
    /// Uses saturating subtraction to handle a reference in the future.
    fn elapsed_ms_since(&self, reference_ms: u64) -> u64 {
        self.now_ms().saturating_sub(reference_ms)
    }
}

/// Blocking delay used for the poll interval and the upload settle time.
pub trait Delay {
    /// Block the calling context for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
}

// ============================================================================
// Mock Implementation (always available for testing)
// ============================================================================

/// Mock time source whose delays advance the clock instead of sleeping.
///
/// Clones share the same clock, so a [`SlotExecutor`](crate::slot::SlotExecutor)
/// and a [`MissionSupervisor`](crate::supervisor::MissionSupervisor) built from
/// the same `MockTime` observe each other's delays.
///
/// # Example
///
/// ```
/// use robobot_mission_core::traits::{Delay, MockTime, TimeSource};
///
/// let time = MockTime::new();
/// let other = time.clone();
/// other.delay_ms(10);
/// assert_eq!(time.now_ms(), 10);
/// assert_eq!(time.total_delay_ms(), 10);
/// ```
#[derive(Clone, Default)]
pub struct MockTime {
    inner: alloc::rc::Rc<MockClock>,
}

#[derive(Default)]
struct MockClock {
    current_ms: Cell<u64>,
    delayed_ms: Cell<u64>,
    delay_calls: Cell<u32>,
}

impl MockTime {
    /// Creates a new `MockTime` starting at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `MockTime` starting at the specified time.
    pub fn with_initial_ms(ms: u64) -> Self {
        let time = Self::new();
        time.set_ms(ms);
        time
    }

    /// Sets the current time to an absolute value.
    pub fn set_ms(&self, ms: u64) {
        self.inner.current_ms.set(ms);
    }

    /// Advances the current time without recording a delay.
    pub fn advance_ms(&self, ms: u64) {
        self.inner.current_ms.set(self.inner.current_ms.get() + ms);
    }

    /// Total milliseconds spent in [`Delay::delay_ms`] across all clones.
    pub fn total_delay_ms(&self) -> u64 {
        self.inner.delayed_ms.get()
    }

    /// Number of [`Delay::delay_ms`] calls across all clones.
    pub fn delay_calls(&self) -> u32 {
        self.inner.delay_calls.get()
    }
}

impl TimeSource for MockTime {
    fn now_ms(&self) -> u64 {
        self.inner.current_ms.get()
    }
}

impl Delay for MockTime {
    fn delay_ms(&self, ms: u32) {
        self.advance_ms(u64::from(ms));
        self.inner
            .delayed_ms
            .set(self.inner.delayed_ms.get() + u64::from(ms));
        self.inner.delay_calls.set(self.inner.delay_calls.get() + 1);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
