//! Virtual time.
//!
//! The scheduler reasons entirely in millisecond timestamps on its own
//! timeline. The reactor is the only component that advances the clock,
//! once per iteration; everything else just reads it. Wall time only
//! enters the picture inside `Reactor::run`, which translates real sleeps
//! into virtual advances.

use serde::Serialize;
use std::fmt;
use std::ops::Add;

/// A millisecond timestamp on the scheduler's virtual timeline.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The start of the timeline.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// Build a timestamp from raw milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        VirtualTime(ms)
    }

    /// The raw millisecond count.
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn saturating_since(self, earlier: VirtualTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u64> for VirtualTime {
    type Output = VirtualTime;

    fn add(self, ms: u64) -> VirtualTime {
        VirtualTime(self.0.saturating_add(ms))
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Monotonically non-decreasing clock, advanced once per reactor
/// iteration.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: VirtualTime,
}

impl VirtualClock {
    /// A clock at `VirtualTime::ZERO`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Move the clock forward by `ms` and return the new reading.
    pub fn advance(&mut self, ms: u64) -> VirtualTime {
        self.now = self.now + ms;
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), VirtualTime::ZERO);
    }

    #[test]
    fn test_advance_is_cumulative() {
        let mut clock = VirtualClock::new();
        clock.advance(100);
        clock.advance(250);
        assert_eq!(clock.now().as_millis(), 350);
    }

    #[test]
    fn test_saturating_since() {
        let early = VirtualTime::from_millis(100);
        let late = VirtualTime::from_millis(450);
        assert_eq!(late.saturating_since(early), 350);
        assert_eq!(early.saturating_since(late), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(VirtualTime::from_millis(1500).to_string(), "1500ms");
    }
}
