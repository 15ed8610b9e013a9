//! Consensus time sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Monotonic counter; every reading advances by `step` nanoseconds.
#[derive(Debug)]
pub struct LogicalClock {
    current: AtomicU64,
    step: u64,
}

impl LogicalClock {
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            current: AtomicU64::new(start),
            step: step.max(1),
        }
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl Clock for LogicalClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.current.fetch_add(self.step, Ordering::SeqCst) + self.step)
    }
}

/// Wall-clock nanoseconds since the unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Timestamp(nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_clock_is_strictly_increasing() {
        let clock = LogicalClock::new(100, 10);
        let a = clock.now();
        let b = clock.now();
        assert_eq!(a, Timestamp(110));
        assert_eq!(b, Timestamp(120));
    }

    #[test]
    fn test_zero_step_still_advances() {
        let clock = LogicalClock::new(0, 0);
        assert!(clock.now() < clock.now());
    }
}
