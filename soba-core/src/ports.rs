//! Capability traits threaded through the scheduler so its dependencies
//! can be swapped for fakes in tests — the "explicit capability interface"
//! replacement for dynamic dispatch / duck typing called out in SPEC_FULL.md.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of the current time. Production uses `Utc::now`; tests supply a
/// fixed or stepped clock so status-file and integrity-checker assertions
/// don't depend on wall time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suspension point abstraction for the scheduler's `sleep(poll_interval)`
/// and the tmux command-delay pause. Tests use a no-op or recording
/// sleeper so suites don't actually block.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps for real via `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn fixed_clock_is_stable() {
        let t = Utc::now();
        let clock = FixedClock(t);
        assert_eq!(clock.now(), t);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now();
        assert!(b >= a);
    }
}
