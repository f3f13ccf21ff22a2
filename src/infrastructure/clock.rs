use crate::application::ports::clock::Clock;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Wall clock clamped so it never steps backwards, even if the OS clock does.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}

/// Hand-driven clock for tests and replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.fetch_max(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) -> i64 {
        self.now.fetch_add(millis.max(0), Ordering::SeqCst) + millis.max(0)
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let mut previous = clock.now_millis();
        for _ in 0..1_000 {
            let now = clock.now_millis();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn manual_clock_only_moves_forward() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.advance(50), 150);
        clock.set(120);
        assert_eq!(clock.now_millis(), 150);
        clock.set(400);
        assert_eq!(clock.now_millis(), 400);
    }
}
