use std::sync::atomic::{AtomicI64, Ordering};

/// Source of server-assigned timestamps (Unix ms).
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock that never goes backwards: if the system time steps back,
/// the last value handed out is repeated until time catches up.
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
    fn now_ms(&self) -> i64 {
        let now = relay_api::now_ms();
        let prev = self.last.fetch_max(now, Ordering::AcqRel);
        prev.max(now)
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self { now: AtomicI64::new(start_ms) }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::Release);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let mut prev = clock.now_ms();
        for _ in 0..1000 {
            let now = clock.now_ms();
            assert!(now >= prev);
            prev = now;
        }
    }

    #[test]
    fn test_system_clock_holds_after_step_back() {
        let clock = SystemClock::new();
        let future = relay_api::now_ms() + 60_000;
        clock.last.store(future, Ordering::Release);
        assert_eq!(clock.now_ms(), future);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(3);
        assert_eq!(clock.now_ms(), 3);
    }
}
