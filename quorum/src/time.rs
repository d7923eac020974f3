use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// Injected time source. The manager never calls `Instant::now()` directly
/// so that tests can drive deadlines deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

/// A poll-style deadline. The quorum layer never schedules wakeups; the
/// engine asks whether the deadline has passed on each of its own ticks.
///
/// A timeout of `Duration::MAX` never expires (the observer election
/// timeout).
#[derive(Clone, Copy, Debug)]
pub struct Timer {
    start: Instant,
    timeout: Duration,
}

impl Timer {
    pub fn new(now: Instant, timeout: Duration) -> Self {
        Self { start: now, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self) -> Option<Instant> {
        self.start.checked_add(self.timeout)
    }

    pub fn expired(&self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.deadline() {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::MAX,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_expiry_and_remaining() {
        let clock = ManualClock::new();
        let timer = Timer::new(clock.now(), Duration::from_millis(100));

        assert!(!timer.expired(clock.now()));
        assert_eq!(Duration::from_millis(100), timer.remaining(clock.now()));

        clock.advance(Duration::from_millis(40));
        assert_eq!(Duration::from_millis(60), timer.remaining(clock.now()));

        clock.advance(Duration::from_millis(60));
        assert!(timer.expired(clock.now()));
        assert_eq!(Duration::ZERO, timer.remaining(clock.now()));
    }

    #[test]
    fn test_infinite_timer_never_expires() {
        let clock = ManualClock::new();
        let timer = Timer::new(clock.now(), Duration::MAX);

        clock.advance(Duration::from_secs(60 * 60 * 24 * 365));
        assert!(!timer.expired(clock.now()));
        assert_eq!(Duration::MAX, timer.remaining(clock.now()));
    }

    #[test]
    fn test_reset_restarts_the_deadline() {
        let clock = ManualClock::new();
        let mut timer = Timer::new(clock.now(), Duration::from_millis(50));

        clock.advance(Duration::from_millis(50));
        assert!(timer.expired(clock.now()));

        timer.reset(clock.now());
        assert!(!timer.expired(clock.now()));
        assert_eq!(Duration::from_millis(50), timer.remaining(clock.now()));
    }
}
