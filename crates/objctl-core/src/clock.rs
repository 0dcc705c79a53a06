//! Time source.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Clock reading in seconds.  Implementations should never go backwards, but
/// the timer registry tolerates one that does.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Seconds since the UNIX epoch, sampled once at construction and advanced
/// with a monotonic [`Instant`] afterwards, so wall-clock steps (NTP, manual
/// `date` changes) never move it backwards.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch_at_start: f64,
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch_at_start: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch_at_start + self.start.elapsed().as_secs_f64()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn system_clock_is_past_2020_and_non_decreasing() {
        let clock = SystemClock::new();
        let mut last = clock.now();
        assert!(last > 1_577_836_800.0);
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn system_clock_advances_with_elapsed_time() {
        let clock = SystemClock::new();
        let before = clock.now();
        thread::sleep(Duration::from_millis(20));
        assert!(clock.now() - before >= 0.02);
    }
}
