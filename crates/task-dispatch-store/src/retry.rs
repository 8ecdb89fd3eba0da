use rand::Rng;
use std::time::Duration;

/// Exponential backoff with multiplicative jitter for store reconnects.
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Backoff {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait before the next attempt; doubles up to `max`.
    pub fn next_delay(&mut self) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        let delay = self.current.mul_f64(jitter);
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Call after a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
