//! Per-peer token bucket: default 100 messages per 10 seconds. A peer that
//! exceeds the bucket is disconnected and blacklisted for a cool-down
//! window by the caller (see [`crate::peer`]); this module only tracks
//! whether the next message is still within budget.

use std::time::{Duration, Instant};

pub struct RateLimiter {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = capacity as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            last_refill: Instant::now(),
        }
    }

    pub fn default_bucket() -> Self {
        Self::new(100, Duration::from_secs(10))
    }

    /// Consumes one token if available, refilling first for elapsed time.
    /// Returns `false` if the bucket is empty.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_and_drains() {
        let mut bucket = RateLimiter::new(3, Duration::from_secs(10));
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let mut bucket = RateLimiter::new(1, Duration::from_millis(20));
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(25));
        assert!(bucket.try_acquire());
    }
}
