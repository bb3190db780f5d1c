//! Inbound rate limiting.
//!
//! A classic token bucket: the bucket holds up to `capacity` tokens, one
//! token is added every `refill` interval, and every inbound frame costs
//! one token. When the bucket is empty the reader *waits* for the next
//! token instead of dropping the frame or disconnecting. Abusive clients
//! are slowed down, not kicked.

use std::time::Duration;

use tokio::time::Instant;

/// A token bucket with fractional refill.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last: Instant,
}

impl TokenBucket {
    /// Creates a full bucket holding `capacity` tokens, refilled at one
    /// token per `refill`.
    ///
    /// Returns `None` when either value is zero, which disables limiting.
    pub fn new(capacity: u32, refill: Duration) -> Option<Self> {
        if capacity == 0 || refill.is_zero() {
            return None;
        }
        Some(Self {
            capacity: f64::from(capacity),
            tokens: f64::from(capacity),
            refill_per_sec: 1.0 / refill.as_secs_f64(),
            last: Instant::now(),
        })
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens =
                (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last = now;
        }
    }

    /// Takes a token if one is available right now.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Takes a token, sleeping until one is available.
    pub async fn acquire(&mut self) {
        while !self.try_acquire() {
            let missing = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64(missing / self.refill_per_sec);
            // Never spin on float rounding.
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_zero_capacity_or_refill_disables_limiting() {
        assert!(TokenBucket::new(0, Duration::from_secs(5)).is_none());
        assert!(TokenBucket::new(1, Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_burst_then_empty() {
        let mut bucket = TokenBucket::new(2, Duration::from_secs(5)).unwrap();
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_refills_over_time() {
        let mut bucket = TokenBucket::new(1, Duration::from_secs(5)).unwrap();
        assert!(bucket.try_acquire());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!bucket.try_acquire());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_never_exceeds_capacity() {
        let mut bucket = TokenBucket::new(2, Duration::from_secs(1)).unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_next_token() {
        let mut bucket = TokenBucket::new(1, Duration::from_secs(5)).unwrap();
        let start = Instant::now();

        bucket.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));

        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
