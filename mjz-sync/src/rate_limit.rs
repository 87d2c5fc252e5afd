//! Minimum spacing between outbound requests

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Rate limiter enforcing a minimum interval between requests
pub(crate) struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    pub(crate) async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(250);
        assert_eq!(limiter.min_interval, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_second_request_waits() {
        let limiter = RateLimiter::new(200);
        let start = Instant::now();

        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));

        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_no_wait_after_interval_elapsed() {
        let limiter = RateLimiter::new(50);

        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let before = Instant::now();
        limiter.wait().await;
        assert!(before.elapsed() < Duration::from_millis(40));
    }
}
