//! Per-stream request pacing
//!
//! Every logical stream (the comment stream, and each reply stream) owns its
//! own limiter, so the delay applies between consecutive requests of that
//! stream only. Streams running side by side do not slow each other down.

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a fixed minimum delay between consecutive requests
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Calculates the time until the next request may be sent
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.delay {
            Some(self.delay - elapsed)
        } else {
            None
        }
    }

    /// Waits until the next request is allowed and records it as sent
    pub async fn until_ready(&mut self) {
        if let Some(wait) = self.time_until_ready(Instant::now()) {
            tracing::trace!("Rate limiter sleeping for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        self.last_request = Some(Instant::now());
    }
}
