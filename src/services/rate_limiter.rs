//! Rate limiter (C4): a fixed-window admission decision shared by two
//! interchangeable backends, an in-process map and a Redis-backed shared
//! store (`redis_rate_limiter`). Callers depend only on this trait.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// The outcome of an admission check: whether the request is admitted, and
/// if not, how many seconds the caller should wait before retrying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub admitted: bool,
    pub retry_after_seconds: u64,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, identity: &str) -> Decision;
    async fn remaining(&self, identity: &str) -> u64;
    fn limit(&self) -> u64;
}

struct Bucket {
    window_start: Instant,
    count: u64,
}

/// Local, process-private fixed window. Each identity has a bucket
/// `(window_start, count)`; admission lazily rotates the bucket when the
/// window has elapsed rather than on a background timer.
pub struct LocalRateLimiter {
    limit: u64,
    window: Duration,
    buckets: DashMap<String, Bucket>,
}

impl LocalRateLimiter {
    pub fn new(limit: u64, window: Duration) -> Self {
        LocalRateLimiter {
            limit,
            window,
            buckets: DashMap::new(),
        }
    }
}

#[async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn allow(&self, identity: &str) -> Decision {
        let now = Instant::now();
        let mut entry = self.buckets.entry(identity.to_string()).or_insert_with(|| Bucket {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 1;
            return Decision {
                admitted: true,
                retry_after_seconds: 0,
            };
        }

        if entry.count < self.limit {
            entry.count += 1;
            return Decision {
                admitted: true,
                retry_after_seconds: 0,
            };
        }

        let elapsed = now.duration_since(entry.window_start);
        let remaining = self.window.saturating_sub(elapsed);
        Decision {
            admitted: false,
            retry_after_seconds: remaining.as_secs().max(if remaining.subsec_nanos() > 0 { 1 } else { 0 }),
        }
    }

    async fn remaining(&self, identity: &str) -> u64 {
        let now = Instant::now();
        match self.buckets.get(identity) {
            Some(bucket) if now.duration_since(bucket.window_start) < self.window => {
                self.limit.saturating_sub(bucket.count)
            }
            _ => self.limit,
        }
    }

    fn limit(&self) -> u64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_limit_then_rejects() {
        let limiter = LocalRateLimiter::new(3, Duration::from_secs(1));
        assert!(limiter.allow("ip:/path").await.admitted);
        assert!(limiter.allow("ip:/path").await.admitted);
        assert!(limiter.allow("ip:/path").await.admitted);
        let decision = limiter.allow("ip:/path").await;
        assert!(!decision.admitted);
        assert!(decision.retry_after_seconds >= 1);
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let limiter = LocalRateLimiter::new(3, Duration::from_secs(1));
        assert_eq!(limiter.remaining("k").await, 3);
        limiter.allow("k").await;
        assert_eq!(limiter.remaining("k").await, 2);
        limiter.allow("k").await;
        assert_eq!(limiter.remaining("k").await, 1);
    }

    #[tokio::test]
    async fn window_rotates_after_elapsed() {
        let limiter = LocalRateLimiter::new(1, Duration::from_millis(30));
        assert!(limiter.allow("k").await.admitted);
        assert!(!limiter.allow("k").await.admitted);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.allow("k").await.admitted);
    }

    #[tokio::test]
    async fn identities_are_independent() {
        let limiter = LocalRateLimiter::new(1, Duration::from_secs(1));
        assert!(limiter.allow("a").await.admitted);
        assert!(limiter.allow("b").await.admitted);
        assert!(!limiter.allow("a").await.admitted);
    }
}
