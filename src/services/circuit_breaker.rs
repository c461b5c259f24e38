//! Per-backend circuit breaker (C3).
//!
//! A single-threshold, two-state breaker: Closed and Open, no half-open
//! probe-gating state. The first request admitted after `open_until`
//! elapses acts as the implicit probe: if it succeeds the breaker closes,
//! if it fails the cooldown restarts. This trades a small burst of
//! speculative retries at recovery for a much simpler state machine than
//! the three-state design.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{info, warn};
use tokio::sync::RwLock;

/// Per-backend counters. `failure_count` is hot (checked and bumped on
/// every failing attempt) so it lives in an atomic; `open_until` changes
/// far less often and needs a stable `Instant`, so it sits behind a small
/// async lock.
struct Entry {
    failure_count: AtomicU64,
    open_until: RwLock<Option<Instant>>,
}

impl Entry {
    fn new() -> Self {
        Entry {
            failure_count: AtomicU64::new(0),
            open_until: RwLock::new(None),
        }
    }
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u64,
    pub recovery_time: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: 5,
            recovery_time: Duration::from_secs(30),
        }
    }
}

/// Breaker state keyed by backend authority (`host:port`).
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    backends: DashMap<String, Entry>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            config,
            backends: DashMap::new(),
        }
    }

    /// `allow_request → false` while `now < open_until`; once the cooldown
    /// elapses the backend is treated as closed again without a separate
    /// transition step.
    pub async fn allow_request(&self, authority: &str) -> bool {
        let entry = self
            .backends
            .entry(authority.to_string())
            .or_insert_with(Entry::new);
        let open_until = *entry.open_until.read().await;
        match open_until {
            Some(until) if Instant::now() < until => false,
            _ => true,
        }
    }

    /// Resets `failure_count` and clears `open_until`.
    pub async fn record_success(&self, authority: &str) {
        if let Some(entry) = self.backends.get(authority) {
            entry.failure_count.store(0, Ordering::Relaxed);
            *entry.open_until.write().await = None;
        }
    }

    /// Increments `failure_count`; opens the circuit once the threshold is
    /// reached (including when it reopens after a failed probe).
    pub async fn record_failure(&self, authority: &str) {
        let entry = self
            .backends
            .entry(authority.to_string())
            .or_insert_with(Entry::new);
        let failures = entry.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.failure_threshold {
            *entry.open_until.write().await = Some(Instant::now() + self.config.recovery_time);
            warn!("circuit breaker opened for {authority}");
        }
    }

    /// `backend → "open" | "closed"` computed from current time, for the
    /// `/__circuit` admin endpoint.
    pub async fn status(&self) -> std::collections::HashMap<String, String> {
        let mut out = std::collections::HashMap::new();
        for entry in self.backends.iter() {
            let open_until = *entry.open_until.read().await;
            let is_open = matches!(open_until, Some(until) if Instant::now() < until);
            out.insert(
                entry.key().clone(),
                if is_open { "open" } else { "closed" }.to_string(),
            );
        }
        out
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("backends", &self.backends.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_time: Duration::from_millis(50),
        })
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let cb = fast_breaker();
        assert!(cb.allow_request("b").await);
        cb.record_failure("b").await;
        assert!(cb.allow_request("b").await);
        cb.record_failure("b").await;
        assert!(!cb.allow_request("b").await);
    }

    #[tokio::test]
    async fn closes_after_recovery_time_and_success() {
        let cb = fast_breaker();
        cb.record_failure("b").await;
        cb.record_failure("b").await;
        assert!(!cb.allow_request("b").await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cb.allow_request("b").await);
        cb.record_success("b").await;
        assert!(cb.allow_request("b").await);
        assert_eq!(cb.status().await.get("b").unwrap(), "closed");
    }

    #[tokio::test]
    async fn failed_probe_reopens_for_another_cooldown() {
        let cb = fast_breaker();
        cb.record_failure("b").await;
        cb.record_failure("b").await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cb.allow_request("b").await);
        // A single failed probe re-opens the circuit; the count is never
        // reset on open, so one more failure is enough to re-trip it.
        cb.record_failure("b").await;
        assert!(!cb.allow_request("b").await);
    }
}
