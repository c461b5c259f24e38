//! Service layer: the per-stage collaborators the gateway pipeline
//! composes (C1–C8 besides the route table and trace context, which live
//! in `models`).
//!
//! - [`header_rewrite`] - header policy application (C2)
//! - [`circuit_breaker`] - per-backend failure tracking (C3)
//! - [`rate_limiter`] - the `RateLimiter` trait and its local implementation (C4)
//! - [`redis_rate_limiter`] - the shared, Redis-backed implementation (C4)
//! - [`concurrency_limiter`] - the global in-flight cap (C5)
//! - [`metrics`] - the Prometheus registry (C7)
//! - [`forwarder`] - the retrying backend client (C8)

pub mod circuit_breaker;
pub mod concurrency_limiter;
pub mod forwarder;
pub mod header_rewrite;
pub mod metrics;
pub mod rate_limiter;
pub mod redis_rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use concurrency_limiter::ConcurrencyLimiter;
pub use forwarder::{ForwardParams, ForwardedResponse, Forwarder};
pub use rate_limiter::{Decision, LocalRateLimiter, RateLimiter};
pub use redis_rate_limiter::RedisRateLimiter;
