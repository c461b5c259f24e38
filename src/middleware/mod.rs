//! The outer admission-control stages of the pipeline (spec §4.9), each an
//! actix-web `Transform`/`Service` pair composed around the gateway and
//! admin handlers.
//!
//! - [`trace`] - trace id mint/propagate (C6), outermost layer
//! - [`concurrency`] - global in-flight cap, fail-fast shed (C5)
//! - [`rate_limit`] - per-identity fixed-window admission (C4)

pub mod concurrency;
pub mod rate_limit;
pub mod trace;

pub use concurrency::ConcurrencyMiddleware;
pub use rate_limit::RateLimitMiddleware;
pub use trace::TraceMiddleware;
