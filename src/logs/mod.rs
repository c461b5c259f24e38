//! Logging configuration: a single `env_logger` formatter the binary
//! installs once at startup.
//!
//! - [`logger`] - formatter, color handling, `RUST_LOG`/`NO_COLOR` wiring

pub mod logger;
