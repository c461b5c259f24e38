//! Gateway-wide settings: the tunables every pipeline stage falls back to
//! when a route supplies no override, plus the bind address and the
//! external collaborators (config path, Redis) the embedding host wires up.
//!
//! Unlike the route table, these are not hot-reloadable; they are read once
//! at startup from the environment, the way the teacher's own
//! `KAIROS_HOST`/`KAIROS_PORT` pair is.

use std::time::Duration;

/// Gateway identity stamped onto the default header policy's `x-gateway`
/// value and logged at startup.
pub const GATEWAY_ID: &str = "my-api-gateway";

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    /// Path the admin `/__reload` endpoint's `FileRouteTableLoader` reads
    /// from; also the file loaded once at startup.
    pub config_path: String,

    pub max_concurrent: usize,

    pub rate_limit: u64,
    pub rate_window: Duration,

    pub circuit_failure_threshold: u64,
    pub circuit_recovery_time: Duration,

    pub default_retries: u32,
    pub default_retry_delay: Duration,
    pub default_timeout: Duration,

    pub redis_host: Option<String>,
    pub redis_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "0.0.0.0".to_string(),
            port: 8080,
            config_path: "config.json".to_string(),
            max_concurrent: 100,
            rate_limit: 5,
            rate_window: Duration::from_secs(10),
            circuit_failure_threshold: 5,
            circuit_recovery_time: Duration::from_secs(30),
            default_retries: 2,
            default_retry_delay: Duration::from_millis(100),
            default_timeout: Duration::from_secs(5),
            redis_host: None,
            redis_port: 6379,
        }
    }
}

impl Settings {
    /// Builds settings from the process environment, falling back to the
    /// original implementation's defaults (5 requests/10s, 100 concurrent,
    /// 2 retries at a 0.1s flat delay, 5s timeout) for anything unset.
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Settings {
            host: env_or("GATEWAY_HOST", defaults.host),
            port: env_parsed("GATEWAY_PORT", defaults.port),
            config_path: env_or("GATEWAY_CONFIG_PATH", defaults.config_path),
            max_concurrent: env_parsed("GATEWAY_MAX_CONCURRENT", defaults.max_concurrent),
            rate_limit: env_parsed("GATEWAY_RATE_LIMIT", defaults.rate_limit),
            rate_window: Duration::from_secs(env_parsed(
                "GATEWAY_RATE_WINDOW_SECONDS",
                defaults.rate_window.as_secs(),
            )),
            circuit_failure_threshold: env_parsed(
                "GATEWAY_CIRCUIT_FAILURE_THRESHOLD",
                defaults.circuit_failure_threshold,
            ),
            circuit_recovery_time: Duration::from_secs_f64(env_parsed(
                "GATEWAY_CIRCUIT_RECOVERY_SECONDS",
                defaults.circuit_recovery_time.as_secs_f64(),
            )),
            default_retries: env_parsed("GATEWAY_DEFAULT_RETRIES", defaults.default_retries),
            default_retry_delay: Duration::from_secs_f64(env_parsed(
                "GATEWAY_DEFAULT_RETRY_DELAY_SECONDS",
                defaults.default_retry_delay.as_secs_f64(),
            )),
            default_timeout: Duration::from_secs_f64(env_parsed(
                "GATEWAY_DEFAULT_TIMEOUT_SECONDS",
                defaults.default_timeout.as_secs_f64(),
            )),
            redis_host: std::env::var("REDIS_HOST").ok().filter(|s| !s.is_empty()),
            redis_port: env_parsed("REDIS_PORT", defaults.redis_port),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
