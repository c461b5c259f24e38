//! Shared, Redis-backed fixed-window rate limiter (C4, shared variant).
//!
//! The decision is made atomically per identity by a single server-side Lua
//! script: trim entries older than the window, count what's left, and
//! either admit (recording the new timestamp) or reject (returning the
//! remaining TTL in milliseconds). `redis::Script::invoke_async` calls by
//! SHA and falls back to a full `EVAL` transparently on `NOSCRIPT` (e.g.
//! after a Redis restart flushed the script cache), so no retry loop is
//! needed here.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::rate_limiter::{Decision, RateLimiter};

const LUA_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call("ZREMRANGEBYSCORE", key, "-inf", now - window)

local count = redis.call("ZCARD", key)
if count >= limit then
  local ttl = redis.call("PTTL", key)
  return ttl
end

redis.call("ZADD", key, now, now)
redis.call("PEXPIRE", key, window)
return 0
"#;

pub struct RedisRateLimiter {
    conn: ConnectionManager,
    script: Script,
    limit: u64,
    window_ms: i64,
}

impl RedisRateLimiter {
    pub fn new(conn: ConnectionManager, limit: u64, window_ms: i64) -> Self {
        RedisRateLimiter {
            conn,
            script: Script::new(LUA_SCRIPT),
            limit,
            window_ms,
        }
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as i64
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, identity: &str) -> Decision {
        let mut conn = self.conn.clone();
        let now = Self::now_ms();

        let ttl_ms: i64 = match self
            .script
            .key(identity)
            .arg(now)
            .arg(self.window_ms)
            .arg(self.limit as i64)
            .invoke_async(&mut conn)
            .await
        {
            Ok(ttl) => ttl,
            Err(e) => {
                log::error!("redis rate limiter script failed for {identity}: {e}");
                // Fail open: a store outage must not take the gateway down.
                return Decision {
                    admitted: true,
                    retry_after_seconds: 0,
                };
            }
        };

        if ttl_ms > 0 {
            Decision {
                admitted: false,
                retry_after_seconds: ((ttl_ms + 999) / 1000) as u64,
            }
        } else {
            Decision {
                admitted: true,
                retry_after_seconds: 0,
            }
        }
    }

    async fn remaining(&self, identity: &str) -> u64 {
        let mut conn = self.conn.clone();
        let now = Self::now_ms();
        let floor = now - self.window_ms;
        let _: Result<i64, _> = conn.zrembyscore(identity, "-inf", floor).await;
        let count: i64 = conn.zcard(identity).await.unwrap_or(0);
        (self.limit as i64 - count).max(0) as u64
    }

    fn limit(&self) -> u64 {
        self.limit
    }
}
