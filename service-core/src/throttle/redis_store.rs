//! Redis-backed counter store shared by every service instance.

use super::store::CounterStore;
use async_trait::async_trait;
use redis::{Client, Script, aio::ConnectionManager};
use std::time::Duration;

/// Increment and attach the window TTL in one server-side step. The TTL is
/// only set when the key is new (or somehow lost its TTL), so a window is
/// never extended by later hits.
const INCREMENT_WITH_EXPIRY: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 or redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
    increment: Script,
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis counter store");
        let client = Client::open(url)?;

        // ConnectionManager reconnects transparently after drops
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            manager,
            increment: Script::new(INCREMENT_WITH_EXPIRY),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get_count(&self, key: &str) -> Result<Option<u64>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read counter {}: {}", key, e))
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<u64, anyhow::Error> {
        let mut conn = self.manager.clone();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        self.increment
            .key(key)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to increment counter {}: {}", key, e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}
