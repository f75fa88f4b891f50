//! Fixed-window request throttle backed by a shared counter store.
//!
//! Each client identity gets one counter per window, keyed
//! `{prefix}{identity}:{window_epoch}`. A request is admitted while the
//! counter is below the limit. The increment and its TTL are applied by the
//! store in one atomic step, and admission is decided on the count that step
//! returns, so concurrent requests (from any number of instances) can never
//! push more than `limit` admissions into a single window.
//!
//! Up to `2 * limit` requests can pass across a window boundary; that is the
//! accepted cost of the fixed-window algorithm.

pub mod redis_store;
pub mod store;

pub use redis_store::RedisCounterStore;
pub use store::{CounterStore, InMemoryCounterStore};

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Throttle limits and store settings.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub limit: u32,
    pub window: Duration,
    pub key_prefix: String,
    pub store_timeout: Duration,
    /// Key clients by the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header; otherwise clients pick their own key.
    pub trust_forwarded_for: bool,
}

impl ThrottleConfig {
    pub fn new(limit: u32, window: Duration) -> Result<Self, ThrottleError> {
        if limit == 0 {
            return Err(ThrottleError::InvalidConfig(
                "limit must be a positive integer".to_string(),
            ));
        }
        if window.as_millis() == 0 {
            return Err(ThrottleError::InvalidConfig(
                "window must be at least one millisecond".to_string(),
            ));
        }

        Ok(Self {
            limit,
            window,
            key_prefix: "rate_limit:".to_string(),
            store_timeout: Duration::from_secs(2),
            trust_forwarded_for: true,
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Outcome of an admission check, with advisory values for response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    /// Best-effort under concurrency; for client hints only.
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl Decision {
    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_at(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0);
        (millis as u64).div_ceil(1000).max(1)
    }

    pub fn retry_after(&self) -> u64 {
        self.retry_after_at(Utc::now())
    }
}

#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("counter store failure: {0}")]
    Store(anyhow::Error),

    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid throttle configuration: {0}")]
    InvalidConfig(String),
}

/// Admission control shared by all request handlers.
#[derive(Clone)]
pub struct RequestThrottle {
    store: Arc<dyn CounterStore>,
    config: ThrottleConfig,
}

impl RequestThrottle {
    pub fn new(store: Arc<dyn CounterStore>, config: ThrottleConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub async fn health_check(&self) -> Result<(), ThrottleError> {
        self.bounded(self.store.health_check()).await
    }

    pub async fn admit(&self, identity: &str) -> Result<Decision, ThrottleError> {
        self.admit_at(identity, Utc::now()).await
    }

    /// Admission check evaluated against an explicit clock reading.
    pub async fn admit_at(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, ThrottleError> {
        let window_ms = self.config.window_ms();
        let epoch = now.timestamp_millis().div_euclid(window_ms);
        let key = format!("{}{}:{}", self.config.key_prefix, identity, epoch);
        let reset_at = Utc
            .timestamp_millis_opt(epoch.saturating_add(1).saturating_mul(window_ms))
            .single()
            .unwrap_or(now);
        let limit = self.config.limit;

        let current = self
            .bounded(self.store.get_count(&key))
            .await?
            .unwrap_or(0);

        if current >= u64::from(limit) {
            tracing::debug!(identity, count = current, limit, "Throttle rejected request");
            return Ok(Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
            });
        }

        let count = self
            .bounded(self.store.increment_with_expiry(&key, self.config.window))
            .await?;

        // Another instance may have taken the last slot between read and increment
        let allowed = count <= u64::from(limit);
        let remaining = u64::from(limit).saturating_sub(count) as u32;

        if !allowed {
            tracing::debug!(identity, count, limit, "Throttle rejected request after increment");
        }

        Ok(Decision {
            allowed,
            limit,
            remaining,
            reset_at,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, anyhow::Error>>,
    ) -> Result<T, ThrottleError> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result.map_err(ThrottleError::Store),
            Err(_) => Err(ThrottleError::Timeout(self.config.store_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    fn throttle(limit: u32, window: Duration) -> RequestThrottle {
        RequestThrottle::new(
            Arc::new(InMemoryCounterStore::new()),
            ThrottleConfig::new(limit, window).unwrap(),
        )
    }

    fn window_start() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn get_count(&self, _key: &str) -> Result<Option<u64>, anyhow::Error> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn increment_with_expiry(
            &self,
            _key: &str,
            _ttl: Duration,
        ) -> Result<u64, anyhow::Error> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn health_check(&self) -> Result<(), anyhow::Error> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    struct StalledStore;

    #[async_trait]
    impl CounterStore for StalledStore {
        async fn get_count(&self, _key: &str) -> Result<Option<u64>, anyhow::Error> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn increment_with_expiry(
            &self,
            _key: &str,
            _ttl: Duration,
        ) -> Result<u64, anyhow::Error> {
            Ok(1)
        }

        async fn health_check(&self) -> Result<(), anyhow::Error> {
            Ok(())
        }
    }

    #[test]
    fn rejects_zero_limit_and_zero_window() {
        assert!(matches!(
            ThrottleConfig::new(0, Duration::from_secs(1)),
            Err(ThrottleError::InvalidConfig(_))
        ));
        assert!(matches!(
            ThrottleConfig::new(10, Duration::ZERO),
            Err(ThrottleError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn third_request_in_window_is_rejected() {
        let throttle = throttle(2, Duration::from_secs(1));
        let now = window_start();

        let mut decisions = Vec::new();
        for _ in 0..3 {
            decisions.push(throttle.admit_at("10.0.0.1", now).await.unwrap());
        }

        let allowed: Vec<bool> = decisions.iter().map(|d| d.allowed).collect();
        let remaining: Vec<u32> = decisions.iter().map(|d| d.remaining).collect();
        assert_eq!(allowed, vec![true, true, false]);
        assert_eq!(remaining, vec![1, 0, 0]);
        assert!(decisions.iter().all(|d| d.limit == 2));
    }

    #[tokio::test]
    async fn reset_at_is_end_of_window() {
        let throttle = throttle(5, Duration::from_secs(60));
        let now = window_start() + ChronoDuration::seconds(15);

        let decision = throttle.admit_at("client", now).await.unwrap();

        let window_ms = 60_000;
        let expected = (now.timestamp_millis() / window_ms + 1) * window_ms;
        assert_eq!(decision.reset_at.timestamp_millis(), expected);
        assert!(decision.reset_at > now);
    }

    #[tokio::test]
    async fn next_window_starts_fresh() {
        let throttle = throttle(2, Duration::from_secs(1));
        let now = window_start();

        throttle.admit_at("client", now).await.unwrap();
        throttle.admit_at("client", now).await.unwrap();
        assert!(!throttle.admit_at("client", now).await.unwrap().allowed);

        let later = now + ChronoDuration::milliseconds(1_000);
        let decision = throttle.admit_at("client", later).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test]
    async fn identities_are_counted_separately() {
        let throttle = throttle(1, Duration::from_secs(60));
        let now = window_start();

        assert!(throttle.admit_at("alice", now).await.unwrap().allowed);
        assert!(throttle.admit_at("bob", now).await.unwrap().allowed);
        assert!(!throttle.admit_at("alice", now).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn window_elapses_in_real_time() {
        let throttle = throttle(1, Duration::from_millis(200));

        assert!(throttle.admit("client").await.unwrap().allowed);
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(throttle.admit("client").await.unwrap().allowed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_checks_never_exceed_limit() {
        let throttle = throttle(5, Duration::from_secs(60));
        let now = window_start();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move { throttle.admit_at("burst", now).await.unwrap() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().allowed {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 5);
    }

    #[tokio::test]
    async fn unreachable_store_fails_closed() {
        let throttle = RequestThrottle::new(
            Arc::new(UnreachableStore),
            ThrottleConfig::new(10, Duration::from_secs(1)).unwrap(),
        );

        let result = throttle.admit("client").await;
        assert!(matches!(result, Err(ThrottleError::Store(_))));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let throttle = RequestThrottle::new(
            Arc::new(StalledStore),
            ThrottleConfig::new(10, Duration::from_secs(1))
                .unwrap()
                .with_store_timeout(Duration::from_millis(20)),
        );

        let result = throttle.admit("client").await;
        assert!(matches!(result, Err(ThrottleError::Timeout(_))));
    }

    #[test]
    fn retry_after_rounds_up_to_whole_seconds() {
        let now = window_start();
        let decision = Decision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_at: now + ChronoDuration::milliseconds(1_200),
        };

        assert_eq!(decision.retry_after_at(now), 2);
        assert_eq!(decision.retry_after_at(now + ChronoDuration::seconds(5)), 1);
    }
}
