//! Counter store port and the in-process implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Shared key-value store holding throttle counters.
///
/// `increment_with_expiry` must be a single atomic operation on the store:
/// the counter is incremented and, if it has no expiry yet, given `ttl`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get_count(&self, key: &str) -> Result<Option<u64>, anyhow::Error>;

    async fn increment_with_expiry(&self, key: &str, ttl: Duration)
    -> Result<u64, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local counter store with the same semantics as the Redis store.
///
/// Suitable for single-instance deployments and tests. Window keys are never
/// read again once their window passes, so long-running processes must run
/// [`InMemoryCounterStore::spawn_purge_task`] to keep the map bounded.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, Entry>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired counter; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, entry| entry.is_live(now));
        before - self.counters.len()
    }

    /// Purge expired counters every `every` until the store is dropped.
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(
                        purged,
                        remaining = store.len(),
                        "Purged expired rate limit counters"
                    );
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get_count(&self, key: &str) -> Result<Option<u64>, anyhow::Error> {
        let now = Instant::now();
        Ok(self
            .counters
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.count))
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<u64, anyhow::Error> {
        let now = Instant::now();
        // The entry guard holds the shard lock, so read-modify-write is atomic.
        let mut entry = self.counters.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: now + ttl,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                count: 0,
                expires_at: now + ttl,
            };
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
