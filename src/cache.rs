use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One slot per cached endpoint. The key set is closed, so the cache never
/// needs size-based eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Returns,
    Stations,
    Barriers,
    Scrape,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Returns => "wdfw",
            CacheKey::Stations => "usgs",
            CacheKey::Barriers => "barriers",
            CacheKey::Scrape => "scrape",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub timestamp: Instant,
    pub payload: Arc<Value>,
}

/// Shared store of the last successful payload per endpoint.
///
/// Lives behind a trait so the in-process map can be swapped for a shared
/// key-value store when the service runs on more than one node.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Fresh payload for `key`, or `None` when absent or older than the TTL.
    async fn get(&self, key: CacheKey) -> Option<Arc<Value>>;
    /// Replaces the entry for `key` wholesale.
    async fn set(&self, key: CacheKey, payload: Value) -> Arc<Value>;
    async fn clear(&self);
}

pub struct MemoryCache {
    entries: Cache<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().name("aggregation").build(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_stale(&self, entry: &CacheEntry) -> bool {
        entry.timestamp.elapsed() > self.ttl
    }

    /// Removes the entry for `key` only if it is still expired, so a fresh
    /// `set` that landed after the caller's read survives.
    async fn evict_if_stale(&self, key: CacheKey) {
        let outcome = self
            .entries
            .entry(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if self.is_stale(entry.value()) => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        if let CompResult::Removed(entry) = outcome {
            tracing::debug!("Cache entry {} expired", entry.key().as_str());
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: CacheKey) -> Option<Arc<Value>> {
        let entry = self.entries.get(&key).await?;

        if self.is_stale(&entry) {
            self.evict_if_stale(entry.key).await;
            return None;
        }

        Some(entry.payload)
    }

    async fn set(&self, key: CacheKey, payload: Value) -> Arc<Value> {
        let payload = Arc::new(payload);
        self.entries
            .insert(
                key,
                CacheEntry {
                    key,
                    timestamp: Instant::now(),
                    payload: payload.clone(),
                },
            )
            .await;
        payload
    }

    async fn clear(&self) {
        self.entries.invalidate_all();
    }
}

/// Serve `key` from the cache, or run `fetch` and store its result.
///
/// Errors are returned as-is and never cached, so the next request goes
/// upstream again. Two concurrent misses may both fetch; the last write wins.
pub async fn get_or_fetch<F, Fut, E>(
    cache: &dyn ResponseCache,
    key: CacheKey,
    fetch: F,
) -> Result<Arc<Value>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
{
    if let Some(hit) = cache.get(key).await {
        tracing::debug!("Cache hit for {}", key.as_str());
        return Ok(hit);
    }

    tracing::debug!("Cache miss for {}", key.as_str());
    let payload = fetch().await?;
    Ok(cache.set(key, payload).await)
}
