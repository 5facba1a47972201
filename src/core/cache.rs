//! Time-windowed memoization of resolution results.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::quote::{Fundamentals, Quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Quote,
    Fundamentals,
    IndexBatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: RequestKind,
    pub key: String,
}

impl CacheKey {
    pub fn new(kind: RequestKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    /// Order-insensitive key for a ticker batch.
    pub fn batch(tickers: &[String]) -> Self {
        let mut sorted: Vec<&str> = tickers.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        Self::new(RequestKind::IndexBatch, sorted.join(","))
    }
}

/// Values the resolver memoizes. Absent results are cached too.
#[derive(Debug, Clone)]
pub enum Cached {
    Quote(Option<Quote>),
    Fundamentals(Option<Fundamentals>),
    Batch(Vec<Quote>),
}

pub type MarketCache = TtlCache<CacheKey, Cached>;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    pub freshness_window: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.freshness_window
    }
}

/// Pure TTL map. Expired entries are never returned; they are dropped on
/// access or by [`TtlCache::sweep`].
///
/// Concurrent misses for the same key each run their own resolution; the
/// lock is not held while resolving.
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().await;
        let now = Instant::now();
        match cache.get(key).map(|entry| entry.is_fresh(now)) {
            Some(true) => {
                debug!("Cache HIT for key: {:?}", key);
                cache.get(key).map(|entry| entry.value.clone())
            }
            Some(false) => {
                debug!("Cache entry expired for key: {:?}", key);
                cache.remove(key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    pub async fn put(&self, key: K, value: V, freshness_window: Duration) {
        let entry = CacheEntry {
            value,
            fetched_at: Instant::now(),
            freshness_window,
        };
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, entry);
    }

    /// Returns the fresh entry for `key`, or runs `resolve` and stores its
    /// result with `freshness_window`.
    pub async fn get_or_resolve<F, Fut>(&self, key: K, freshness_window: Duration, resolve: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key).await {
            return value;
        }
        let value = resolve().await;
        self.put(key, value.clone(), freshness_window).await;
        value
    }

    /// Drops every expired entry, returning how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.inner.lock().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.is_fresh(now));
        let removed = before - cache.len();
        if removed > 0 {
            debug!("Cache SWEEP removed {} entries", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Runs [`Self::sweep`] every `every` on a background task.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep().await;
            }
        })
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
