//! Caching utilities for ytsig

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;

/// Process-scoped cache keyed by player script URL.
///
/// Entries are populated lazily and never expire: a changed player script
/// always arrives under a new URL. Concurrent lookups of a missing key share
/// one in-flight computation.
#[derive(Clone)]
pub struct ScriptCache<V> {
    inner: Cache<String, V>,
}

impl<V> ScriptCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().build(),
        }
    }

    /// Create a cache holding at most `max_capacity` scripts
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn set(&self, key: &str, value: V) {
        self.inner.insert(key.to_string(), value).await;
    }

    /// Return the cached value or run `init` to produce it.
    ///
    /// Only one `init` runs per key at a time; other callers wait for its
    /// outcome. Errors are handed to every waiter and nothing is stored.
    pub async fn get_or_try_insert_with<F, E>(&self, key: &str, init: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.inner.try_get_with(key.to_string(), init).await
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of cached scripts
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

impl<V> Default for ScriptCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
