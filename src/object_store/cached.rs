use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;

use super::{ByteStream, ObjectStore, ObjectStoreError};

struct CacheEntry {
    data: Bytes,
    inserted_at: Instant,
}

/// Read-through LRU cache in front of another backend.
///
/// Only whole-object reads (`get`) are cached; range reads and size lookups go
/// straight to the backend. Writes and deletes invalidate the key. A zero
/// capacity disables caching.
pub struct CachedStore {
    inner: Arc<dyn ObjectStore>,
    entries: Option<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn ObjectStore>, max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner,
            entries: NonZeroUsize::new(max_entries).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl,
        }
    }

    fn entries(&self) -> Option<MutexGuard<'_, LruCache<String, CacheEntry>>> {
        self.entries
            .as_ref()
            .map(|entries| entries.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.entries()?;
        let (data, fresh) = entries
            .get(key)
            .map(|entry| (entry.data.clone(), entry.inserted_at.elapsed() < self.ttl))?;
        if fresh {
            return Some(data);
        }
        entries.pop(key);
        None
    }

    fn store(&self, key: &str, data: Bytes) {
        if let Some(mut entries) = self.entries() {
            entries.put(
                key.to_string(),
                CacheEntry {
                    data,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    fn invalidate(&self, key: &str) {
        if let Some(mut entries) = self.entries() {
            entries.pop(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for CachedStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), ObjectStoreError> {
        self.invalidate(key);
        self.inner.put(key, data, content_type).await
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.invalidate(key);
        self.inner.put_file(key, path, content_type).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        if let Some(data) = self.lookup(key) {
            tracing::trace!(key = %key, "Object cache hit");
            return Ok(data);
        }

        let data = self.inner.get(key).await?;
        self.store(key, data.clone());
        Ok(data)
    }

    async fn get_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, ObjectStoreError> {
        self.inner.get_range(key, start, end).await
    }

    async fn head_size(&self, key: &str) -> Result<u64, ObjectStoreError> {
        self.inner.head_size(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.invalidate(key);
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        self.inner.exists(key).await
    }
}
