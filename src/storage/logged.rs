// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logging decorators for the tier contracts.
//!
//! [`Logged`] wraps any tier and records, per call, the outcome (HIT/MISS/OK
//! or the error) and the elapsed time, both as a `tracing` event and as
//! metrics. The wrapped tier is unaware of it.
//!
//! ```rust
//! use std::sync::Arc;
//! use tiered_store::storage::logged::Logged;
//! use tiered_store::storage::memory::MemoryCache;
//! use tiered_store::CacheTier;
//!
//! let cache: Arc<dyn CacheTier> = Arc::new(MemoryCache::new());
//! let cache: Arc<dyn CacheTier> = Arc::new(Logged::new(cache, "cache"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::metrics::LatencyTimer;
use crate::record::Record;
use super::traits::{CacheTier, ObjectTier, RecordStore, StorageError};

pub struct Logged<T: ?Sized> {
    inner: Arc<T>,
    tier: &'static str,
}

impl<T: ?Sized> Logged<T> {
    /// Wrap `inner`, labelling its events and metrics with `tier`.
    pub fn new(inner: Arc<T>, tier: &'static str) -> Self {
        Self { inner, tier }
    }

    pub fn inner(&self) -> &Arc<T> {
        &self.inner
    }

    pub fn tier(&self) -> &'static str {
        self.tier
    }

    fn lookup<V>(
        &self,
        operation: &'static str,
        key: &str,
        timer: LatencyTimer,
        result: &Result<Option<V>, StorageError>,
    ) {
        let elapsed_ms = timer.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(Some(_)) => {
                info!(tier = self.tier, key, elapsed_ms, "{} {} HIT", self.tier, operation);
                crate::metrics::record_operation(self.tier, operation, "hit");
            }
            Ok(None) => {
                info!(tier = self.tier, key, elapsed_ms, "{} {} MISS", self.tier, operation);
                crate::metrics::record_operation(self.tier, operation, "miss");
            }
            Err(e) => self.failed(operation, key, elapsed_ms, e),
        }
    }

    fn outcome<V>(
        &self,
        operation: &'static str,
        key: &str,
        timer: LatencyTimer,
        result: &Result<V, StorageError>,
    ) {
        let elapsed_ms = timer.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(_) => {
                debug!(tier = self.tier, key, elapsed_ms, "{} {} OK", self.tier, operation);
                crate::metrics::record_operation(self.tier, operation, "success");
            }
            Err(e) => self.failed(operation, key, elapsed_ms, e),
        }
    }

    fn failed(&self, operation: &'static str, key: &str, elapsed_ms: f64, e: &StorageError) {
        error!(tier = self.tier, key, elapsed_ms, error = %e, "{} {} failed", self.tier, operation);
        crate::metrics::record_operation(self.tier, operation, "error");
    }
}

impl<T: ?Sized> Clone for Logged<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            tier: self.tier,
        }
    }
}

#[async_trait]
impl<T: CacheTier + ?Sized> CacheTier for Logged<T> {
    async fn get(&self, key: &str) -> Result<Option<Record>, StorageError> {
        let timer = LatencyTimer::new(self.tier, "get");
        let result = self.inner.get(key).await;
        self.lookup("get", key, timer, &result);
        result
    }

    async fn set(&self, key: &str, record: &Record, ttl: Duration) -> Result<(), StorageError> {
        let timer = LatencyTimer::new(self.tier, "set");
        let result = self.inner.set(key, record, ttl).await;
        self.outcome("set", key, timer, &result);
        result
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let timer = LatencyTimer::new(self.tier, "remove");
        let result = self.inner.remove(key).await;
        self.outcome("remove", key, timer, &result);
        result
    }
}

#[async_trait]
impl<T: ObjectTier + ?Sized> ObjectTier for Logged<T> {
    async fn get(&self, key: &str) -> Result<Option<Record>, StorageError> {
        let timer = LatencyTimer::new(self.tier, "get");
        let result = self.inner.get(key).await;
        self.lookup("get", key, timer, &result);
        result
    }

    async fn set(&self, key: &str, record: &Record, ttl: Duration) -> Result<(), StorageError> {
        let timer = LatencyTimer::new(self.tier, "set");
        let result = self.inner.set(key, record, ttl).await;
        self.outcome("set", key, timer, &result);
        result
    }

    async fn is_valid(&self, key: &str) -> Result<bool, StorageError> {
        let timer = LatencyTimer::new(self.tier, "is_valid");
        let result = self.inner.is_valid(key).await;
        let as_lookup = result.clone().map(|valid| valid.then_some(()));
        self.lookup("is_valid", key, timer, &as_lookup);
        result
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let timer = LatencyTimer::new(self.tier, "remove");
        let result = self.inner.remove(key).await;
        self.outcome("remove", key, timer, &result);
        result
    }
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Logged<T> {
    async fn get_by_id(&self, id: &str) -> Result<Option<Record>, StorageError> {
        let timer = LatencyTimer::new(self.tier, "get");
        let result = self.inner.get_by_id(id).await;
        self.lookup("get", id, timer, &result);
        result
    }

    async fn create(&self, record: &Record) -> Result<Record, StorageError> {
        let timer = LatencyTimer::new(self.tier, "create");
        let result = self.inner.create(record).await;
        self.outcome("create", &record.id, timer, &result);
        result
    }

    async fn update(&self, record: &Record) -> Result<Option<Record>, StorageError> {
        let timer = LatencyTimer::new(self.tier, "update");
        let result = self.inner.update(record).await;
        self.lookup("update", &record.id, timer, &result);
        result
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let timer = LatencyTimer::new(self.tier, "delete");
        let result = self.inner.delete(id).await;
        self.outcome("delete", id, timer, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryCache, MemoryRecordStore};

    #[tokio::test]
    async fn test_logged_cache_is_transparent() {
        let inner = Arc::new(MemoryCache::new());
        let cache = Logged::new(inner.clone(), "cache");
        let record = Record::with_id("a", "v");

        cache.set("data:a", &record, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("data:a").await.unwrap(), Some(record));
        assert!(inner.contains("data:a"));

        cache.remove("data:a").await.unwrap();
        assert!(cache.get("data:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logged_store_propagates_errors() {
        let store = Logged::new(Arc::new(MemoryRecordStore::new()), "store");
        let record = Record::with_id("a", "v");

        store.create(&record).await.unwrap();
        let err = store.create(&record).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_logged_wraps_trait_objects() {
        let dyn_store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let store = Logged::new(dyn_store, "store");

        assert!(store.update(&Record::with_id("ghost", "v")).await.unwrap().is_none());
        assert_eq!(store.tier(), "store");
    }
}
