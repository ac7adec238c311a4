// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process implementations of every storage contract.
//!
//! Used when no backend URL is configured, for embedding, and in tests.
//! The cache and record store are backed by `DashMap`, the blob backend by an
//! ordered map; all are safe for concurrent use.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::record::Record;
use super::traits::{BlobBackend, CacheTier, RecordStore, StorageError};

/// Cache Tier kept in process memory, with per-key expiry.
///
/// Expired entries are dropped lazily when read, or eagerly via
/// [`purge_expired`](Self::purge_expired).
pub struct MemoryCache {
    data: DashMap<String, (Record, Instant)>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Number of stored entries, expired ones included until purged
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check presence of a live entry without touching it
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data
            .get(key)
            .is_some_and(|entry| entry.value().1 > Instant::now())
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, (_, expires_at)| *expires_at > now);
        before.saturating_sub(self.data.len())
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheTier for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Record>, StorageError> {
        let now = Instant::now();
        if let Some(entry) = self.data.get(key) {
            let (record, expires_at) = entry.value();
            if *expires_at > now {
                return Ok(Some(record.clone()));
            }
        }
        // Expired (or absent): drop it, unless a writer refreshed it meanwhile
        self.data.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, record: &Record, ttl: Duration) -> Result<(), StorageError> {
        let expires_at = Instant::now() + ttl;
        self.data.insert(key.to_string(), (record.clone(), expires_at));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }
}

/// Record Store kept in process memory.
pub struct MemoryRecordStore {
    data: DashMap<String, Record>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Record>, StorageError> {
        Ok(self.data.get(id).map(|r| r.value().clone()))
    }

    async fn create(&self, record: &Record) -> Result<Record, StorageError> {
        use dashmap::mapref::entry::Entry;

        match self.data.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(format!(
                "record '{}' already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record.clone())
            }
        }
    }

    async fn update(&self, record: &Record) -> Result<Option<Record>, StorageError> {
        match self.data.get_mut(&record.id) {
            Some(mut existing) => {
                *existing = record.clone();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(id).is_some())
    }
}

/// Blob backend kept in process memory.
///
/// Names are kept ordered, so a prefix listing is a range scan over the
/// matching names only.
pub struct MemoryBlobBackend {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// All object names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }
}

impl Default for MemoryBlobBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobBackend {
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.objects.write().insert(name.to_string(), data);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.objects.read().get(name).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let objects = self.objects.read();
        Ok(objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(name, _)| name)
            .take_while(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.objects.write().remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_record(id: &str) -> Record {
        Record::with_id(id, format!("value-{}", id))
    }

    #[tokio::test]
    async fn test_cache_set_and_get() {
        let cache = MemoryCache::new();
        let record = test_record("a");

        cache.set("data:a", &record, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("data:a").await.unwrap(), Some(record));
        assert!(cache.contains("data:a"));
    }

    #[tokio::test]
    async fn test_cache_get_nonexistent_returns_none() {
        let cache = MemoryCache::new();
        assert!(cache.get("data:missing").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_entry_expires() {
        let cache = MemoryCache::new();
        cache.set("data:a", &test_record("a"), Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("data:a").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("data:a").await.unwrap().is_none());
        // Lazily dropped on read
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("data:short", &test_record("short"), Duration::from_secs(1)).await.unwrap();
        cache.set("data:long", &test_record("long"), Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("data:long"));
    }

    #[tokio::test]
    async fn test_cache_remove() {
        let cache = MemoryCache::new();
        cache.set("data:a", &test_record("a"), Duration::from_secs(60)).await.unwrap();

        cache.remove("data:a").await.unwrap();
        assert!(cache.get("data:a").await.unwrap().is_none());

        // Removing again is fine
        assert!(cache.remove("data:a").await.is_ok());
    }

    #[tokio::test]
    async fn test_store_create_and_get() {
        let store = MemoryRecordStore::new();
        let record = test_record("r1");

        let created = store.create(&record).await.unwrap();
        assert_eq!(created, record);
        assert_eq!(store.get_by_id("r1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_store_create_duplicate_conflicts() {
        let store = MemoryRecordStore::new();
        store.create(&test_record("r1")).await.unwrap();

        let err = store.create(&test_record("r1")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_update_existing() {
        let store = MemoryRecordStore::new();
        let record = test_record("r1");
        store.create(&record).await.unwrap();

        let revised = record.revised("new");
        assert_eq!(store.update(&revised).await.unwrap(), Some(revised.clone()));
        assert_eq!(store.get_by_id("r1").await.unwrap().unwrap().value, "new");
    }

    #[tokio::test]
    async fn test_store_update_missing_returns_none() {
        let store = MemoryRecordStore::new();
        assert!(store.update(&test_record("ghost")).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_delete() {
        let store = MemoryRecordStore::new();
        store.create(&test_record("r1")).await.unwrap();

        assert!(store.delete("r1").await.unwrap());
        assert!(!store.delete("r1").await.unwrap());
        assert!(store.get_by_id("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blob_list_by_prefix_sorted() {
        let blobs = MemoryBlobBackend::new();
        blobs.put("b_2.json", vec![2]).await.unwrap();
        blobs.put("a_1.json", vec![1]).await.unwrap();
        blobs.put("b_1.json", vec![1]).await.unwrap();

        assert_eq!(blobs.list("b_").await.unwrap(), vec!["b_1.json", "b_2.json"]);
        assert_eq!(blobs.list("").await.unwrap().len(), 3);
        assert!(blobs.list("c_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_list_stops_at_end_of_prefix_range() {
        let blobs = MemoryBlobBackend::new();
        for name in ["ab_1.json", "ab_2.json", "ab_x_1.json", "abc_1.json", "aa_1.json", "b_1.json"] {
            blobs.put(name, vec![]).await.unwrap();
        }

        assert_eq!(
            blobs.list("ab_").await.unwrap(),
            vec!["ab_1.json", "ab_2.json", "ab_x_1.json"]
        );
        assert_eq!(blobs.list("ab").await.unwrap().len(), 4);
        assert!(blobs.list("zz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_put_get_delete() {
        let blobs = MemoryBlobBackend::new();
        blobs.put("x.json", b"{}".to_vec()).await.unwrap();

        assert_eq!(blobs.get("x.json").await.unwrap(), Some(b"{}".to_vec()));
        assert!(blobs.delete("x.json").await.unwrap());
        assert!(!blobs.delete("x.json").await.unwrap());
        assert!(blobs.get("x.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut handles = vec![];

        for batch in 0..10 {
            let store_clone = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    let record = test_record(&format!("batch-{}-record-{}", batch, i));
                    store_clone.create(&record).await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 100);
    }
}
