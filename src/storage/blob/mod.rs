// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Object Tier with emulated TTL.
//!
//! Blob stores have no native expiry, so the absolute expiry of each version
//! is written into the object name (see [`name`]). Cleanup happens twice:
//!
//! - **Eagerly on write**: after `set` uploads a new version, every other
//!   version of the key is deleted.
//! - **Lazily on read**: `get` and `is_valid` delete expired versions they
//!   come across while scanning the key's prefix.
//!
//! Reads, validity probes and removals never fail: any backend fault is
//! logged and reported as not-found / not-valid / no-op, so the orchestrator
//! falls through to the next tier. Only `set` propagates errors.
//!
//! ```text
//! set("64f1", r, 5m)  →  PUT    64f1_20251019143000.json
//!                        LIST   64f1_*
//!                        DELETE 64f1_20251019120000.json   (superseded)
//! get("64f1")         →  LIST   64f1_*  → first unexpired → GET → Record
//! ```

pub mod fs;
pub mod name;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::record::Record;
use super::traits::{BlobBackend, ObjectTier, StorageError};
use name::Ownership;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Emulated-TTL [`ObjectTier`] over any [`BlobBackend`].
#[derive(Clone)]
pub struct BlobTtlStore {
    backend: Arc<dyn BlobBackend>,
    clock: Clock,
}

impl std::fmt::Debug for BlobTtlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobTtlStore").finish_non_exhaustive()
    }
}

/// What a prefix scan is looking for.
enum ScanMode {
    /// Download and return the first valid record
    Fetch,
    /// Stop at the first valid name
    Probe,
}

enum ScanOutcome {
    Found(Option<Record>),
    NotFound,
}

impl BlobTtlStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self::with_clock(backend, Utc::now)
    }

    /// Use a custom time source for expiry decisions.
    pub fn with_clock<C>(backend: Arc<dyn BlobBackend>, clock: C) -> Self
    where
        C: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            backend,
            clock: Arc::new(clock),
        }
    }

    /// The underlying blob backend.
    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Walk the key's versions in name order, deleting expired ones,
    /// until a valid one is found.
    async fn scan(&self, key: &str, mode: ScanMode) -> Result<ScanOutcome, StorageError> {
        name::validate_key(key).map_err(StorageError::InvalidName)?;

        let names = self.backend.list(&name::prefix(key)).await?;
        let now = self.now();
        let mut expired = 0usize;

        let outcome = 'scan: {
            for object in &names {
                match name::inspect(key, object) {
                    Ownership::Foreign => continue,
                    Ownership::Unparseable => {
                        debug!(key, object = %object, "Ignoring object with unparseable expiry");
                    }
                    Ownership::Owned { expires_at } if now < expires_at => match mode {
                        ScanMode::Probe => break 'scan ScanOutcome::Found(None),
                        ScanMode::Fetch => {
                            let Some(bytes) = self.backend.get(object).await? else {
                                // Deleted between list and get
                                continue;
                            };
                            match serde_json::from_slice::<Record>(&bytes) {
                                Ok(record) => break 'scan ScanOutcome::Found(Some(record)),
                                Err(e) => {
                                    warn!(key, object = %object, error = %e, "Skipping malformed object payload");
                                }
                            }
                        }
                    },
                    Ownership::Owned { .. } => {
                        match self.backend.delete(object).await {
                            Ok(_) => expired += 1,
                            Err(e) => warn!(key, object = %object, error = %e, "Failed to delete expired object"),
                        }
                    }
                }
            }
            ScanOutcome::NotFound
        };

        if expired > 0 {
            debug!(key, expired, "Deleted expired objects");
            crate::metrics::record_blob_expired(expired);
        }
        Ok(outcome)
    }

    /// Delete every version of `key` except `keep`. Individual failures are logged.
    async fn delete_versions(&self, key: &str, keep: Option<&str>) -> Result<usize, StorageError> {
        let names = self.backend.list(&name::prefix(key)).await?;
        let mut deleted = 0usize;

        for object in names {
            if Some(object.as_str()) == keep || !name::inspect(key, &object).is_owned() {
                continue;
            }
            match self.backend.delete(&object).await {
                Ok(_) => deleted += 1,
                Err(e) => warn!(key, object = %object, error = %e, "Failed to delete object version"),
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl ObjectTier for BlobTtlStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StorageError> {
        match self.scan(key, ScanMode::Fetch).await {
            Ok(ScanOutcome::Found(record)) => Ok(record),
            Ok(ScanOutcome::NotFound) => Ok(None),
            Err(e) => {
                warn!(key, error = %e, "Object tier read failed, treating as miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, record: &Record, ttl: Duration) -> Result<(), StorageError> {
        name::validate_key(key).map_err(StorageError::InvalidName)?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Backend(format!("TTL out of range: {}", e)))?;
        let expires_at = name::expiry_after(self.now(), ttl)
            .ok_or_else(|| StorageError::Backend(format!("TTL out of range: {:?} past now", ttl)))?;
        let object = name::encode(key, expires_at);
        let payload = serde_json::to_vec(record)?;

        self.backend.put(&object, payload).await?;

        // The new version is durable; pruning old ones is best effort
        match self.delete_versions(key, Some(&object)).await {
            Ok(0) => {}
            Ok(n) => debug!(key, superseded = n, "Deleted superseded objects"),
            Err(e) => warn!(key, error = %e, "Failed to prune superseded objects"),
        }
        Ok(())
    }

    async fn is_valid(&self, key: &str) -> Result<bool, StorageError> {
        match self.scan(key, ScanMode::Probe).await {
            Ok(ScanOutcome::Found(_)) => Ok(true),
            Ok(ScanOutcome::NotFound) => Ok(false),
            Err(e) => {
                warn!(key, error = %e, "Object tier validity probe failed, treating as invalid");
                Ok(false)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if let Err(e) = name::validate_key(key) {
            warn!(key, error = %e, "Ignoring remove for invalid key");
            return Ok(());
        }
        if let Err(e) = self.delete_versions(key, None).await {
            warn!(key, error = %e, "Object tier remove failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBlobBackend;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    /// Settable clock shared between a test and the store.
    #[derive(Clone)]
    struct TestClock(Arc<Mutex<DateTime<Utc>>>);

    impl TestClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap())))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock();
            *now += chrono::Duration::from_std(by).unwrap();
        }

        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn store_with_clock() -> (BlobTtlStore, Arc<MemoryBlobBackend>, TestClock) {
        let backend = Arc::new(MemoryBlobBackend::new());
        let clock = TestClock::new();
        let c = clock.clone();
        let store = BlobTtlStore::with_clock(backend.clone(), move || c.now());
        (store, backend, clock)
    }

    fn record(id: &str, value: &str) -> Record {
        Record::with_id(id, value)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let (store, backend, _) = store_with_clock();
        let r = record("abc", "hello");

        store.set("abc", &r, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("abc").await.unwrap(), Some(r));
        assert_eq!(backend.names(), vec!["abc_20251019120100.json"]);
    }

    #[tokio::test]
    async fn test_payload_is_record_json() {
        let (store, backend, _) = store_with_clock();
        let r = record("abc", "hello");
        store.set("abc", &r, Duration::from_secs(60)).await.unwrap();

        let bytes = backend.get("abc_20251019120100.json").await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["value"], "hello");
        assert!(json.get("createdAt").is_some());
    }

    #[tokio::test]
    async fn test_get_after_expiry_is_miss_and_cleans_up() {
        let (store, backend, clock) = store_with_clock();
        store.set("abc", &record("abc", "v"), Duration::from_secs(60)).await.unwrap();

        clock.advance(Duration::from_secs(61));

        assert!(store.get("abc").await.unwrap().is_none());
        assert!(!store.is_valid("abc").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_exclusive() {
        let (store, _, clock) = store_with_clock();
        store.set("abc", &record("abc", "v"), Duration::from_secs(10)).await.unwrap();

        clock.advance(Duration::from_secs(9));
        assert!(store.is_valid("abc").await.unwrap());

        clock.advance(Duration::from_secs(1));
        assert!(!store.is_valid("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_valid_deletes_expired_versions() {
        let (store, backend, _) = store_with_clock();
        backend.put("abc_20240101000000.json", b"{}".to_vec()).await.unwrap();

        assert!(!store.is_valid("abc").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_set_twice_leaves_one_object() {
        let (store, backend, clock) = store_with_clock();
        store.set("abc", &record("abc", "v1"), Duration::from_secs(60)).await.unwrap();
        clock.advance(Duration::from_secs(5));
        store.set("abc", &record("abc", "v2"), Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.names(), vec!["abc_20251019120105.json"]);
        assert_eq!(store.get("abc").await.unwrap().unwrap().value, "v2");
    }

    #[tokio::test]
    async fn test_set_within_same_second_overwrites() {
        let (store, backend, _) = store_with_clock();
        store.set("abc", &record("abc", "v1"), Duration::from_secs(60)).await.unwrap();
        store.set("abc", &record("abc", "v2"), Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.len(), 1);
        assert_eq!(store.get("abc").await.unwrap().unwrap().value, "v2");
    }

    #[tokio::test]
    async fn test_get_skips_expired_then_returns_valid() {
        let (store, backend, _) = store_with_clock();
        let r = record("abc", "current");
        backend.put("abc_20240101000000.json", b"{}".to_vec()).await.unwrap();
        backend
            .put("abc_20991231235959.json", serde_json::to_vec(&r).unwrap())
            .await
            .unwrap();

        assert_eq!(store.get("abc").await.unwrap(), Some(r));
        assert_eq!(backend.names(), vec!["abc_20991231235959.json"]);
    }

    #[tokio::test]
    async fn test_unparseable_names_are_ignored_not_deleted() {
        let (store, backend, _) = store_with_clock();
        backend.put("abc_notatimestamp.json", b"{}".to_vec()).await.unwrap();

        assert!(store.get("abc").await.unwrap().is_none());
        assert!(!store.is_valid("abc").await.unwrap());
        assert_eq!(backend.names(), vec!["abc_notatimestamp.json"]);

        store.remove("abc").await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_invalid() {
        let (store, backend, _) = store_with_clock();
        backend.put("abc_20991231235959.json", b"not json".to_vec()).await.unwrap();

        assert!(store.get("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_sharing_a_prefix_do_not_interfere() {
        let (store, backend, _) = store_with_clock();
        store.set("abc", &record("abc", "short"), Duration::from_secs(60)).await.unwrap();
        store.set("abc_def", &record("abc_def", "long"), Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.len(), 2);
        assert_eq!(store.get("abc").await.unwrap().unwrap().value, "short");
        assert_eq!(store.get("abc_def").await.unwrap().unwrap().value, "long");

        store.remove("abc").await.unwrap();
        assert_eq!(backend.names(), vec!["abc_def_20251019120100.json"]);
    }

    #[tokio::test]
    async fn test_remove_deletes_all_versions() {
        let (store, backend, _) = store_with_clock();
        backend.put("abc_20240101000000.json", b"{}".to_vec()).await.unwrap();
        backend.put("abc_20991231235959.json", b"{}".to_vec()).await.unwrap();
        backend.put("xyz_20991231235959.json", b"{}".to_vec()).await.unwrap();

        store.remove("abc").await.unwrap();

        assert_eq!(backend.names(), vec!["xyz_20991231235959.json"]);
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let (store, _, _) = store_with_clock();
        let err = store.set("a/b", &record("a/b", "v"), Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));

        assert!(store.get("a/b").await.unwrap().is_none());
        assert!(!store.is_valid("").await.unwrap());
        assert!(store.remove("").await.is_ok());
    }

    #[tokio::test]
    async fn test_ttl_past_year_9999_is_rejected() {
        let (store, backend, _) = store_with_clock();
        let ten_thousand_years = Duration::from_secs(10_000 * 365 * 86_400);

        let err = store
            .set("abc", &record("abc", "v"), ten_thousand_years)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Backend(_)));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_past_chrono_range_is_rejected_without_panic() {
        let (store, backend, _) = store_with_clock();
        let far = Duration::from_secs(300_000 * 365 * 86_400);

        let err = store.set("abc", &record("abc", "v"), far).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));

        let err = store
            .set("abc", &record("abc", "v"), Duration::from_secs(u64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_ttl_keeps_current_version() {
        let (store, backend, _) = store_with_clock();
        store.set("abc", &record("abc", "v1"), Duration::from_secs(60)).await.unwrap();

        assert!(store
            .set("abc", &record("abc", "v2"), Duration::from_secs(10_000 * 365 * 86_400))
            .await
            .is_err());

        assert_eq!(backend.names(), vec!["abc_20251019120100.json"]);
        assert_eq!(store.get("abc").await.unwrap().unwrap().value, "v1");
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediately_expired() {
        let (store, _, _) = store_with_clock();
        store.set("abc", &record("abc", "v"), Duration::ZERO).await.unwrap();
        assert!(store.get("abc").await.unwrap().is_none());
    }
}
