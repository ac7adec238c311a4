// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Builds the three tiers from a [`TieredStoreConfig`].
//!
//! | Tier         | Configured              | Fallback            |
//! |--------------|-------------------------|---------------------|
//! | Cache        | `redis_url` → Redis     | [`MemoryCache`]     |
//! | Object       | `blob_root` → directory | [`MemoryBlobBackend`] |
//! | Record Store | `sql_url` → SQL         | [`MemoryRecordStore`] |

use std::sync::Arc;

use tracing::info;

use crate::config::TieredStoreConfig;
use super::blob::fs::FsBlobBackend;
use super::blob::BlobTtlStore;
use super::logged::Logged;
use super::memory::{MemoryBlobBackend, MemoryCache, MemoryRecordStore};
use super::redis::RedisCache;
use super::sql::SqlRecordStore;
use super::traits::{BlobBackend, CacheTier, ObjectTier, RecordStore, StorageError};

/// The connected tiers, ready to hand to the orchestrator.
#[derive(Clone)]
pub struct Tiers {
    pub cache: Arc<dyn CacheTier>,
    pub objects: Arc<dyn ObjectTier>,
    pub records: Arc<dyn RecordStore>,
}

pub struct StorageFactory;

impl StorageFactory {
    /// Connect every tier, wrapping each in [`Logged`] when
    /// `enable_logging` is set.
    pub async fn connect(config: &TieredStoreConfig) -> Result<Tiers, StorageError> {
        let cache: Arc<dyn CacheTier> = match config.redis_url.as_deref() {
            Some(url) => {
                info!("Connecting Cache Tier to Redis");
                Arc::new(RedisCache::with_prefix(url, config.redis_prefix.as_deref()).await?)
            }
            None => Arc::new(MemoryCache::new()),
        };

        let backend: Arc<dyn BlobBackend> = match config.blob_root.as_deref() {
            Some(root) => {
                info!(root, "Opening Object Tier directory");
                Arc::new(FsBlobBackend::open(root).await?)
            }
            None => Arc::new(MemoryBlobBackend::new()),
        };
        let objects: Arc<dyn ObjectTier> = Arc::new(BlobTtlStore::new(backend));

        let records: Arc<dyn RecordStore> = match config.sql_url.as_deref() {
            Some(url) => {
                info!("Connecting Record Store to SQL");
                Arc::new(SqlRecordStore::new(url).await?)
            }
            None => Arc::new(MemoryRecordStore::new()),
        };

        if !config.enable_logging {
            return Ok(Tiers { cache, objects, records });
        }

        Ok(Tiers {
            cache: Arc::new(Logged::new(cache, "cache")),
            objects: Arc::new(Logged::new(objects, "object")),
            records: Arc::new(Logged::new(records, "store")),
        })
    }
}
