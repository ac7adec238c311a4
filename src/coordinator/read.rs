// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read path: sequential tier probes and backfill.

use std::sync::Arc;

use tracing::{debug, info};

use super::types::{Lookup, TierSource};
use super::{report_side_effect, TieredStore};
use crate::error::OperationError;
use crate::record::{cache_key, Record};

impl TieredStore {
    /// Get a record by id.
    ///
    /// Checks the tiers in order: Cache → Object → Store. `Ok(None)` when no
    /// tier has it.
    pub async fn get(&self, id: &str) -> Result<Option<Record>, OperationError> {
        Ok(self.lookup(id).await?.map(Lookup::into_record))
    }

    /// Like [`get`](Self::get), also reporting which tier answered.
    #[tracing::instrument(skip(self), fields(tier))]
    pub async fn lookup(&self, id: &str) -> Result<Option<Lookup>, OperationError> {
        self.execute("get", || async {
            Self::validate_id(id)?;
            self.probe(id).await
        })
        .await
    }

    async fn probe(&self, id: &str) -> Result<Option<Lookup>, OperationError> {
        let start = std::time::Instant::now();

        // 1. Cache
        if let Some(record) = self.cache.get(&cache_key(id)).await? {
            return Ok(Some(self.hit(record, TierSource::Cache, start)));
        }
        debug!("Cache miss");

        // 2. Object Tier (faults already degrade to a miss)
        if let Some(record) = self.objects.get(id).await? {
            self.backfill(id, &record, TierSource::Object).await;
            return Ok(Some(self.hit(record, TierSource::Object, start)));
        }
        debug!("Object miss");

        // 3. Record Store
        if let Some(record) = self.records.get_by_id(id).await? {
            self.backfill(id, &record, TierSource::Store).await;
            return Ok(Some(self.hit(record, TierSource::Store, start)));
        }

        tracing::Span::current().record("tier", "miss");
        info!("Record not found in any tier");
        crate::metrics::record_operation("all", "get", "miss");
        crate::metrics::record_latency("all", "get", start.elapsed());
        Ok(None)
    }

    fn hit(&self, record: Record, source: TierSource, start: std::time::Instant) -> Lookup {
        tracing::Span::current().record("tier", source.as_str());
        info!(source = %source, "{} hit", source);
        crate::metrics::record_operation(source.as_str(), "get", "hit");
        crate::metrics::record_latency(source.as_str(), "get", start.elapsed());
        Lookup { record, source }
    }

    /// Copy `record` into the tiers faster than `source`, under the
    /// requested `id` rather than the id inside the payload.
    ///
    /// Writes run as spawned tasks so a cancelled caller does not abort them;
    /// both are awaited before returning and failures are only logged.
    async fn backfill(&self, id: &str, record: &Record, source: TierSource) {
        if source == TierSource::Cache {
            return;
        }

        let cache_write = {
            let cache = Arc::clone(&self.cache);
            let key = cache_key(id);
            let record = record.clone();
            let ttl = self.config.cache_ttl();
            tokio::spawn(async move { cache.set(&key, &record, ttl).await })
        };

        let object_write = (source == TierSource::Store).then(|| {
            let objects = Arc::clone(&self.objects);
            let key = id.to_string();
            let record = record.clone();
            let ttl = self.config.object_ttl();
            tokio::spawn(async move { objects.set(&key, &record, ttl).await })
        });

        report_side_effect("cache", "backfill", id, cache_write.await);
        if let Some(write) = object_write {
            report_side_effect("object", "backfill", id, write.await);
        }
        debug!(from = %source, "Backfill complete");
    }
}
