// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write path: create goes to the Record Store only; update writes the
//! store and then invalidates both faster tiers.

use std::sync::Arc;

use tracing::{debug, info};

use super::{report_side_effect, TieredStore};
use crate::error::OperationError;
use crate::record::{cache_key, Record};

impl TieredStore {
    /// Create a record with a newly generated id.
    ///
    /// Only the Record Store is written; the first [`get`](Self::get)
    /// fills the faster tiers.
    #[tracing::instrument(skip(self, value), fields(id))]
    pub async fn create(&self, value: &str) -> Result<Record, OperationError> {
        let start = std::time::Instant::now();

        let created = self
            .execute("create", || async {
                self.validate_value(value)?;
                let record = Record::new(value);
                Ok::<_, OperationError>(self.records.create(&record).await?)
            })
            .await?;

        tracing::Span::current().record("id", created.id.as_str());
        info!("Record created");
        crate::metrics::record_operation("store", "create", "success");
        crate::metrics::record_latency("all", "create", start.elapsed());
        Ok(created)
    }

    /// Replace the value of an existing record.
    ///
    /// Returns `Ok(None)` without touching any tier when the id is unknown.
    /// After the store write, the Cache entry and every Object Tier version
    /// are removed; removal failures are logged, not returned.
    #[tracing::instrument(skip(self, value))]
    pub async fn update(&self, id: &str, value: &str) -> Result<Option<Record>, OperationError> {
        let start = std::time::Instant::now();

        let updated = self
            .execute("update", || async {
                Self::validate_id(id)?;
                self.validate_value(value)?;

                let Some(existing) = self.records.get_by_id(id).await? else {
                    debug!("Update target not found");
                    return Ok(None);
                };

                let revised = existing.revised(value);
                let Some(stored) = self.records.update(&revised).await? else {
                    debug!("Update target vanished before write");
                    return Ok(None);
                };

                self.invalidate(id).await;
                Ok::<_, OperationError>(Some(stored))
            })
            .await?;

        let status = if updated.is_some() { "success" } else { "miss" };
        info!(status, "Update completed");
        crate::metrics::record_operation("store", "update", status);
        crate::metrics::record_latency("all", "update", start.elapsed());
        Ok(updated)
    }

    /// Remove `id` from the Cache and Object tiers in parallel and wait for both.
    async fn invalidate(&self, id: &str) {
        let cache_remove = {
            let cache = Arc::clone(&self.cache);
            let key = cache_key(id);
            tokio::spawn(async move { cache.remove(&key).await })
        };
        let object_remove = {
            let objects = Arc::clone(&self.objects);
            let key = id.to_string();
            tokio::spawn(async move { objects.remove(&key).await })
        };

        report_side_effect("cache", "invalidate", id, cache_remove.await);
        report_side_effect("object", "invalidate", id, object_remove.await);
        debug!("Invalidated faster tiers");
    }
}
