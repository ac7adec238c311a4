// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered store coordinator.
//!
//! The [`TieredStore`] serves records through three tiers:
//! - **Cache**: volatile, native TTL
//! - **Object**: durable blobs with TTL emulated in the object name
//! - **Store**: the Record Store, source of truth
//!
//! # Flow
//!
//! ```text
//! get:    Cache ─miss→ Object ─miss→ Store ─miss→ None
//!           │hit         │hit          │hit
//!           ▼            ▼             ▼
//!         return     backfill      backfill
//!                    Cache         Cache ∥ Object
//!
//! create: Store only (first get cold-fills the faster tiers)
//! update: Store, then remove from Cache ∥ Object
//! ```
//!
//! Every operation runs inside the classified retry policy
//! ([`RetryConfig::operation()`] by default).
//!
//! # Example
//!
//! ```rust
//! use tiered_store::{TieredStore, TieredStoreConfig, TierSource};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tiered_store::OperationError> {
//! let store = TieredStore::connect(TieredStoreConfig::default()).await?;
//!
//! let created = store.create("hello").await?;
//! let first = store.lookup(&created.id).await?.unwrap();
//! assert_eq!(first.source, TierSource::Store);
//!
//! let second = store.lookup(&created.id).await?.unwrap();
//! assert_eq!(second.source, TierSource::Cache);
//! # Ok(())
//! # }
//! ```

mod types;
mod read;
mod write;

pub use types::{Lookup, TierSource};

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinError;
use tracing::warn;

use crate::config::TieredStoreConfig;
use crate::error::OperationError;
use crate::resilience::retry::{retry_classified, RetryConfig, RetryObserver, TracingRetryObserver};
use crate::storage::factory::{StorageFactory, Tiers};
use crate::storage::traits::{CacheTier, ObjectTier, RecordStore, StorageError};

/// Read-through / write-back orchestrator over the three tiers.
///
/// # Thread Safety
///
/// `TieredStore` is `Send + Sync`. Tiers are shared `Arc<dyn _>` handles and
/// no lock is held across an await; concurrent cold reads of the same id may
/// each backfill (duplicate, identical writes).
pub struct TieredStore {
    pub(super) cache: Arc<dyn CacheTier>,
    pub(super) objects: Arc<dyn ObjectTier>,
    pub(super) records: Arc<dyn RecordStore>,
    pub(super) config: TieredStoreConfig,
    pub(super) retry: RetryConfig,
    pub(super) observer: Arc<dyn RetryObserver>,
}

impl TieredStore {
    /// Assemble a store from already connected tiers.
    ///
    /// The retry policy comes from `config`; retries are reported to
    /// [`TracingRetryObserver`] unless replaced with
    /// [`with_observer`](Self::with_observer).
    pub fn new(
        cache: Arc<dyn CacheTier>,
        objects: Arc<dyn ObjectTier>,
        records: Arc<dyn RecordStore>,
        config: TieredStoreConfig,
    ) -> Self {
        let retry = config.retry_config();
        Self {
            cache,
            objects,
            records,
            config,
            retry,
            observer: Arc::new(TracingRetryObserver),
        }
    }

    pub fn from_tiers(tiers: Tiers, config: TieredStoreConfig) -> Self {
        Self::new(tiers.cache, tiers.objects, tiers.records, config)
    }

    /// Connect the tiers named by `config` (see [`StorageFactory`]).
    pub async fn connect(config: TieredStoreConfig) -> Result<Self, OperationError> {
        let tiers = StorageFactory::connect(&config).await?;
        Ok(Self::from_tiers(tiers, config))
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &TieredStoreConfig {
        &self.config
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn cache(&self) -> &Arc<dyn CacheTier> {
        &self.cache
    }

    pub fn objects(&self) -> &Arc<dyn ObjectTier> {
        &self.objects
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// Run a unit of work under the store's retry policy.
    ///
    /// Storage failures are retried; unauthorized, validation,
    /// invalid-argument and invalid-state failures return immediately.
    ///
    /// ```rust
    /// # use tiered_store::{TieredStore, TieredStoreConfig, OperationError};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), OperationError> {
    /// let store = TieredStore::connect(TieredStoreConfig::default()).await?;
    ///
    /// let err = store
    ///     .execute("report", || async {
    ///         Err::<(), _>(OperationError::Unauthorized("no token".into()))
    ///     })
    ///     .await
    ///     .unwrap_err();
    /// assert!(!err.is_retryable());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute<F, Fut, T>(&self, operation: &str, work: F) -> Result<T, OperationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        retry_classified(operation, &self.retry, self.observer.as_ref(), work).await
    }

    pub(super) fn validate_id(id: &str) -> Result<(), OperationError> {
        if id.trim().is_empty() {
            return Err(OperationError::InvalidArgument("id must not be empty".into()));
        }
        Ok(())
    }

    pub(super) fn validate_value(&self, value: &str) -> Result<(), OperationError> {
        if value.trim().is_empty() {
            return Err(OperationError::Validation("value must not be empty".into()));
        }
        let len = value.chars().count();
        if len > self.config.max_value_len {
            return Err(OperationError::Validation(format!(
                "value must be at most {} characters, got {}",
                self.config.max_value_len, len
            )));
        }
        Ok(())
    }
}

/// Log and count a failed best-effort side effect (backfill, invalidation).
pub(super) fn report_side_effect(
    tier: &'static str,
    operation: &'static str,
    id: &str,
    outcome: Result<Result<(), StorageError>, JoinError>,
) {
    let error = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("task failed: {}", e),
    };
    warn!(tier, operation, id, error = %error, "Best-effort {} of {} tier failed", operation, tier);
    crate::metrics::record_side_effect_failure(tier, operation);
}
