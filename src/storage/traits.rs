// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage contracts for the three tiers plus the raw blob backend.
//!
//! All contracts are `Send + Sync`: implementations are shared across
//! concurrent operations and own their connection safety.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::Record;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid object name '{0}'")]
    InvalidName(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Volatile key/value tier with native per-key expiry.
#[async_trait]
pub trait CacheTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Record>, StorageError>;
    async fn set(&self, key: &str, record: &Record, ttl: Duration) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Durable tier whose expiry is emulated by the implementation.
#[async_trait]
pub trait ObjectTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Record>, StorageError>;
    async fn set(&self, key: &str, record: &Record, ttl: Duration) -> Result<(), StorageError>;

    /// Existence probe. Performs the same lazy cleanup as `get`.
    async fn is_valid(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove every version stored for `key`.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Authoritative system of record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Record>, StorageError>;
    async fn create(&self, record: &Record) -> Result<Record, StorageError>;

    /// Replace the stored record with the same id.
    /// Returns `None` when no record matches.
    async fn update(&self, record: &Record) -> Result<Option<Record>, StorageError>;

    /// Returns `true` if a record was deleted.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

/// Raw named-object store without expiry semantics (Azure Blob, S3,
/// a local directory...). The emulated-TTL logic lives above this.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError>;
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Names starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Returns `true` if the object existed.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        assert_eq!(
            StorageError::Backend("connection reset".into()).to_string(),
            "Storage backend error: connection reset"
        );
        assert_eq!(
            StorageError::InvalidName("a/b".into()).to_string(),
            "Invalid object name 'a/b'"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<Record>("not json").unwrap_err();
        let storage: StorageError = err.into();
        assert!(matches!(storage, StorageError::Serialization(_)));
    }
}
