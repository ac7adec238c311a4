// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL storage backend for the Record Store.
//!
//! Works against SQLite or MySQL through the sqlx `Any` driver:
//! ```sql
//! CREATE TABLE records (
//!   id VARCHAR(64) PRIMARY KEY,
//!   value TEXT NOT NULL,
//!   created_at BIGINT NOT NULL,  -- epoch millis
//!   updated_at BIGINT            -- epoch millis, NULL if never updated
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! Timestamps are stored as epoch millis because the `Any` driver has no
//! portable datetime mapping. MySQL TEXT columns come back as bytes through
//! `Any`, so text columns are read as `String` first, then as `Vec<u8>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::sync::Once;
use std::time::Duration;

use crate::record::Record;
use crate::resilience::retry::{retry, retry_classified, RetryConfig, TracingRetryObserver};
use super::traits::{RecordStore, StorageError};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

fn backend_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::Conflict(db.message().to_string())
        }
        _ => StorageError::Backend(e.to_string()),
    }
}

pub struct SqlRecordStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlRecordStore {
    /// Connect with startup-mode retry (fails fast if config is wrong) and
    /// create the `records` table if missing.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(if is_sqlite { 1 } else { 20 })
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool, is_sqlite };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        Ok(store)
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER
            )
            "#
        } else {
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id VARCHAR(64) PRIMARY KEY,
                value TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NULL
            )
            "#
        };

        retry("sql_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(())
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(backend_err)?;

        let count: i64 = row.try_get("cnt").map_err(backend_err)?;
        Ok(count as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM records WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.is_some())
    }
}

/// Read a text column as `String` (SQLite TEXT) or bytes (MySQL TEXT via `Any`).
fn text_column(row: &AnyRow, column: &str) -> Option<String> {
    row.try_get::<String, _>(column).ok().or_else(|| {
        row.try_get::<Vec<u8>, _>(column)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    })
}

fn from_millis(column: &str, millis: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Serialization(format!("{} out of range: {}", column, millis)))
}

fn row_to_record(id: &str, row: &AnyRow) -> Result<Record, StorageError> {
    let value = text_column(row, "value")
        .ok_or_else(|| StorageError::Serialization(format!("No value in row for '{}'", id)))?;
    let created_at: i64 = row.try_get("created_at").map_err(backend_err)?;
    let updated_at: Option<i64> = row.try_get("updated_at").ok().flatten();

    Ok(Record {
        id: id.to_string(),
        value,
        created_at: from_millis("created_at", created_at)?,
        updated_at: updated_at.map(|ms| from_millis("updated_at", ms)).transpose()?,
    })
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Record>, StorageError> {
        retry_classified("sql_get", &RetryConfig::query(), &TracingRetryObserver, || async {
            let row = sqlx::query("SELECT value, created_at, updated_at FROM records WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend_err)?;

            row.map(|row| row_to_record(id, &row)).transpose()
        })
        .await
    }

    async fn create(&self, record: &Record) -> Result<Record, StorageError> {
        let created_at = record.created_at.timestamp_millis();
        let updated_at = record.updated_at.map(|t| t.timestamp_millis());

        retry_classified("sql_create", &RetryConfig::query(), &TracingRetryObserver, || async {
            sqlx::query("INSERT INTO records (id, value, created_at, updated_at) VALUES (?, ?, ?, ?)")
                .bind(&record.id)
                .bind(&record.value)
                .bind(created_at)
                .bind(updated_at)
                .execute(&self.pool)
                .await
                .map_err(backend_err)?;
            Ok::<_, StorageError>(())
        })
        .await?;

        Ok(record.clone())
    }

    async fn update(&self, record: &Record) -> Result<Option<Record>, StorageError> {
        let created_at = record.created_at.timestamp_millis();
        let updated_at = record.updated_at.map(|t| t.timestamp_millis());

        let affected = retry_classified("sql_update", &RetryConfig::query(), &TracingRetryObserver, || async {
            let result = sqlx::query("UPDATE records SET value = ?, created_at = ?, updated_at = ? WHERE id = ?")
                .bind(&record.value)
                .bind(created_at)
                .bind(updated_at)
                .bind(&record.id)
                .execute(&self.pool)
                .await
                .map_err(backend_err)?;
            Ok::<_, StorageError>(result.rows_affected())
        })
        .await?;

        // MySQL reports 0 affected rows when nothing changed, so confirm a miss
        if affected == 0 && !self.exists(&record.id).await? {
            return Ok(None);
        }
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        retry_classified("sql_delete", &RetryConfig::query(), &TracingRetryObserver, || async {
            let result = sqlx::query("DELETE FROM records WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(backend_err)?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}
