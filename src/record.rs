// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record data structure.
//!
//! The [`Record`] is the keyed unit that flows through every tier. The Record
//! Store owns it; the Cache and Object tiers only ever hold copies.
//!
//! # Example
//!
//! ```
//! use tiered_store::Record;
//!
//! let record = Record::new("hello");
//! assert_eq!(record.value, "hello");
//! assert_eq!(record.cache_key(), format!("data:{}", record.id));
//! assert_eq!(record.updated_at, Some(record.created_at));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix used to derive cache keys from record ids.
pub const CACHE_KEY_PREFIX: &str = "data:";

/// Derive the Cache Tier key for a record id (`"data:" + id`).
#[inline]
#[must_use]
pub fn cache_key(id: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, id)
}

/// A keyed value with creation and update timestamps.
///
/// Serialized as camelCase JSON (`{"id", "value", "createdAt", "updatedAt"}`),
/// which is also the payload format of the Object Tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Opaque, globally unique, immutable once created
    pub id: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every write
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Create a new record with a freshly generated id.
    ///
    /// `created_at` and `updated_at` are both set to the current instant.
    pub fn new(value: impl Into<String>) -> Self {
        Self::with_id(new_record_id(), value)
    }

    /// Create a new record with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, value: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            value: value.into(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// Build the successor of this record: same id and `created_at`,
    /// new value, refreshed `updated_at`.
    #[must_use]
    pub fn revised(&self, value: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            value: value.into(),
            created_at: self.created_at,
            updated_at: Some(now_millis()),
        }
    }

    /// Cache Tier key for this record.
    #[must_use]
    pub fn cache_key(&self) -> String {
        cache_key(&self.id)
    }
}

/// Generate a new record id (UUID v4, simple form).
#[must_use]
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Current time truncated to millisecond precision.
///
/// Truncation keeps records byte-identical across tiers that persist
/// timestamps as epoch millis (SQL) and tiers that keep the full value.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
