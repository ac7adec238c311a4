// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the tiered store coordinator.

use crate::record::Record;

/// Tier a lookup was answered from.
///
/// Determines the backfill applied after the hit: none for
/// [`Cache`](Self::Cache), the cache for [`Object`](Self::Object), and both
/// faster tiers for [`Store`](Self::Store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierSource {
    /// Volatile cache (fastest)
    Cache,
    /// Emulated-TTL object tier
    Object,
    /// Record Store (source of truth)
    Store,
}

impl TierSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Object => "object",
            Self::Store => "store",
        }
    }
}

impl std::fmt::Display for TierSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "Cache"),
            Self::Object => write!(f, "Object"),
            Self::Store => write!(f, "Store"),
        }
    }
}

/// A record together with the tier it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub record: Record,
    pub source: TierSource,
}

impl Lookup {
    #[must_use]
    pub fn into_record(self) -> Record {
        self.record
    }
}
