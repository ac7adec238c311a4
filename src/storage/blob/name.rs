// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Object names with an embedded expiry.
//!
//! Format: `{key}_{yyyyMMddHHmmss}.json`, timestamp in UTC. The fixed-width
//! timestamp sorts lexicographically in expiry order.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use tiered_store::storage::blob::name::{encode, parse_expiry};
//!
//! let expiry = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 0).unwrap();
//! let name = encode("abc", expiry);
//! assert_eq!(name, "abc_20250309140500.json");
//! assert_eq!(parse_expiry(&name), Some(expiry));
//! ```

use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};

pub const EXPIRY_FORMAT: &str = "%Y%m%d%H%M%S";
pub const EXTENSION: &str = ".json";
const EXPIRY_WIDTH: usize = 14;
/// Last year `%Y` renders in four digits.
const MAX_EXPIRY_YEAR: i32 = 9999;

/// How a listed object name relates to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// A version of this key expiring at the given instant
    Owned { expires_at: DateTime<Utc> },
    /// Under this key's prefix with no further `_`, but the expiry segment
    /// does not parse. Never valid; only removed on write or explicit remove.
    Unparseable,
    /// Shares the prefix but belongs to another key (e.g. `abc_def_...` for `abc`)
    Foreign,
}

impl Ownership {
    #[must_use]
    pub fn is_owned(&self) -> bool {
        !matches!(self, Ownership::Foreign)
    }
}

/// Listing prefix for all versions of `key`.
#[must_use]
pub fn prefix(key: &str) -> String {
    format!("{}_", key)
}

/// Object name for `key` expiring at `expires_at` (second precision).
#[must_use]
pub fn encode(key: &str, expires_at: DateTime<Utc>) -> String {
    format!("{}_{}{}", key, expires_at.format(EXPIRY_FORMAT), EXTENSION)
}

/// `now + ttl`, or `None` when the sum overflows or lands past year 9999,
/// where the timestamp would no longer be 14 digits.
#[must_use]
pub fn expiry_after(now: DateTime<Utc>, ttl: TimeDelta) -> Option<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .filter(|at| (0..=MAX_EXPIRY_YEAR).contains(&at.year()))
}

/// Extract the expiry from an object name.
///
/// The timestamp is the segment between the last `_` and the last `.`;
/// anything that is not exactly 14 digits forming a real date yields `None`.
#[must_use]
pub fn parse_expiry(name: &str) -> Option<DateTime<Utc>> {
    let underscore = name.rfind('_')?;
    let dot = name.rfind('.')?;
    if underscore >= dot {
        return None;
    }

    let stamp = &name[underscore + 1..dot];
    if stamp.len() != EXPIRY_WIDTH || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDateTime::parse_from_str(stamp, EXPIRY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Classify `name` relative to `key`.
#[must_use]
pub fn inspect(key: &str, name: &str) -> Ownership {
    let Some(rest) = name.strip_prefix(key).and_then(|r| r.strip_prefix('_')) else {
        return Ownership::Foreign;
    };
    if rest.contains('_') {
        return Ownership::Foreign;
    }

    match parse_expiry(name) {
        Some(expires_at) => Ownership::Owned { expires_at },
        None => Ownership::Unparseable,
    }
}

/// Keys become path-like object names, so they must be a single safe segment.
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("key must not be empty".into());
    }
    if key.starts_with('.') || key.contains(['/', '\\']) || key.chars().any(char::is_control) {
        return Err(format!("key '{}' is not a valid object name segment", key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_expiry_after_stays_encodable() {
        let now = at(2025, 10, 19, 12, 0, 0);

        assert_eq!(expiry_after(now, TimeDelta::seconds(60)), Some(at(2025, 10, 19, 12, 1, 0)));
        assert_eq!(
            expiry_after(now, at(9999, 12, 31, 23, 59, 59) - now),
            Some(at(9999, 12, 31, 23, 59, 59))
        );
        assert_eq!(expiry_after(now, at(9999, 12, 31, 23, 59, 59) - now + TimeDelta::seconds(1)), None);
        assert_eq!(expiry_after(now, TimeDelta::MAX), None);
    }

    #[test]
    fn test_encode_is_fixed_width() {
        assert_eq!(encode("k", at(2025, 1, 2, 3, 4, 5)), "k_20250102030405.json");
        assert_eq!(encode("k", at(2031, 12, 31, 23, 59, 59)), "k_20311231235959.json");
    }

    #[test]
    fn test_encode_drops_sub_second_precision() {
        let expiry = at(2025, 1, 2, 3, 4, 5) + chrono::Duration::milliseconds(999);
        assert_eq!(parse_expiry(&encode("k", expiry)), Some(at(2025, 1, 2, 3, 4, 5)));
    }

    #[test]
    fn test_names_sort_by_expiry() {
        let earlier = encode("k", at(2025, 9, 30, 23, 0, 0));
        let later = encode("k", at(2025, 10, 1, 1, 0, 0));
        assert!(earlier < later);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_expiry("k.json"), None);
        assert_eq!(parse_expiry("k_20250102030405"), None);
        assert_eq!(parse_expiry("k_2025010203040.json"), None);
        assert_eq!(parse_expiry("k_2025010203040x.json"), None);
        assert_eq!(parse_expiry("k_20251302030405.json"), None); // month 13
        assert_eq!(parse_expiry("k.v_20250102030405"), None); // '_' after '.'
    }

    #[test]
    fn test_key_with_underscores_parses_last_segment() {
        let name = encode("a_b", at(2025, 1, 2, 3, 4, 5));
        assert_eq!(parse_expiry(&name), Some(at(2025, 1, 2, 3, 4, 5)));
        assert!(inspect("a_b", &name).is_owned());
    }

    #[test]
    fn test_inspect() {
        let expiry = at(2025, 1, 2, 3, 4, 5);
        assert_eq!(
            inspect("abc", "abc_20250102030405.json"),
            Ownership::Owned { expires_at: expiry }
        );
        assert_eq!(inspect("abc", "abc_garbage.json"), Ownership::Unparseable);
        assert_eq!(inspect("abc", "abc_def_20250102030405.json"), Ownership::Foreign);
        assert_eq!(inspect("abc", "abcd_20250102030405.json"), Ownership::Foreign);
        assert_eq!(inspect("abc", "xyz_20250102030405.json"), Ownership::Foreign);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("64f1c2").is_ok());
        assert!(validate_key("a_b").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key(".hidden").is_err());
    }
}
