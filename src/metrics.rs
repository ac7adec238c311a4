// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for tiered-store.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `tiered_store_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: cache, object, store
//! - `operation`: get, set, remove, is_valid, create, update, delete
//! - `status`: hit, miss, success, error

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record a tier operation outcome
pub fn record_operation(tier: &str, operation: &str, status: &str) {
    counter!(
        "tiered_store_operations_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(tier: &str, operation: &str, duration: Duration) {
    histogram!(
        "tiered_store_operation_seconds",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a retry scheduled by the resilience wrapper
pub fn record_retry(operation: &str) {
    counter!(
        "tiered_store_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a swallowed backfill/invalidation failure
pub fn record_side_effect_failure(tier: &str, operation: &str) {
    counter!(
        "tiered_store_side_effect_failures_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record expired blobs deleted during a scan
pub fn record_blob_expired(count: usize) {
    counter!("tiered_store_blobs_expired_total").increment(count as u64);
}

/// Timer guard for measuring operation latency
pub struct LatencyTimer {
    tier: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(tier: &'static str, operation: &'static str) -> Self {
        Self {
            tier,
            operation,
            start: Instant::now(),
        }
    }

    /// Time elapsed so far
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.tier, self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder every call is a no-op; these only check
    // the helpers don't panic.

    #[test]
    fn test_record_helpers_without_recorder() {
        record_operation("cache", "get", "hit");
        record_latency("store", "create", Duration::from_millis(3));
        record_retry("get_record");
        record_side_effect_failure("object", "set");
        record_blob_expired(2);
    }

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::new("cache", "get");
        std::thread::sleep(Duration::from_millis(1));
        assert!(timer.elapsed() >= Duration::from_millis(1));
    }
}
