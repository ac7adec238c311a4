// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-store usage example.
//!
//! Demonstrates:
//! 1. Building a store over in-memory cache, a directory-backed Object Tier
//!    and a SQLite Record Store
//! 2. Creating a record
//! 3. Reading it back through each tier
//! 4. Updating it and watching the faster tiers get invalidated
//! 5. Rejected input (no retries)
//! 6. Displaying metrics (OTEL-compatible)
//!
//! Nothing external needs to be running; everything lives in a temp dir.
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tiered_store::{CacheTier, OperationError, TieredStore, TieredStoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures all metrics for OTEL export)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           tiered-store: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and connect
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Configuring tiered-store...");

    let dir = tempfile::tempdir()?;
    let blob_root = dir.path().join("objects");
    let config = TieredStoreConfig {
        // No redis_url: the Cache Tier falls back to memory
        sql_url: Some(format!("sqlite://{}/records.db?mode=rwc", dir.path().display())),
        blob_root: Some(blob_root.display().to_string()),
        cache_ttl_ms: 60_000,
        object_ttl_ms: 300_000,
        enable_logging: true,
        ..Default::default()
    };

    let store = TieredStore::connect(config).await?;
    println!("✅ Connected (cache=memory, objects={}, records=sqlite)\n", blob_root.display());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Create
    // ─────────────────────────────────────────────────────────────────────────
    println!("📝 Creating a record...");
    let record = store.create("hello tiers").await?;
    println!("   └─ id={} value={:?}\n", record.id, record.value);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read through the tiers
    // ─────────────────────────────────────────────────────────────────────────
    println!("🔍 Reading it back...");
    for attempt in 1..=2 {
        match store.lookup(&record.id).await? {
            Some(found) => println!(
                "   └─ read #{}: {:?} from {}",
                attempt, found.record.value, found.source
            ),
            None => println!("   └─ read #{}: not found", attempt),
        }
    }

    // One shard directory per key
    let shard = blob_root.join(&record.id);
    let objects: Vec<_> = std::fs::read_dir(&shard)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    println!("   └─ objects on disk: {:?}\n", objects);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Update
    // ─────────────────────────────────────────────────────────────────────────
    println!("✏️  Updating the record...");
    if let Some(updated) = store.update(&record.id, "hello again").await? {
        println!("   └─ updated_at={:?}", updated.updated_at);
    }
    let cached = store.cache().get(&tiered_store::cache_key(&record.id)).await?;
    println!("   └─ cache after update: {:?}", cached.map(|r| r.value));

    if let Some(found) = store.lookup(&record.id).await? {
        println!("   └─ next read: {:?} from {}\n", found.record.value, found.source);
    }

    let missing = store.update("no-such-id", "anything").await?;
    println!("   └─ update of unknown id: {:?}\n", missing);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Rejected input
    // ─────────────────────────────────────────────────────────────────────────
    println!("🚫 Submitting invalid input...");
    match store.create("   ").await {
        Err(OperationError::Validation(msg)) => println!("   └─ validation: {}", msg),
        other => println!("   └─ unexpected: {:?}", other),
    }
    match store.get("").await {
        Err(err) => println!("   └─ {} (retryable={})\n", err, err.is_retryable()),
        Ok(found) => println!("   └─ unexpected: {:?}\n", found),
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("📊 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n✨ Done!\n");
    Ok(())
}

/// Dump all captured metrics in OTEL-compatible format
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let max = samples.iter().map(|v| v.into_inner()).fold(0.0, f64::max);
                histograms.push((name, label_str, count, sum, max));
            }
        }
    }

    counters.sort();
    gauges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    histograms.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }

    if !gauges.is_empty() {
        println!("   ├─ Gauges (current value)");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.2}", name, labels, value);
        }
    }

    if !histograms.is_empty() {
        println!("   └─ Histograms (seconds)");
        for (name, labels, count, sum, max) in &histograms {
            let avg = if *count > 0 { sum / *count as f64 } else { 0.0 };
            println!("      └─ {}{} count={} avg={:.6} max={:.6}", name, labels, count, avg, max);
        }
    }

    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
