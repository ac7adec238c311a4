// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with classified failures.
//!
//! Any fallible unit of work can be wrapped. Failures are classified as
//! retryable or not; only retryable ones are attempted again, after a delay
//! computed from the [`Backoff`] of the active [`RetryConfig`].
//!
//! # Example
//!
//! ```
//! use tiered_store::RetryConfig;
//! use std::time::Duration;
//!
//! // Operations: 3 retries, 500ms / 1000ms / 1500ms
//! let op = RetryConfig::operation();
//! assert_eq!(op.max_retries, Some(3));
//! assert_eq!(op.delay_for(2), Duration::from_millis(1000));
//!
//! // Startup: exponential, fail fast on bad config
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_retries, Some(5));
//! ```

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::OperationError;
use crate::storage::traits::StorageError;

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `initial_delay * n` before retry `n`
    Linear,
    /// `initial_delay * factor^(n-1)` before retry `n`
    Exponential { factor: f64 },
}

/// Configuration for operation retry behavior.
///
/// Use the preset constructors for common patterns:
/// - [`RetryConfig::operation()`] - Classified retry around each public operation
/// - [`RetryConfig::startup()`] - Fast-fail for initial connections
/// - [`RetryConfig::query()`] - Quick retry for a single backend call
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
    /// Additional attempts after the first one (`None` = retry forever)
    pub max_retries: Option<usize>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::operation()
    }
}

impl RetryConfig {
    /// Retry policy applied to get/create/update.
    /// 3 retries with linear delays of 500ms, 1000ms, 1500ms.
    #[must_use]
    pub fn operation() -> Self {
        Self::linear(3, Duration::from_millis(500))
    }

    /// Linear policy with `max_retries` retries, waiting `base * n` before retry `n`.
    #[must_use]
    pub fn linear(max_retries: usize, base: Duration) -> Self {
        Self {
            max_retries: Some(max_retries),
            initial_delay: base,
            max_delay: base.saturating_mul(max_retries.max(1) as u32),
            backoff: Backoff::Linear,
        }
    }

    /// Fast-fail retry for initial startup connection.
    /// Attempts 5 retries with exponential backoff, failing after ~5 seconds.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_retries: Some(5),
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            backoff: Backoff::Exponential { factor: 2.0 },
        }
    }

    /// Quick retry for individual backend calls. The operation-level policy
    /// sits on top of this, so keep it short.
    #[must_use]
    pub fn query() -> Self {
        Self {
            max_retries: Some(2),
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            backoff: Backoff::Exponential { factor: 2.0 },
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_retries: Some(3),
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff: Backoff::Exponential { factor: 2.0 },
        }
    }

    /// Delay to wait before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: usize) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.initial_delay.saturating_mul(retry as u32),
            Backoff::Exponential { factor } => {
                let exp = i32::try_from(retry - 1).unwrap_or(i32::MAX);
                let secs = self.initial_delay.as_secs_f64() * factor.powi(exp);
                if secs.is_finite() {
                    Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
                } else {
                    self.max_delay
                }
            }
        };
        delay.min(self.max_delay)
    }
}

/// Emitted before every retry wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    /// Retry number, 1 for the first retry (i.e. attempt `n + 1` follows)
    pub attempt: usize,
    /// Delay about to be waited
    pub delay: Duration,
    /// Operation identifier
    pub operation: String,
    /// Classified kind of the failure that triggered the retry
    pub kind: &'static str,
    pub error: String,
}

/// Receives retry events.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, event: &RetryEvent);
}

/// Default observer: a `warn!` line and a retry counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_retry(&self, event: &RetryEvent) {
        warn!(
            operation = %event.operation,
            attempt = event.attempt,
            delay_ms = event.delay.as_millis() as u64,
            kind = event.kind,
            "Retry {} for operation '{}' in {:?}: {}",
            event.attempt, event.operation, event.delay, event.error
        );
        crate::metrics::record_retry(&event.operation);
    }
}

/// Observer that keeps every event, then forwards to [`TracingRetryObserver`].
#[derive(Debug, Default)]
pub struct RetryRecorder {
    events: Mutex<Vec<RetryEvent>>,
}

impl RetryRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<RetryEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl RetryObserver for RetryRecorder {
    fn on_retry(&self, event: &RetryEvent) {
        self.events.lock().push(event.clone());
        TracingRetryObserver.on_retry(event);
    }
}

/// Failure classification used by [`retry_classified`].
pub trait Classify {
    fn is_retryable(&self) -> bool;
    fn kind(&self) -> &'static str;
}

impl Classify for OperationError {
    fn is_retryable(&self) -> bool {
        OperationError::is_retryable(self)
    }

    fn kind(&self) -> &'static str {
        OperationError::kind(self).as_str()
    }
}

impl Classify for StorageError {
    fn is_retryable(&self) -> bool {
        !matches!(self, StorageError::Conflict(_))
    }

    fn kind(&self) -> &'static str {
        match self {
            StorageError::Conflict(_) => "conflict",
            _ => "storage",
        }
    }
}

/// Retry every failure (connection setup and raw backend calls).
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with(operation_name, config, &TracingRetryObserver, |_| Some("error"), operation).await
}

/// Retry failures for which `should_retry` returns `true`; others fail immediately.
pub async fn retry_if<F, Fut, T, E, P>(
    operation_name: &str,
    config: &RetryConfig,
    observer: &dyn RetryObserver,
    should_retry: P,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    retry_with(
        operation_name,
        config,
        observer,
        |err| should_retry(err).then_some("error"),
        operation,
    )
    .await
}

/// Retry using the error's own [`Classify`] implementation.
pub async fn retry_classified<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    observer: &dyn RetryObserver,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + Classify,
{
    retry_with(
        operation_name,
        config,
        observer,
        |err| err.is_retryable().then(|| err.kind()),
        operation,
    )
    .await
}

async fn retry_with<F, Fut, T, E, C>(
    operation_name: &str,
    config: &RetryConfig,
    observer: &dyn RetryObserver,
    classify: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: Fn(&E) -> Option<&'static str>,
{
    let mut attempt = 1usize;

    loop {
        match operation().await {
            Ok(val) => {
                if attempt > 1 {
                    info!("Operation '{}' succeeded after {} retries", operation_name, attempt - 1);
                }
                return Ok(val);
            }
            Err(err) => {
                let Some(kind) = classify(&err) else {
                    debug!("Operation '{}' failed with non-retryable error: {}", operation_name, err);
                    return Err(err);
                };

                if let Some(max) = config.max_retries {
                    if attempt > max {
                        warn!(
                            "Operation '{}' failed after {} attempts, giving up: {}",
                            operation_name, attempt, err
                        );
                        return Err(err);
                    }
                }

                let delay = config.delay_for(attempt);
                observer.on_retry(&RetryEvent {
                    attempt,
                    delay,
                    operation: operation_name.to_string(),
                    kind,
                    error: err.to_string(),
                });

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
