//! Session metrics tracking.
//!
//! Counters for connection attempts, record traffic and decode outcomes,
//! updated lock-free from the session's worker tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Metrics for a single operation type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationMetrics {
    /// Total number of completed operations.
    pub count: u64,
    /// Number of successful operations.
    pub success_count: u64,
    /// Number of failed operations.
    pub failure_count: u64,
    /// Total duration of all operations.
    pub total_duration_ms: u64,
    /// Minimum operation duration.
    pub min_duration_ms: Option<u64>,
    /// Maximum operation duration.
    pub max_duration_ms: Option<u64>,
    /// Average operation duration.
    pub avg_duration_ms: Option<f64>,
}

/// Thread-safe atomic operation metrics tracker.
#[derive(Debug)]
pub struct AtomicOperationMetrics {
    count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_duration_ms: AtomicU64,
    min_duration_ms: AtomicU64,
    max_duration_ms: AtomicU64,
}

impl Default for AtomicOperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicOperationMetrics {
    /// Create new empty metrics.
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            min_duration_ms: AtomicU64::new(u64::MAX),
            max_duration_ms: AtomicU64::new(0),
        }
    }

    /// Record a successful operation.
    pub fn record_success(&self, duration: Duration) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.record(duration);
    }

    /// Record a failed operation.
    pub fn record_failure(&self, duration: Duration) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.record(duration);
    }

    fn record(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_duration_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_duration_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// Get a snapshot of the current metrics.
    pub fn snapshot(&self) -> OperationMetrics {
        let count = self.count.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);
        let min = self.min_duration_ms.load(Ordering::Relaxed);
        let max = self.max_duration_ms.load(Ordering::Relaxed);

        OperationMetrics {
            count,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            total_duration_ms,
            min_duration_ms: (min != u64::MAX).then_some(min),
            max_duration_ms: (count > 0).then_some(max),
            avg_duration_ms: (count > 0).then(|| total_duration_ms as f64 / count as f64),
        }
    }
}

/// Counters for one session manager.
#[derive(Debug, Default)]
pub struct AtomicSessionMetrics {
    /// Stream open attempts that ran to completion (cancelled ones excluded).
    pub connect: AtomicOperationMetrics,
    connect_requests: AtomicU64,
    cancelled_attempts: AtomicU64,
    connection_losses: AtomicU64,
    records: AtomicU64,
    readings: AtomicU64,
    decode_errors: AtomicU64,
    field_misses: AtomicU64,
    oversized_records: AtomicU64,
}

impl AtomicSessionMetrics {
    /// Create new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_connect_request(&self) {
        self.connect_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled_attempt(&self) {
        self.cancelled_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection_lost(&self) {
        self.connection_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_line(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reading(&self, field_misses: usize) {
        self.readings.fetch_add(1, Ordering::Relaxed);
        self.field_misses
            .fetch_add(field_misses as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oversized(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
        self.oversized_records.fetch_add(1, Ordering::Relaxed);
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a serializable snapshot.
    pub fn snapshot(&self) -> SessionMetrics {
        SessionMetrics {
            connect_requests: self.connect_requests.load(Ordering::Relaxed),
            connect: self.connect.snapshot(),
            cancelled_attempts: self.cancelled_attempts.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            readings: self.readings.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            field_misses: self.field_misses.load(Ordering::Relaxed),
            oversized_records: self.oversized_records.load(Ordering::Relaxed),
        }
    }
}

/// Serializable summary of session metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Calls to `connect` and `attach`.
    pub connect_requests: u64,
    /// Completed stream open attempts.
    pub connect: OperationMetrics,
    /// Attempts or connections superseded by `connect` or `stop`.
    pub cancelled_attempts: u64,
    /// Open streams that failed or were closed by the device.
    pub connection_losses: u64,
    /// Records read from the stream, including rejected ones.
    pub records: u64,
    /// Records decoded into readings.
    pub readings: u64,
    /// Records rejected by the decoder (including oversized ones).
    pub decode_errors: u64,
    /// Fields that fell back to their default in accepted records.
    pub field_misses: u64,
    /// Records dropped for exceeding the line length cap.
    pub oversized_records: u64,
}
