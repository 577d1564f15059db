//! Queue metrics
//!
//! Lock-free counters updated by the facade and the processor, exposed as a
//! serializable snapshot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Queue metrics for monitoring
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub total_enqueued: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_retried: AtomicU64,
    pub total_dropped: AtomicU64,
    pub total_cancelled: AtomicU64,
    pub total_skipped: AtomicU64,
    pub passes: AtomicU64,
    pub persistence_operations: AtomicU64,
    pub persistence_failures: AtomicU64,
    pub current_size: AtomicUsize,
    pub queue_depth_max: AtomicUsize,
    pub last_operation_time: AtomicU64,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueue(&self) {
        self.total_enqueued.fetch_add(1, AtomicOrdering::Relaxed);
        self.update_last_operation();
    }

    pub fn record_completion(&self) {
        self.total_completed.fetch_add(1, AtomicOrdering::Relaxed);
        self.update_last_operation();
    }

    pub fn record_retry(&self) {
        self.total_retried.fetch_add(1, AtomicOrdering::Relaxed);
        self.update_last_operation();
    }

    /// Record an action dropped after exhausting its retry budget
    pub fn record_drop(&self) {
        self.total_dropped.fetch_add(1, AtomicOrdering::Relaxed);
        self.update_last_operation();
    }

    /// Record an explicit `dequeue`
    pub fn record_cancellation(&self) {
        self.total_cancelled.fetch_add(1, AtomicOrdering::Relaxed);
        self.update_last_operation();
    }

    /// Record an in-flight action whose bookkeeping was skipped because it
    /// was dequeued while executing
    pub fn record_skip(&self) {
        self.total_skipped.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.passes.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_persistence(&self, success: bool) {
        self.persistence_operations.fetch_add(1, AtomicOrdering::Relaxed);
        if !success {
            self.persistence_failures.fetch_add(1, AtomicOrdering::Relaxed);
        }
    }

    /// Update current size
    pub fn update_size(&self, size: usize) {
        self.current_size.store(size, AtomicOrdering::Relaxed);
        self.update_max_depth();
    }

    /// Update maximum depth if current exceeds it
    fn update_max_depth(&self) {
        let current = self.current_size.load(AtomicOrdering::Relaxed);
        self.queue_depth_max.fetch_max(current, AtomicOrdering::Relaxed);
    }

    fn update_last_operation(&self) {
        let now = chrono::Utc::now().timestamp();
        self.last_operation_time
            .store(u64::try_from(now).unwrap_or_default(), AtomicOrdering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            total_enqueued: self.total_enqueued.load(AtomicOrdering::Relaxed),
            total_completed: self.total_completed.load(AtomicOrdering::Relaxed),
            total_retried: self.total_retried.load(AtomicOrdering::Relaxed),
            total_dropped: self.total_dropped.load(AtomicOrdering::Relaxed),
            total_cancelled: self.total_cancelled.load(AtomicOrdering::Relaxed),
            total_skipped: self.total_skipped.load(AtomicOrdering::Relaxed),
            passes: self.passes.load(AtomicOrdering::Relaxed),
            persistence_operations: self.persistence_operations.load(AtomicOrdering::Relaxed),
            persistence_failures: self.persistence_failures.load(AtomicOrdering::Relaxed),
            current_size: self.current_size.load(AtomicOrdering::Relaxed),
            queue_depth_max: self.queue_depth_max.load(AtomicOrdering::Relaxed),
            last_operation_time: self.last_operation_time.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetricsSnapshot {
    pub total_enqueued: u64,
    pub total_completed: u64,
    pub total_retried: u64,
    pub total_dropped: u64,
    pub total_cancelled: u64,
    pub total_skipped: u64,
    pub passes: u64,
    pub persistence_operations: u64,
    pub persistence_failures: u64,
    pub current_size: usize,
    pub queue_depth_max: usize,
    pub last_operation_time: u64,
}

impl QueueMetricsSnapshot {
    /// Share of persistence writes that failed, in `[0.0, 1.0]`
    pub fn persistence_failure_rate(&self) -> f64 {
        if self.persistence_operations == 0 {
            return 0.0;
        }
        self.persistence_failures as f64 / self.persistence_operations as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_snapshot() {
        let metrics = QueueMetrics::new();
        metrics.record_enqueue();
        metrics.record_enqueue();
        metrics.record_completion();
        metrics.record_retry();
        metrics.record_drop();
        metrics.record_cancellation();
        metrics.record_skip();
        metrics.record_pass();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_enqueued, 2);
        assert_eq!(snapshot.total_completed, 1);
        assert_eq!(snapshot.total_retried, 1);
        assert_eq!(snapshot.total_dropped, 1);
        assert_eq!(snapshot.total_cancelled, 1);
        assert_eq!(snapshot.total_skipped, 1);
        assert_eq!(snapshot.passes, 1);
        assert!(snapshot.last_operation_time > 0);
    }

    #[test]
    fn max_depth_tracks_high_water_mark() {
        let metrics = QueueMetrics::new();
        metrics.update_size(3);
        metrics.update_size(7);
        metrics.update_size(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.current_size, 2);
        assert_eq!(snapshot.queue_depth_max, 7);
    }

    #[test]
    fn persistence_failure_rate() {
        let metrics = QueueMetrics::new();
        assert!(metrics.snapshot().persistence_failure_rate().abs() < f64::EPSILON);

        metrics.record_persistence(true);
        metrics.record_persistence(false);
        metrics.record_persistence(true);
        metrics.record_persistence(false);

        let rate = metrics.snapshot().persistence_failure_rate();
        assert!((rate - 0.5).abs() < f64::EPSILON);
    }
}
