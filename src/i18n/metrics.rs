//! Upload metrics and observability module.
//!
//! This module tracks what uploads did to the change history: changes
//! created, re-flagged or restamped, strings skipped and uploads rejected.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Global upload metrics singleton.
pub struct UploadMetrics {
    /// Number of new changes appended to a history
    changes_created: AtomicUsize,

    /// Number of existing changes that became the last upload again
    changes_reflagged: AtomicUsize,

    /// Number of existing changes given a new stamp and user
    changes_restamped: AtomicUsize,

    /// Number of uploaded strings that could not be placed
    strings_skipped: AtomicUsize,

    /// Number of uploads refused as a whole
    uploads_rejected: AtomicUsize,
}

/// Global metrics instance (initialized lazily)
static METRICS: OnceLock<UploadMetrics> = OnceLock::new();

impl UploadMetrics {
    /// Get the global upload metrics instance.
    pub fn global() -> &'static UploadMetrics {
        METRICS.get_or_init(UploadMetrics::new)
    }

    /// Create a standalone set of counters, all zero.
    pub fn new() -> Self {
        Self {
            changes_created: AtomicUsize::new(0),
            changes_reflagged: AtomicUsize::new(0),
            changes_restamped: AtomicUsize::new(0),
            strings_skipped: AtomicUsize::new(0),
            uploads_rejected: AtomicUsize::new(0),
        }
    }

    pub fn record_created(&self, count: usize) {
        self.changes_created.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_reflagged(&self, count: usize) {
        self.changes_reflagged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_restamped(&self, count: usize) {
        self.changes_restamped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, count: usize) {
        self.strings_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let created = self.changes_created.load(Ordering::Relaxed);
        let reflagged = self.changes_reflagged.load(Ordering::Relaxed);
        let restamped = self.changes_restamped.load(Ordering::Relaxed);

        let touched = created + reflagged + restamped;
        let reuse_rate = if touched > 0 {
            ((reflagged + restamped) as f64 / touched as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            changes_created: created,
            changes_reflagged: reflagged,
            changes_restamped: restamped,
            strings_skipped: self.strings_skipped.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            reuse_rate,
        }
    }
}

impl Default for UploadMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics report containing current upload statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub changes_created: usize,
    pub changes_reflagged: usize,
    pub changes_restamped: usize,
    pub strings_skipped: usize,
    pub uploads_rejected: usize,

    /// Share of touched changes that reused existing history, as a percentage (0-100)
    pub reuse_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_returns_singleton() {
        assert!(std::ptr::eq(UploadMetrics::global(), UploadMetrics::global()));
    }

    #[test]
    fn test_new_report_is_zero() {
        let report = UploadMetrics::new().report();
        assert_eq!(report.changes_created, 0);
        assert_eq!(report.uploads_rejected, 0);
        assert_eq!(report.reuse_rate, 0.0);
    }

    #[test]
    fn test_reuse_rate() {
        let metrics = UploadMetrics::new();

        metrics.record_created(3);
        metrics.record_reflagged(1);
        metrics.record_skipped(2);
        metrics.record_rejected();

        let report = metrics.report();
        assert_eq!(report.changes_created, 3);
        assert_eq!(report.changes_reflagged, 1);
        assert_eq!(report.strings_skipped, 2);
        assert_eq!(report.uploads_rejected, 1);
        assert!((report.reuse_rate - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_serializes() {
        let metrics = UploadMetrics::new();
        metrics.record_restamped(2);
        let json = serde_json::to_string(&metrics.report()).unwrap();
        assert!(json.contains("\"changes_restamped\":2"));
        assert!(json.contains("\"reuse_rate\":100.0"));
    }
}
