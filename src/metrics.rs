// Performance metrics module
//
// Provides lightweight metrics tracking for intake and archive operations

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide intake metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// Concurrent descriptor scans record into the same instance through an
/// `Arc<Metrics>`, and the binary logs a summary on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Candidates that carried the descriptor marker
    pub descriptors_validated: AtomicUsize,

    /// Candidates skipped as invalid or unreadable
    pub descriptors_skipped: AtomicUsize,

    /// Drawables matched across all scans
    pub drawables_counted: AtomicUsize,

    /// Descriptors whose drawable search failed and counted as zero
    pub drawable_search_failures: AtomicUsize,

    /// Addons handed to the loader successfully
    pub addons_loaded: AtomicUsize,

    /// Intake operations the user cancelled
    pub intakes_cancelled: AtomicUsize,

    /// Project files written
    pub projects_exported: AtomicUsize,

    /// Project files unpacked
    pub projects_imported: AtomicUsize,

    /// Time spent packing and unpacking project files in milliseconds
    pub total_archive_time_ms: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            descriptors_validated: AtomicUsize::new(0),
            descriptors_skipped: AtomicUsize::new(0),
            drawables_counted: AtomicUsize::new(0),
            drawable_search_failures: AtomicUsize::new(0),
            addons_loaded: AtomicUsize::new(0),
            intakes_cancelled: AtomicUsize::new(0),
            projects_exported: AtomicUsize::new(0),
            projects_imported: AtomicUsize::new(0),
            total_archive_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_descriptor_validated(&self) {
        self.descriptors_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_descriptor_skipped(&self) {
        self.descriptors_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the drawables matched for one descriptor
    pub fn record_drawables(&self, count: usize) {
        self.drawables_counted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_drawable_search_failure(&self) {
        self.drawable_search_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_addon_loaded(&self) {
        self.addons_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_intake_cancelled(&self) {
        self.intakes_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished export and how long it took
    pub fn record_export(&self, duration: Duration) {
        self.projects_exported.fetch_add(1, Ordering::Relaxed);
        self.record_archive_time(duration);
    }

    /// Record a finished import and how long it took
    pub fn record_import(&self, duration: Duration) {
        self.projects_imported.fetch_add(1, Ordering::Relaxed);
        self.record_archive_time(duration);
    }

    fn record_archive_time(&self, duration: Duration) {
        self.total_archive_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average time per archive operation in milliseconds
    pub fn avg_archive_time_ms(&self) -> f64 {
        let total = self.total_archive_time_ms.load(Ordering::Relaxed);
        let count = self.projects_exported.load(Ordering::Relaxed)
            + self.projects_imported.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Intake Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Descriptors: {} validated, {} skipped",
            self.descriptors_validated.load(Ordering::Relaxed),
            self.descriptors_skipped.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Drawables: {} counted, {} failed searches",
            self.drawables_counted.load(Ordering::Relaxed),
            self.drawable_search_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Addons: {} loaded, {} intakes cancelled",
            self.addons_loaded.load(Ordering::Relaxed),
            self.intakes_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Projects: {} exported, {} imported (avg: {:.2}ms per archive)",
            self.projects_exported.load(Ordering::Relaxed),
            self.projects_imported.load(Ordering::Relaxed),
            self.avg_archive_time_ms()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
