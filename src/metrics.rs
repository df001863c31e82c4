// Run metrics module
//
// Counters shared by every root worker during one purge run

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-run counters.
///
/// Uses atomic operations so root workers can record without locks. The
/// engine snapshots them into a [`RunTotals`] at the end of the run.
#[derive(Debug)]
pub struct RunMetrics {
    /// Regular files that reached a MOVE/SKIP decision
    pub files_scanned: AtomicU64,

    /// Files relocated into quarantine (or that would be, in a dry run)
    pub files_moved: AtomicU64,

    /// Files given a SKIP verdict, including walk-level skips
    pub files_skipped: AtomicU64,

    /// MOVE decisions whose relocation failed
    pub moves_failed: AtomicU64,

    /// Bytes relocated into quarantine
    pub bytes_moved: AtomicU64,

    /// Partial copies left behind in quarantine by a failed move
    pub orphans: AtomicU64,

    /// Audit log lines that could not be written
    pub audit_write_failures: AtomicU64,

    start_time: Instant,
}

/// Plain snapshot of [`RunMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub files_scanned: u64,
    pub files_moved: u64,
    pub files_skipped: u64,
    pub moves_failed: u64,
    pub bytes_moved: u64,
    pub orphans: u64,
    pub audit_write_failures: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            files_scanned: AtomicU64::new(0),
            files_moved: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            moves_failed: AtomicU64::new(0),
            bytes_moved: AtomicU64::new(0),
            orphans: AtomicU64::new(0),
            audit_write_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_scanned(&self) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a relocated file and its size
    pub fn record_moved(&self, bytes: u64) {
        self.files_moved.fetch_add(1, Ordering::Relaxed);
        self.bytes_moved.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed relocation, noting whether it left an orphan copy
    pub fn record_move_failed(&self, left_orphan: bool) {
        self.moves_failed.fetch_add(1, Ordering::Relaxed);
        if left_orphan {
            self.orphans.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_audit_failure(&self) {
        self.audit_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn totals(&self) -> RunTotals {
        RunTotals {
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_moved: self.files_moved.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            moves_failed: self.moves_failed.load(Ordering::Relaxed),
            bytes_moved: self.bytes_moved.load(Ordering::Relaxed),
            orphans: self.orphans.load(Ordering::Relaxed),
            audit_write_failures: self.audit_write_failures.load(Ordering::Relaxed),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let totals = self.totals();
        tracing::info!("=== Run Metrics Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Files: {} scanned, {} moved, {} skipped, {} failed",
            totals.files_scanned,
            totals.files_moved,
            totals.files_skipped,
            totals.moves_failed
        );
        tracing::info!("Bytes moved: {}", totals.bytes_moved);
        if totals.orphans > 0 {
            tracing::warn!("{} partial copies left in quarantine", totals.orphans);
        }
        if totals.audit_write_failures > 0 {
            tracing::warn!("{} audit lines could not be written", totals.audit_write_failures);
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
