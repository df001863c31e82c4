use crate::metrics::RunTotals;
use crate::models::SkipReason;
use crate::services::CleanupOutcome;
use camino::Utf8PathBuf;
use std::time::Duration;

/// Counts for one walked root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootReport {
    pub root: Utf8PathBuf,
    pub files_scanned: u64,
    pub files_moved: u64,
    pub files_skipped: u64,
    pub moves_failed: u64,
    /// Set when the root's worker died before finishing its walk.
    pub fault: Option<String>,
}

impl RootReport {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub(crate) fn faulted(root: impl Into<Utf8PathBuf>, fault: impl Into<String>) -> Self {
        Self {
            fault: Some(fault.into()),
            ..Self::new(root)
        }
    }
}

/// Everything a finished run reports back to its caller.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub dry_run: bool,
    /// Walked roots, in enumeration order.
    pub roots: Vec<RootReport>,
    pub unavailable_roots: Vec<(Utf8PathBuf, SkipReason)>,
    pub excluded_roots: Vec<Utf8PathBuf>,
    pub totals: RunTotals,
    pub cleanup: CleanupOutcome,
    pub scan_log: Utf8PathBuf,
    pub move_log: Utf8PathBuf,
    pub elapsed: Duration,
}

impl RunSummary {
    /// No failed moves, orphans, lost audit lines, worker faults or cleanup failures.
    pub fn is_clean(&self) -> bool {
        let cleanup_ok = match &self.cleanup {
            CleanupOutcome::Completed(report) => report.is_clean(),
            _ => true,
        };
        self.totals.moves_failed == 0
            && self.totals.orphans == 0
            && self.totals.audit_write_failures == 0
            && self.roots.iter().all(|r| r.fault.is_none())
            && cleanup_ok
    }

    /// Per-root breakdown and log locations. Run totals are logged by the engine.
    pub fn log(&self) {
        for root in &self.roots {
            match &root.fault {
                Some(fault) => tracing::error!("Root {} aborted: {}", root.root, fault),
                None => tracing::info!(
                    "Root {}: {} scanned, {} moved, {} skipped, {} failed",
                    root.root,
                    root.files_scanned,
                    root.files_moved,
                    root.files_skipped,
                    root.moves_failed
                ),
            }
        }
        for (path, reason) in &self.unavailable_roots {
            tracing::warn!("Root {} not scanned: {}", path, reason);
        }

        match &self.cleanup {
            CleanupOutcome::Disabled => {}
            CleanupOutcome::SkippedDryRun => tracing::info!("Auto-delete skipped (dry run)"),
            CleanupOutcome::Completed(report) if !report.is_clean() => tracing::warn!(
                "Auto-delete left {} entries behind",
                report.failures.len()
            ),
            CleanupOutcome::Completed(_) => {}
        }

        tracing::info!("Scan log: {}", self.scan_log);
        tracing::info!("Move log: {}", self.move_log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CleanupReport;

    fn summary() -> RunSummary {
        RunSummary {
            dry_run: false,
            roots: vec![RootReport::new("/data")],
            unavailable_roots: Vec::new(),
            excluded_roots: Vec::new(),
            totals: RunTotals::default(),
            cleanup: CleanupOutcome::Disabled,
            scan_log: Utf8PathBuf::from("/logs/scan.log"),
            move_log: Utf8PathBuf::from("/logs/move.log"),
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_clean_summary() {
        assert!(summary().is_clean());
    }

    #[test]
    fn test_faults_make_summary_unclean() {
        let mut faulted = summary();
        faulted.roots.push(RootReport::faulted("/mnt", "worker panicked"));
        assert!(!faulted.is_clean());

        let mut failed_cleanup = summary();
        failed_cleanup.cleanup = CleanupOutcome::Completed(CleanupReport {
            failures: vec![(Utf8PathBuf::from("/q/x"), "busy".to_string())],
            ..CleanupReport::default()
        });
        assert!(!failed_cleanup.is_clean());

        let mut orphaned = summary();
        orphaned.totals.orphans = 1;
        assert!(!orphaned.is_clean());
    }
}
