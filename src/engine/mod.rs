//! Run orchestration.
//!
//! A run goes through fixed phases:
//!
//! 1. Create the quarantine root (skipped under dry run) and open the audit logs.
//! 2. Write the `START scan` header and the disk usage report.
//! 3. Enumerate roots; unavailable ones get a `[SKIP]` line.
//! 4. Walk every active root on its own blocking worker, at most
//!    `max_workers` at once. Within a root, entries are handled in walk order.
//! 5. Wait for every worker, write the footer and flush both logs.
//! 6. Run the post-run cleaner, only after a successful flush.

mod summary;

pub use summary::{RootReport, RunSummary};

use crate::config::RunConfiguration;
use crate::metrics::RunMetrics;
use crate::models::{FileEntry, ScanRoot, SkipReason};
use crate::services::disk_usage::volume_usage;
use crate::services::roots;
use crate::services::walker::{self, WalkItem};
use crate::services::{
    AuditError, AuditLogger, CleanupOutcome, MoveError, QuarantineMover, RetentionDecision,
    RetentionPolicy, Verdict,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Faults that stop a run. Everything per-file or per-root is reported in
/// the [`RunSummary`] instead.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to create quarantine root {path}: {source}")]
    QuarantineRoot {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("No scan roots available ({unavailable} unavailable, {excluded} excluded)")]
    NoScanRoots { unavailable: usize, excluded: usize },
}

/// Executes purge runs for one frozen [`RunConfiguration`].
#[derive(Debug, Clone)]
pub struct PurgeEngine {
    config: Arc<RunConfiguration>,
}

impl PurgeEngine {
    pub fn new(config: RunConfiguration) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Execute one full run.
    ///
    /// # Errors
    ///
    /// [`RunError`] only for faults that prevent any work: the quarantine
    /// root or the audit logs cannot be set up, or no root can be walked.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let config = &self.config;
        let metrics = Arc::new(RunMetrics::new());
        let started = SystemTime::now();

        if !config.dry_run {
            fs::create_dir_all(&config.quarantine_root).map_err(|source| {
                RunError::QuarantineRoot {
                    path: config.quarantine_root.clone(),
                    source,
                }
            })?;
        }

        let audit = Arc::new(AuditLogger::open(&config.log_dir)?);
        tracing::info!(
            "Starting run: retention {} days, dry run {}, categories [{}]",
            config.retention_days,
            config.dry_run,
            config.selection.names().join(", ")
        );

        let notes = Notes {
            audit: &audit,
            metrics: &metrics,
        };
        notes.write(&format!(
            "START scan: retention {} days, dry run {}, categories [{}]",
            config.retention_days,
            config.dry_run,
            config.selection.names().join(", ")
        ));
        notes.write(&format!("Quarantine directory: {}", config.quarantine_root));
        notes.write(&format!("Log directory: {}", config.log_dir));
        notes.disk_usage("before scan");

        let enumeration = roots::enumerate(config.scan_roots.as_deref(), &config.exclusions);
        for (path, reason) in &enumeration.unavailable {
            notes.scan(Verdict::Skip, path, &reason.to_string());
        }
        let excluded_roots: Vec<Utf8PathBuf> = enumeration
            .roots
            .iter()
            .filter(|r| r.excluded)
            .map(|r| r.path.clone())
            .collect();

        let active: Vec<ScanRoot> = enumeration.active().cloned().collect();
        if active.is_empty() {
            notes.write("END scan: no scan roots available");
            if let Err(err) = audit.flush() {
                tracing::error!("{}", err);
            }
            return Err(RunError::NoScanRoots {
                unavailable: enumeration.unavailable.len(),
                excluded: excluded_roots.len(),
            });
        }

        let worker = Arc::new(RootWorker {
            policy: config.retention_policy(started),
            mover: config.quarantine_mover(),
            config: Arc::clone(&self.config),
            audit: Arc::clone(&audit),
            metrics: Arc::clone(&metrics),
        });
        let reports = run_workers(worker, active, config.max_workers).await;

        let totals = metrics.totals();
        notes.write(&format!(
            "END scan: {} scanned, {} moved, {} skipped, {} failed",
            totals.files_scanned, totals.files_moved, totals.files_skipped, totals.moves_failed
        ));
        notes.disk_usage("after scan");

        // Barrier: the cleaner may only start once both logs are on disk.
        let flushed = match audit.flush() {
            Ok(()) => true,
            Err(err) => {
                metrics.record_audit_failure();
                tracing::error!("Audit flush failed, auto-delete will not run: {}", err);
                false
            }
        };

        let cleanup = if config.auto_delete && !config.dry_run && flushed {
            notes.write(&format!("START quarantine cleanup: {}", config.quarantine_root));
            let outcome = config.post_run_cleaner().clean(true, false);
            if let CleanupOutcome::Completed(report) = &outcome {
                notes.write(&format!(
                    "END quarantine cleanup: {} files and {} directories removed, \
                     {} retained, {} failures",
                    report.removed_files,
                    report.removed_dirs,
                    report.retained,
                    report.failures.len()
                ));
            }
            if let Err(err) = audit.flush() {
                metrics.record_audit_failure();
                tracing::error!("{}", err);
            }
            outcome
        } else if config.auto_delete && config.dry_run {
            config.post_run_cleaner().clean(true, true)
        } else {
            CleanupOutcome::Disabled
        };

        metrics.log_summary();
        let summary = RunSummary {
            dry_run: config.dry_run,
            roots: reports,
            unavailable_roots: enumeration.unavailable,
            excluded_roots,
            totals: metrics.totals(),
            cleanup,
            scan_log: audit.scan_log_path().to_path_buf(),
            move_log: audit.move_log_path().to_path_buf(),
            elapsed: metrics.uptime(),
        };
        Ok(summary)
    }
}

/// Fan roots out to blocking workers and collect their reports in root order.
async fn run_workers(
    worker: Arc<RootWorker>,
    roots: Vec<ScanRoot>,
    max_workers: usize,
) -> Vec<RootReport> {
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut join_set = JoinSet::new();

    for (index, root) in roots.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let worker = Arc::clone(&worker);
        join_set.spawn(async move {
            let path = root.path.clone();
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, RootReport::faulted(path, "worker pool closed"));
            };
            let report = match tokio::task::spawn_blocking(move || worker.process_root(&root)).await
            {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!("Worker for {} failed: {}", path, err);
                    RootReport::faulted(path, err.to_string())
                }
            };
            (index, report)
        });
    }

    let mut reports = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(indexed) => reports.push(indexed),
            Err(err) => tracing::error!("Root task failed: {}", err),
        }
    }
    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}

/// State shared read-only by every root worker.
struct RootWorker {
    config: Arc<RunConfiguration>,
    audit: Arc<AuditLogger>,
    metrics: Arc<RunMetrics>,
    mover: QuarantineMover,
    policy: RetentionPolicy,
}

impl RootWorker {
    fn process_root(&self, root: &ScanRoot) -> RootReport {
        tracing::info!("Scanning {}", root.path);
        let mut report = RootReport::new(root.path.clone());

        let items = walker::walk(
            root,
            &self.config.exclusions,
            &self.config.selection,
            self.config.walk,
        );
        for item in items {
            match item {
                WalkItem::File(entry) => self.process_entry(entry, &mut report),
                WalkItem::Skipped { path, reason } => {
                    tracing::debug!("Skipping {}: {}", path, reason);
                    self.skip(&path, &reason.to_string(), &mut report);
                }
            }
        }

        tracing::info!(
            "Finished {}: {} scanned, {} moved, {} skipped, {} failed",
            root.path,
            report.files_scanned,
            report.files_moved,
            report.files_skipped,
            report.moves_failed
        );
        report
    }

    fn process_entry(&self, entry: FileEntry, report: &mut RootReport) {
        self.metrics.record_scanned();
        report.files_scanned += 1;

        let decision = self.policy.classify(&entry);
        if decision.verdict == Verdict::Skip {
            self.skip(entry.path(), &decision.to_string(), report);
            return;
        }

        let record = self.mover.relocate(&entry);
        match &record.error {
            None => {
                let reason = if record.dry_run {
                    format!("{} (dry run, would move to {})", decision, record.destination)
                } else {
                    decision.to_string()
                };
                self.scan_line(Verdict::Move, entry.path(), &reason);
                self.audit_result(self.audit.record_move(&record));
                self.metrics.record_moved(entry.size);
                report.files_moved += 1;
            }
            Some(err) => {
                tracing::warn!("Failed to quarantine {}: {}", entry.path(), err);
                let (verdict, reason) = failed_move_line(&decision, err);
                match verdict {
                    Verdict::Skip => self.skip(entry.path(), &reason, report),
                    Verdict::Move => {
                        self.scan_line(Verdict::Move, entry.path(), &reason);
                        self.metrics.record_move_failed(err.orphan().is_some());
                        report.moves_failed += 1;
                    }
                }
            }
        }
    }

    fn skip(&self, path: &Utf8Path, reason: &str, report: &mut RootReport) {
        self.scan_line(Verdict::Skip, path, reason);
        self.metrics.record_skipped();
        report.files_skipped += 1;
    }

    fn scan_line(&self, verdict: Verdict, path: &Utf8Path, reason: &str) {
        self.audit_result(self.audit.record_scan(verdict, path, reason));
    }

    /// A lost audit line never undoes the filesystem action already taken.
    fn audit_result(&self, result: Result<(), AuditError>) {
        if let Err(err) = result {
            self.metrics.record_audit_failure();
            tracing::error!("{}", err);
        }
    }
}

/// Scan-log verdict for a MOVE that could not be carried out. A file still
/// locked after the bounded retries becomes SKIP "locked"; any other failure
/// keeps its MOVE verdict with the failure appended.
fn failed_move_line(decision: &RetentionDecision, err: &MoveError) -> (Verdict, String) {
    if err.is_locked() {
        (Verdict::Skip, SkipReason::Locked.to_string())
    } else {
        (Verdict::Move, format!("{}; move failed: {}", decision, err))
    }
}

/// Scan-log notes written by the run itself rather than a root worker.
struct Notes<'a> {
    audit: &'a AuditLogger,
    metrics: &'a RunMetrics,
}

impl Notes<'_> {
    fn write(&self, message: &str) {
        self.check(self.audit.note(message));
    }

    fn scan(&self, verdict: Verdict, path: &Utf8Path, reason: &str) {
        self.check(self.audit.record_scan(verdict, path, reason));
    }

    fn disk_usage(&self, phase: &str) {
        for volume in volume_usage() {
            self.write(&format!("Disk usage {}: {}", phase, volume.summary()));
        }
    }

    fn check(&self, result: Result<(), AuditError>) {
        if let Err(err) = result {
            self.metrics.record_audit_failure();
            tracing::error!("{}", err);
        }
    }
}
