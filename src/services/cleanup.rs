use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// What the post-run cleaner did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// `auto_delete` was off.
    Disabled,
    /// Dry run; the quarantine tree is never touched.
    SkippedDryRun,
    Completed(CleanupReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed_files: usize,
    pub removed_dirs: usize,
    /// Files kept because they have not yet served the grace period.
    pub retained: usize,
    /// Paths that could not be removed. Partial cleanup is not retried.
    pub failures: Vec<(Utf8PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Permanently deletes quarantine contents after a run.
///
/// Runs only with `auto_delete = true` and `dry_run = false`. The quarantine
/// root itself is kept; only its contents go. With a grace period, only files
/// quarantined longer ago than the period are removed, and files whose
/// quarantine time cannot be established are kept.
#[derive(Debug, Clone)]
pub struct PostRunCleaner {
    quarantine_root: Utf8PathBuf,
    grace: Option<Duration>,
}

impl PostRunCleaner {
    pub fn new(quarantine_root: impl Into<Utf8PathBuf>, grace: Option<Duration>) -> Self {
        Self {
            quarantine_root: quarantine_root.into(),
            grace,
        }
    }

    pub fn clean(&self, auto_delete: bool, dry_run: bool) -> CleanupOutcome {
        if !auto_delete {
            return CleanupOutcome::Disabled;
        }
        if dry_run {
            tracing::info!("Dry run: auto-delete of {} skipped", self.quarantine_root);
            return CleanupOutcome::SkippedDryRun;
        }

        let report = match self.grace {
            None => self.remove_all(),
            Some(grace) => self.remove_expired(grace, SystemTime::now()),
        };

        for (path, reason) in &report.failures {
            tracing::warn!("Failed to delete {}: {}", path, reason);
        }
        tracing::info!(
            "Quarantine cleanup: {} files and {} directories removed, {} retained, {} failures",
            report.removed_files,
            report.removed_dirs,
            report.retained,
            report.failures.len()
        );

        CleanupOutcome::Completed(report)
    }

    fn remove_all(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let entries = match fs::read_dir(&self.quarantine_root) {
            Ok(entries) => entries,
            Err(err) => {
                report
                    .failures
                    .push((self.quarantine_root.clone(), err.to_string()));
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    report
                        .failures
                        .push((self.quarantine_root.clone(), err.to_string()));
                    continue;
                }
            };
            let path = utf8_lossy(&entry.path());
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

            if is_dir {
                let files = count_files(&path);
                match fs::remove_dir_all(&path) {
                    Ok(()) => {
                        report.removed_files += files;
                        report.removed_dirs += 1;
                    }
                    Err(err) => report.failures.push((path, err.to_string())),
                }
            } else {
                match fs::remove_file(&path) {
                    Ok(()) => report.removed_files += 1,
                    Err(err) => report.failures.push((path, err.to_string())),
                }
            }
        }

        report
    }

    fn remove_expired(&self, grace: Duration, now: SystemTime) -> CleanupReport {
        let mut report = CleanupReport::default();

        for result in WalkDir::new(self.quarantine_root.as_std_path())
            .min_depth(1)
            .contents_first(true)
        {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(utf8_lossy).unwrap_or_default();
                    report.failures.push((path, err.to_string()));
                    continue;
                }
            };
            let path = utf8_lossy(entry.path());

            if entry.file_type().is_dir() {
                // Fails harmlessly while retained files remain inside.
                if fs::remove_dir(&path).is_ok() {
                    report.removed_dirs += 1;
                }
                continue;
            }

            let expired = entry
                .metadata()
                .ok()
                .and_then(|meta| quarantined_at(&meta))
                .and_then(|at| now.duration_since(at).ok())
                .is_some_and(|dwell| dwell >= grace);

            if !expired {
                report.retained += 1;
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => report.removed_files += 1,
                Err(err) => report.failures.push((path, err.to_string())),
            }
        }

        report
    }
}

/// When the file entered quarantine. Rename and copy both update the inode
/// change time on Unix; no equivalent exists elsewhere.
#[cfg(unix)]
fn quarantined_at(meta: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    let secs = u64::try_from(meta.ctime()).ok()?;
    let nanos = u32::try_from(meta.ctime_nsec()).unwrap_or(0);
    SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn quarantined_at(_meta: &fs::Metadata) -> Option<SystemTime> {
    None
}

fn count_files(dir: &Utf8Path) -> usize {
    WalkDir::new(dir.as_std_path())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .count()
}

fn utf8_lossy(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from(path.to_string_lossy().into_owned())
}
