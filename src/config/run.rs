use super::ConfigError;
use crate::models::PurgeSettings;
use crate::services::{
    CategoryCatalog, CategorySelection, ExclusionSet, PostRunCleaner, QuarantineMover,
    RetentionPolicy, RetryPolicy, WalkOptions,
};
use crate::services::paths::absolute_normalized;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const QUARANTINE_DIR_NAME: &str = "Quarantine";
const LOGS_DIR_NAME: &str = "Logs";
const SECONDS_PER_DAY: u64 = 86_400;

/// Validated, frozen configuration for one run.
///
/// Built once from [`PurgeSettings`] before any scanning starts and shared
/// read-only with every root worker.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Extension lookup with `all` already expanded.
    pub selection: Arc<CategorySelection>,
    pub retention_days: u64,
    pub quarantine_root: Utf8PathBuf,
    pub log_dir: Utf8PathBuf,
    pub data_dir: Option<Utf8PathBuf>,
    /// User exclusions plus the quarantine root, log dir and data dir.
    pub exclusions: ExclusionSet,
    /// `None` discovers mounted volumes.
    pub scan_roots: Option<Vec<Utf8PathBuf>>,
    pub dry_run: bool,
    pub auto_delete: bool,
    pub max_workers: usize,
    pub walk: WalkOptions,
    pub lock_retry: RetryPolicy,
    pub cleanup_grace: Option<Duration>,
}

impl RunConfiguration {
    /// Validate settings and resolve every derived value.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]: these are fatal and must abort before scanning.
    pub fn from_settings(settings: &PurgeSettings) -> Result<Self, ConfigError> {
        if settings.retention_days < 0 {
            return Err(ConfigError::NegativeRetention(settings.retention_days));
        }
        if settings.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        let data_dir = settings.data_dir.as_deref().map(absolute).transpose()?;

        let quarantine_root = match (&settings.quarantine_dir, &data_dir) {
            (Some(dir), _) => absolute(dir)?,
            (None, Some(data)) => data.join(QUARANTINE_DIR_NAME),
            (None, None) => return Err(ConfigError::MissingQuarantineRoot),
        };
        if quarantine_root.as_str().trim().is_empty() {
            return Err(ConfigError::MissingQuarantineRoot);
        }

        let log_dir = match (&settings.log_dir, &data_dir) {
            (Some(dir), _) => absolute(dir)?,
            (None, Some(data)) => data.join(LOGS_DIR_NAME),
            (None, None) => return Err(ConfigError::MissingLogDir),
        };

        let catalog = CategoryCatalog::new(&settings.file_categories);
        let selection = catalog.select(&settings.categories)?;

        let mut exclusions = ExclusionSet::new();
        for dir in &settings.exclude_dirs {
            exclusions.add_path(dir);
        }
        exclusions.add_path(&quarantine_root);
        exclusions.add_path(&log_dir);
        if let Some(data) = &data_dir {
            exclusions.add_path(data);
        }
        for pattern in &settings.exclude_patterns {
            exclusions
                .add_pattern_str(pattern)
                .map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }

        let scan_roots = if settings.scan_roots.is_empty() {
            None
        } else {
            Some(
                settings
                    .scan_roots
                    .iter()
                    .map(|root| absolute(root))
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };

        Ok(Self {
            selection: Arc::new(selection),
            retention_days: settings.retention_days as u64,
            quarantine_root,
            log_dir,
            data_dir,
            exclusions,
            scan_roots,
            dry_run: settings.dry_run,
            auto_delete: settings.auto_delete,
            max_workers: settings.max_workers,
            walk: WalkOptions {
                follow_symlinks: settings.follow_symlinks,
            },
            lock_retry: RetryPolicy {
                retries: settings.lock_retries,
                delay: Duration::from_millis(settings.lock_retry_delay_ms),
            },
            cleanup_grace: settings
                .cleanup_grace_days
                .map(|days| Duration::from_secs(u64::from(days) * SECONDS_PER_DAY)),
        })
    }

    pub fn retention_policy(&self, now: SystemTime) -> RetentionPolicy {
        RetentionPolicy::new(self.retention_days, now)
    }

    pub fn quarantine_mover(&self) -> QuarantineMover {
        QuarantineMover::new(&self.quarantine_root, self.dry_run, self.lock_retry)
    }

    pub fn post_run_cleaner(&self) -> PostRunCleaner {
        PostRunCleaner::new(&self.quarantine_root, self.cleanup_grace)
    }
}

/// Absolute with `.` and `..` folded, so exclusion prefixes and walk paths compare.
fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    absolute_normalized(path).map_err(|_| ConfigError::InvalidPath(path.to_string()))
}
