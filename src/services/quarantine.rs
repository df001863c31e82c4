use crate::models::FileEntry;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on `__<n>` suffixes tried before a destination is declared unavailable.
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Directory used under the quarantine root for paths without a drive prefix.
const NO_PREFIX_LABEL: &str = "ROOT";

/// Outcome of a quarantine move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Success,
    Failed,
}

/// How the file reached (or would reach) quarantine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStrategy {
    /// Atomic rename within one volume
    Rename,
    /// Copy, verify by size and blake3 digest, then delete the source
    CopyVerifyDelete,
    /// Dry run, nothing touched
    Simulated,
}

/// Errors that can occur while moving a single file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("Failed to create destination directory {path}: {detail}")]
    CreateDestination { path: Utf8PathBuf, detail: String },

    #[error("No free destination name for {0}")]
    NoFreeName(Utf8PathBuf),

    #[error("File still locked after {attempts} attempts")]
    Locked { attempts: u32 },

    #[error("Rename failed: {0}")]
    Rename(String),

    #[error("Copy failed: {detail}")]
    Copy {
        detail: String,
        orphan: Option<Utf8PathBuf>,
    },

    #[error("Copy verification failed, orphaned copy at {orphan}")]
    VerificationMismatch { orphan: Utf8PathBuf },

    #[error("Copied to {duplicate} but the source could not be removed: {detail}")]
    SourceRemoval {
        duplicate: Utf8PathBuf,
        detail: String,
    },
}

impl MoveError {
    /// Copy left behind in quarantine that needs manual review.
    pub fn orphan(&self) -> Option<&Utf8Path> {
        match self {
            MoveError::Copy { orphan, .. } => orphan.as_deref(),
            MoveError::VerificationMismatch { orphan } => Some(orphan),
            MoveError::SourceRemoval { duplicate, .. } => Some(duplicate),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, MoveError::Locked { .. })
    }
}

/// Result of one quarantine attempt. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct QuarantineRecord {
    pub source: Utf8PathBuf,
    pub destination: Utf8PathBuf,
    pub timestamp: DateTime<Local>,
    pub outcome: MoveOutcome,
    pub strategy: Option<MoveStrategy>,
    /// Set for dry-run records, which report success without touching the filesystem.
    pub dry_run: bool,
    pub error: Option<MoveError>,
}

impl QuarantineRecord {
    fn success(source: &Utf8Path, destination: Utf8PathBuf, strategy: MoveStrategy) -> Self {
        Self {
            source: source.to_path_buf(),
            destination,
            timestamp: Local::now(),
            outcome: MoveOutcome::Success,
            strategy: Some(strategy),
            dry_run: strategy == MoveStrategy::Simulated,
            error: None,
        }
    }

    fn failed(source: &Utf8Path, destination: Utf8PathBuf, error: MoveError) -> Self {
        Self {
            source: source.to_path_buf(),
            destination,
            timestamp: Local::now(),
            outcome: MoveOutcome::Failed,
            strategy: None,
            dry_run: false,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == MoveOutcome::Success
    }
}

/// Bounded retry for transient lock errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(200),
        }
    }
}

/// Relocates files into the quarantine tree.
///
/// Destinations mirror the source's absolute path under the quarantine root,
/// with the drive (or `ROOT` for prefix-less paths) as the first directory:
/// `C:\Users\bob\report.pdf` → `<quarantine>\C\Users\bob\report.pdf`.
/// An existing destination is never overwritten; the first free
/// `<stem>__<n><ext>` name is used instead.
#[derive(Debug, Clone)]
pub struct QuarantineMover {
    quarantine_root: Utf8PathBuf,
    dry_run: bool,
    retry: RetryPolicy,
}

impl QuarantineMover {
    pub fn new(
        quarantine_root: impl Into<Utf8PathBuf>,
        dry_run: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            quarantine_root: quarantine_root.into(),
            dry_run,
            retry,
        }
    }

    /// Collision-free destination before suffixing.
    pub fn destination_for(&self, source: &Utf8Path) -> Utf8PathBuf {
        self.quarantine_root.join(quarantine_relative(source))
    }

    /// Move one entry into quarantine.
    ///
    /// Under dry run the destination is computed (including collision
    /// resolution, which only reads) and a simulated success is returned.
    /// Failures leave the source in place.
    pub fn relocate(&self, entry: &FileEntry) -> QuarantineRecord {
        let source = entry.path();
        let base = self.destination_for(source);

        if self.dry_run {
            let destination = resolve_collision(&base).unwrap_or(base);
            return QuarantineRecord::success(source, destination, MoveStrategy::Simulated);
        }

        if let Some(parent) = base.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                let error = MoveError::CreateDestination {
                    path: parent.to_path_buf(),
                    detail: err.to_string(),
                };
                return QuarantineRecord::failed(source, base, error);
            }
        }

        let destination = match resolve_collision(&base) {
            Ok(destination) => destination,
            Err(error) => return QuarantineRecord::failed(source, base, error),
        };

        match self.move_file(source, &destination) {
            Ok(strategy) => {
                tracing::debug!("Quarantined {} -> {} ({:?})", source, destination, strategy);
                QuarantineRecord::success(source, destination, strategy)
            }
            Err(error) => {
                if let Some(orphan) = error.orphan() {
                    tracing::warn!(
                        "Orphaned copy requires manual review: {} (source {})",
                        orphan,
                        source
                    );
                }
                QuarantineRecord::failed(source, destination, error)
            }
        }
    }

    fn move_file(
        &self,
        source: &Utf8Path,
        destination: &Utf8Path,
    ) -> Result<MoveStrategy, MoveError> {
        let destination_dir = destination.parent().unwrap_or(&self.quarantine_root);

        if same_volume(source, destination_dir) == Some(false) {
            self.copy_verify_delete(source, destination)?;
            return Ok(MoveStrategy::CopyVerifyDelete);
        }

        match self.retry_locked(|| fs::rename(source, destination)) {
            Ok(()) => Ok(MoveStrategy::Rename),
            Err(err) if is_cross_device(&err) => {
                tracing::debug!("Rename crossed devices for {}, copying instead", source);
                self.copy_verify_delete(source, destination)?;
                Ok(MoveStrategy::CopyVerifyDelete)
            }
            Err(err) if is_lock_error(&err) => Err(self.locked()),
            Err(err) => Err(MoveError::Rename(err.to_string())),
        }
    }

    fn copy_verify_delete(
        &self,
        source: &Utf8Path,
        destination: &Utf8Path,
    ) -> Result<(), MoveError> {
        let source_meta = fs::metadata(source).map_err(|err| MoveError::Copy {
            detail: err.to_string(),
            orphan: None,
        })?;

        if let Err(err) = self.retry_locked(|| fs::copy(source, destination)) {
            let orphan = fs::symlink_metadata(destination)
                .is_ok()
                .then(|| destination.to_path_buf());
            if orphan.is_none() && is_lock_error(&err) {
                return Err(self.locked());
            }
            return Err(MoveError::Copy {
                detail: err.to_string(),
                orphan,
            });
        }

        if let Ok(modified) = source_meta.modified() {
            if let Err(err) = set_modified(destination, modified) {
                tracing::warn!(
                    "Could not preserve modification time on {}: {}",
                    destination,
                    err
                );
            }
        }

        match copies_match(source, destination, source_meta.len()) {
            Ok(true) => {}
            Ok(false) => {
                return Err(MoveError::VerificationMismatch {
                    orphan: destination.to_path_buf(),
                });
            }
            Err(err) => {
                return Err(MoveError::Copy {
                    detail: format!("verification failed: {}", err),
                    orphan: Some(destination.to_path_buf()),
                });
            }
        }

        self.retry_locked(|| fs::remove_file(source))
            .map_err(|err| MoveError::SourceRemoval {
                duplicate: destination.to_path_buf(),
                detail: err.to_string(),
            })
    }

    /// Run `op`, retrying while it fails with a lock/sharing violation.
    fn retry_locked<T>(&self, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(err) if is_lock_error(&err) && attempt < self.retry.retries => {
                    attempt += 1;
                    tracing::debug!("Locked ({}), retry {}/{}", err, attempt, self.retry.retries);
                    thread::sleep(self.retry.delay);
                }
                other => return other,
            }
        }
    }

    fn locked(&self) -> MoveError {
        MoveError::Locked {
            attempts: self.retry.retries + 1,
        }
    }
}

/// Path of `source` relative to the quarantine root. `..` is folded so the
/// destination mirrors the directory the file actually lives in.
pub fn quarantine_relative(source: &Utf8Path) -> Utf8PathBuf {
    let mut relative = Utf8PathBuf::new();
    let mut has_prefix = false;
    let mut depth = 0usize;

    for component in source.components() {
        match component {
            Utf8Component::Prefix(prefix) => {
                relative.push(prefix_label(prefix.as_str()));
                has_prefix = true;
            }
            Utf8Component::RootDir if !has_prefix => relative.push(NO_PREFIX_LABEL),
            Utf8Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            Utf8Component::ParentDir if depth > 0 => {
                relative.pop();
                depth -= 1;
            }
            Utf8Component::RootDir | Utf8Component::CurDir | Utf8Component::ParentDir => {}
        }
    }

    relative
}

/// `C:` → `C`, `\\server\share` → `UNC_server_share`.
fn prefix_label(prefix: &str) -> String {
    let trimmed = prefix.strip_prefix(r"\\?\").unwrap_or(prefix);
    let (unc, rest) = match trimmed.strip_prefix(r"UNC\") {
        Some(rest) => (true, rest),
        None => match trimmed.strip_prefix(r"\\") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        },
    };

    let label: String = rest
        .chars()
        .filter(|c| *c != ':')
        .map(|c| if c == '\\' || c == '/' { '_' } else { c })
        .collect();
    let label = label.trim_matches('_');

    if unc {
        format!("UNC_{}", label)
    } else if label.is_empty() {
        NO_PREFIX_LABEL.to_string()
    } else {
        label.to_string()
    }
}

/// First name at or derived from `base` that does not exist yet.
pub fn resolve_collision(base: &Utf8Path) -> Result<Utf8PathBuf, MoveError> {
    if is_free(base) {
        return Ok(base.to_path_buf());
    }
    (1..=MAX_COLLISION_SUFFIX)
        .map(|n| disambiguated(base, n))
        .find(|candidate| is_free(candidate))
        .ok_or_else(|| MoveError::NoFreeName(base.to_path_buf()))
}

/// `dir/report.pdf` with `n = 2` → `dir/report__2.pdf`.
pub fn disambiguated(base: &Utf8Path, n: u32) -> Utf8PathBuf {
    let stem = base.file_stem().unwrap_or("file");
    let name = match base.extension() {
        Some(ext) => format!("{}__{}.{}", stem, n, ext),
        None => format!("{}__{}", stem, n),
    };
    base.with_file_name(name)
}

/// Anything that cannot be proven absent counts as taken.
fn is_free(path: &Utf8Path) -> bool {
    matches!(fs::symlink_metadata(path), Err(err) if err.kind() == io::ErrorKind::NotFound)
}

fn copies_match(source: &Utf8Path, copy: &Utf8Path, expected_len: u64) -> io::Result<bool> {
    if fs::metadata(copy)?.len() != expected_len {
        return Ok(false);
    }
    Ok(file_digest(source)? == file_digest(copy)?)
}

fn file_digest(path: &Utf8Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(fs::File::open(path)?)?;
    Ok(hasher.finalize())
}

fn set_modified(path: &Utf8Path, modified: std::time::SystemTime) -> io::Result<()> {
    fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(modified)
}

fn is_lock_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::ResourceBusy {
        return true;
    }
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

fn is_cross_device(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    // EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows
    match err.raw_os_error() {
        Some(18) => cfg!(unix),
        Some(17) => cfg!(windows),
        _ => false,
    }
}

fn same_volume(a: &Utf8Path, b: &Utf8Path) -> Option<bool> {
    Some(volume_id(a)? == volume_id(b)?)
}

#[cfg(unix)]
fn volume_id(path: &Utf8Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).ok().map(|meta| meta.dev())
}

#[cfg(windows)]
fn volume_id(path: &Utf8Path) -> Option<String> {
    match path.components().next()? {
        Utf8Component::Prefix(prefix) => Some(prefix_label(prefix.as_str()).to_uppercase()),
        _ => None,
    }
}

#[cfg(not(any(unix, windows)))]
fn volume_id(_path: &Utf8Path) -> Option<()> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn utf8_temp() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    fn entry_for(path: &Utf8Path) -> FileEntry {
        FileEntry {
            path: path.to_path_buf(),
            size: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            modified: SystemTime::now(),
            category: Some(Arc::from("documents")),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_quarantine_relative_unix() {
        assert_eq!(
            quarantine_relative(Utf8Path::new("/home/bob/docs/report.pdf")),
            Utf8PathBuf::from("ROOT/home/bob/docs/report.pdf")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_quarantine_relative_folds_parent_components() {
        assert_eq!(
            quarantine_relative(Utf8Path::new("/srv/share/sub/../purge/old/report.pdf")),
            Utf8PathBuf::from("ROOT/srv/share/purge/old/report.pdf")
        );
        assert_eq!(
            quarantine_relative(Utf8Path::new("/../etc/x.pdf")),
            Utf8PathBuf::from("ROOT/etc/x.pdf")
        );
    }

    #[test]
    fn test_prefix_label() {
        assert_eq!(prefix_label("C:"), "C");
        assert_eq!(prefix_label(r"\\?\D:"), "D");
        assert_eq!(prefix_label(r"\\server\share"), "UNC_server_share");
        assert_eq!(prefix_label(r"\\?\UNC\server\share"), "UNC_server_share");
    }

    #[test]
    fn test_disambiguated_names() {
        assert_eq!(
            disambiguated(Utf8Path::new("q/report.pdf"), 1),
            Utf8PathBuf::from("q/report__1.pdf")
        );
        assert_eq!(
            disambiguated(Utf8Path::new("q/Makefile"), 3),
            Utf8PathBuf::from("q/Makefile__3")
        );
    }

    #[test]
    fn test_resolve_collision_picks_first_free_suffix() {
        let (_temp, dir) = utf8_temp();
        let base = dir.join("report.pdf");
        assert_eq!(resolve_collision(&base).unwrap(), base);

        fs::write(&base, b"1").unwrap();
        fs::write(dir.join("report__1.pdf"), b"2").unwrap();
        assert_eq!(resolve_collision(&base).unwrap(), dir.join("report__2.pdf"));
    }

    #[test]
    fn test_relocate_moves_and_preserves_structure() {
        let (_temp, dir) = utf8_temp();
        let source_dir = dir.join("data/sub");
        fs::create_dir_all(&source_dir).unwrap();
        let source = source_dir.join("report.pdf");
        fs::write(&source, b"quarterly").unwrap();

        let mover = QuarantineMover::new(dir.join("quarantine"), false, RetryPolicy::default());
        let record = mover.relocate(&entry_for(&source));

        assert!(record.is_success(), "{:?}", record.error);
        assert!(!record.dry_run);
        assert_eq!(record.destination, mover.destination_for(&source));
        assert!(!source.exists());
        assert_eq!(fs::read(&record.destination).unwrap(), b"quarterly");
        assert!(record.destination.ends_with("data/sub/report.pdf"));
    }

    #[test]
    fn test_relocate_never_overwrites() {
        let (_temp, dir) = utf8_temp();
        let source = dir.join("notes.txt");
        fs::write(&source, b"new").unwrap();

        let mover = QuarantineMover::new(dir.join("q"), false, RetryPolicy::default());
        let occupied = mover.destination_for(&source);
        fs::create_dir_all(occupied.parent().unwrap()).unwrap();
        fs::write(&occupied, b"old").unwrap();

        let record = mover.relocate(&entry_for(&source));
        assert!(record.is_success());
        assert_ne!(record.destination, occupied);
        assert_eq!(fs::read(&occupied).unwrap(), b"old");
        assert_eq!(fs::read(&record.destination).unwrap(), b"new");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (_temp, dir) = utf8_temp();
        let source = dir.join("report.pdf");
        fs::write(&source, b"x").unwrap();
        let quarantine = dir.join("q");

        let mover = QuarantineMover::new(&quarantine, true, RetryPolicy::default());
        let record = mover.relocate(&entry_for(&source));

        assert!(record.is_success());
        assert!(record.dry_run);
        assert_eq!(record.strategy, Some(MoveStrategy::Simulated));
        assert!(source.exists());
        assert!(!quarantine.exists());
    }

    #[test]
    fn test_copy_verify_delete_preserves_content_and_mtime() {
        let (_temp, dir) = utf8_temp();
        let source = dir.join("clip.mp4");
        fs::write(&source, vec![7u8; 4096]).unwrap();
        let old = SystemTime::now() - Duration::from_secs(86_400 * 40);
        set_modified(&source, old).unwrap();

        let destination = dir.join("copy.mp4");
        let mover = QuarantineMover::new(&dir, false, RetryPolicy::default());
        mover.copy_verify_delete(&source, &destination).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&destination).unwrap(), vec![7u8; 4096]);
        let copied = fs::metadata(&destination).unwrap().modified().unwrap();
        let drift = copied
            .duration_since(old)
            .unwrap_or_else(|e| e.duration());
        assert!(drift < Duration::from_secs(2));
    }

    #[test]
    fn test_missing_source_fails_without_orphan() {
        let (_temp, dir) = utf8_temp();
        let source = dir.join("gone.pdf");
        let mover = QuarantineMover::new(dir.join("q"), false, RetryPolicy::default());

        let record = mover.relocate(&entry_for(&source));
        assert_eq!(record.outcome, MoveOutcome::Failed);
        let error = record.error.unwrap();
        assert!(error.orphan().is_none());
        assert!(!error.is_locked());
    }

    #[test]
    fn test_error_kind_helpers() {
        assert!(is_lock_error(&io::Error::from(io::ErrorKind::ResourceBusy)));
        assert!(!is_lock_error(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(is_cross_device(&io::Error::from(io::ErrorKind::CrossesDevices)));
    }

    fn quick_retry(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_persistent_lock_gives_up_after_bounded_retries() {
        let mover = QuarantineMover::new("q", false, quick_retry(2));
        let mut attempts = 0;

        let result: io::Result<()> = mover.retry_locked(|| {
            attempts += 1;
            Err(io::Error::from(io::ErrorKind::ResourceBusy))
        });

        assert!(is_lock_error(&result.unwrap_err()));
        assert_eq!(attempts, 3);
        let error = mover.locked();
        assert_eq!(error, MoveError::Locked { attempts: 3 });
        assert!(error.is_locked());
        assert!(error.orphan().is_none());
    }

    #[test]
    fn test_transient_lock_is_retried_until_released() {
        let mover = QuarantineMover::new("q", false, quick_retry(3));
        let mut attempts = 0;

        let result = mover.retry_locked(|| {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::from(io::ErrorKind::ResourceBusy))
            } else {
                Ok(attempts)
            }
        });

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let mover = QuarantineMover::new("q", false, quick_retry(5));
        let mut attempts = 0;

        let result: io::Result<()> = mover.retry_locked(|| {
            attempts += 1;
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        });

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_copies_match_detects_differing_content() {
        let (_temp, dir) = utf8_temp();
        let source = dir.join("a.bin");
        let same = dir.join("b.bin");
        let flipped = dir.join("c.bin");
        let short = dir.join("d.bin");
        fs::write(&source, b"0123456789").unwrap();
        fs::write(&same, b"0123456789").unwrap();
        fs::write(&flipped, b"0123456780").unwrap();
        fs::write(&short, b"012345678").unwrap();

        assert!(copies_match(&source, &same, 10).unwrap());
        assert!(!copies_match(&source, &flipped, 10).unwrap());
        assert!(!copies_match(&source, &short, 10).unwrap());
        assert!(copies_match(&source, &dir.join("missing.bin"), 10).is_err());
    }

    #[test]
    fn test_verification_mismatch_reports_orphan() {
        let orphan = Utf8PathBuf::from("q/ROOT/data/clip.mp4");
        let error = MoveError::VerificationMismatch {
            orphan: orphan.clone(),
        };

        assert_eq!(error.orphan(), Some(orphan.as_path()));
        assert!(!error.is_locked());
    }
}
