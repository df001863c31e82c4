use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Where a scan root came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootOrigin {
    /// Discovered mounted volume. Walks stay on that filesystem.
    Volume,
    /// Path listed in the configuration.
    Explicit,
}

/// A filesystem path to enumerate, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: Utf8PathBuf,
    pub origin: RootOrigin,
    /// Set when the root falls under the exclusion set; excluded roots are never walked.
    pub excluded: bool,
}

impl ScanRoot {
    pub fn new(path: impl Into<Utf8PathBuf>, origin: RootOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
            excluded: false,
        }
    }

    /// Volume roots must not leak into other mounts nested under them.
    pub fn same_file_system(&self) -> bool {
        self.origin == RootOrigin::Volume
    }
}

/// One discovered file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: Utf8PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    /// Category whose extension set matched, if any.
    pub category: Option<Arc<str>>,
}

impl FileEntry {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Why an entry was skipped before (or instead of) a retention decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    RootUnavailable(String),
    AccessDenied,
    Locked,
    Vanished,
    BrokenLink,
    SymlinkLoop,
    NonUtf8Path,
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RootUnavailable(detail) if detail.is_empty() => {
                write!(f, "root unavailable")
            }
            SkipReason::RootUnavailable(detail) => write!(f, "root unavailable ({})", detail),
            SkipReason::AccessDenied => write!(f, "access denied"),
            SkipReason::Locked => write!(f, "locked"),
            SkipReason::Vanished => write!(f, "vanished before evaluation"),
            SkipReason::BrokenLink => write!(f, "broken link"),
            SkipReason::SymlinkLoop => write!(f, "symlink loop"),
            SkipReason::NonUtf8Path => write!(f, "non-utf8 path"),
            SkipReason::Unreadable(detail) => write!(f, "unreadable: {}", detail),
        }
    }
}

impl SkipReason {
    /// Map an I/O failure on a single entry to a skip reason.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => SkipReason::AccessDenied,
            std::io::ErrorKind::NotFound => SkipReason::Vanished,
            _ => SkipReason::Unreadable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::AccessDenied.to_string(), "access denied");
        assert_eq!(SkipReason::Locked.to_string(), "locked");
        assert_eq!(
            SkipReason::RootUnavailable(String::new()).to_string(),
            "root unavailable"
        );
        assert_eq!(
            SkipReason::RootUnavailable("not a directory".into()).to_string(),
            "root unavailable (not a directory)"
        );
    }

    #[test]
    fn test_skip_reason_from_io() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(SkipReason::from_io(&denied), SkipReason::AccessDenied);

        let gone = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(SkipReason::from_io(&gone), SkipReason::Vanished);
    }

    #[test]
    fn test_volume_roots_stay_on_one_filesystem() {
        assert!(ScanRoot::new("/", RootOrigin::Volume).same_file_system());
        assert!(!ScanRoot::new("/data", RootOrigin::Explicit).same_file_system());
    }
}
