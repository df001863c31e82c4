use crate::services::paths::{absolute_normalized, normalize_lexically, resolve_existing};
use camino::Utf8Path;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Paths and patterns that must never be scanned.
///
/// A path is excluded when it equals or lies under one of the prefixes
/// (component-wise, case-insensitive on Windows), or when any pattern matches
/// its full textual form. Prefixes are stored lexically normalized, plus their
/// symlink-resolved form when that differs.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    prefixes: Vec<PathBuf>,
    patterns: Vec<Regex>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory prefix. Relative paths are made absolute against the
    /// current directory and `.`/`..` are folded.
    pub fn add_path(&mut self, path: impl AsRef<Utf8Path>) {
        let path = path.as_ref();
        let lexical = absolute_normalized(path).unwrap_or_else(|_| normalize_lexically(path));
        let resolved = resolve_existing(&lexical);

        for prefix in std::iter::once(lexical).chain(resolved) {
            let key = normalize(prefix.as_std_path());
            if !self.prefixes.contains(&key) {
                self.prefixes.push(key);
            }
        }
    }

    /// Add a compiled pattern matched against the full path.
    pub fn add_pattern(&mut self, pattern: Regex) {
        self.patterns.push(pattern);
    }

    /// Compile and add a pattern.
    pub fn add_pattern_str(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.add_pattern(Regex::new(pattern)?);
        Ok(())
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        if !self.prefixes.is_empty() {
            let normalized = normalize(path);
            if self.prefixes.iter().any(|p| normalized.starts_with(p)) {
                return true;
            }
        }

        if !self.patterns.is_empty() {
            let text = path.to_string_lossy();
            if self.patterns.iter().any(|re| re.is_match(&text)) {
                return true;
            }
        }

        false
    }

    pub fn is_excluded_utf8(&self, path: &Utf8Path) -> bool {
        self.is_excluded(path.as_std_path())
    }

    /// [`is_excluded`](Self::is_excluded) for `path` as given or with its
    /// symlinks resolved. Used where a walk may have entered through a link.
    pub fn is_excluded_resolved(&self, path: &Path) -> bool {
        self.is_excluded(path) || fs::canonicalize(path).is_ok_and(|real| self.is_excluded(&real))
    }
}

#[cfg(windows)]
fn normalize(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(not(windows))]
fn normalize(path: &Path) -> PathBuf {
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_prefix_match_is_component_wise() {
        let mut set = ExclusionSet::new();
        set.add_path("/data/Backup");

        assert!(set.is_excluded(Path::new("/data/Backup")));
        assert!(set.is_excluded(Path::new("/data/Backup/old/archive.zip")));
        assert!(!set.is_excluded(Path::new("/data/Backups/archive.zip")));
        assert!(!set.is_excluded(Path::new("/data")));
    }

    #[test]
    #[cfg(unix)]
    fn test_pattern_match() {
        let mut set = ExclusionSet::new();
        set.add_pattern_str(r"(^|/)node_modules(/|$)").unwrap();

        assert!(set.is_excluded(Path::new("/src/app/node_modules/x/readme.txt")));
        assert!(!set.is_excluded(Path::new("/src/app/modules/readme.txt")));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut set = ExclusionSet::new();
        assert!(set.add_pattern_str("(unclosed").is_err());
        assert!(!set.is_excluded(Path::new("(unclosed")));
    }

    #[test]
    #[cfg(unix)]
    fn test_parent_components_are_folded() {
        let mut set = ExclusionSet::new();
        set.add_path("/srv/share/sub/../purge/Quarantine");

        assert!(set.is_excluded(Path::new("/srv/share/purge/Quarantine/ROOT/old/report.pdf")));
        assert!(!set.is_excluded(Path::new("/srv/share/sub/Quarantine")));
    }

    #[test]
    #[cfg(unix)]
    fn test_link_into_excluded_directory_is_caught_when_resolved() {
        let temp = tempfile::TempDir::new().unwrap();
        let quarantine = temp.path().join("data/Quarantine");
        fs::create_dir_all(&quarantine).unwrap();
        let link = temp.path().join("scan/shortcut");
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&quarantine, &link).unwrap();

        let mut set = ExclusionSet::new();
        set.add_path(Utf8Path::from_path(&quarantine).unwrap());

        assert!(!set.is_excluded(&link));
        assert!(set.is_excluded_resolved(&link));
    }

    #[test]
    fn test_empty_set_excludes_nothing() {
        let set = ExclusionSet::new();
        assert!(!set.is_excluded(Path::new("/anything")));
    }
}
