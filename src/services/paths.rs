//! Path normalization shared by configuration, exclusions and root enumeration.
//!
//! Every prefix comparison in the crate runs on lexically normalized absolute
//! paths, so `share/sub/..` and `share` name the same directory everywhere.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::io;

/// Fold `.` and `..` without touching the filesystem.
///
/// `..` never climbs above the root of an absolute path; leading `..` of a
/// relative path are kept.
pub fn normalize_lexically(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalized = Utf8PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => {
                normalized.push(component.as_str());
                depth = 0;
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Utf8Component::Normal(name) => {
                normalized.push(name);
                depth += 1;
            }
        }
    }

    if normalized.as_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// Absolute against the current directory, then lexically normalized.
pub fn absolute_normalized(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    let absolute = std::path::absolute(path.as_std_path())?;
    let absolute = Utf8PathBuf::from_path_buf(absolute).map_err(|raw| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("non-UTF-8 path {}", raw.display()),
        )
    })?;
    Ok(normalize_lexically(&absolute))
}

/// `path` with symlinks resolved in its longest existing ancestor; the
/// missing tail is appended unchanged. `None` when no ancestor resolves.
pub fn resolve_existing(path: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        if let Ok(mut resolved) = existing.canonicalize_utf8() {
            for name in missing.iter().rev() {
                resolved.push(name);
            }
            return Some(resolved);
        }
        missing.push(existing.file_name()?);
        existing = existing.parent()?;
    }
}
