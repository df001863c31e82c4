//! Root enumeration: explicit paths from the configuration, or every mounted
//! local read/write volume reported by `sysinfo`.
//!
//! Unavailable roots are collected with a [`SkipReason`] instead of failing
//! the run. A configured root inside another configured root is dropped, so
//! every file belongs to exactly one walk. Roots covered by the exclusion set
//! are kept in the list with `excluded = true` so callers can report them, but
//! are never walked.

use crate::models::{RootOrigin, ScanRoot, SkipReason};
use crate::services::exclusions::ExclusionSet;
use crate::services::paths::{absolute_normalized, normalize_lexically};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::path::PathBuf;
use sysinfo::Disks;

/// Outcome of root enumeration for one run.
#[derive(Debug, Clone, Default)]
pub struct RootEnumeration {
    /// Usable roots in enumeration order, excluded ones flagged.
    pub roots: Vec<ScanRoot>,
    /// Roots that could not be used, with the reason.
    pub unavailable: Vec<(Utf8PathBuf, SkipReason)>,
}

impl RootEnumeration {
    /// Roots that will actually be walked.
    pub fn active(&self) -> impl Iterator<Item = &ScanRoot> {
        self.roots.iter().filter(|r| !r.excluded)
    }
}

/// Enumerate the scan roots for a run.
///
/// # Arguments
/// * `explicit` - Configured roots; `None` discovers mounted volumes
/// * `exclusions` - Roots at or under any exclusion are flagged as excluded
pub fn enumerate(explicit: Option<&[Utf8PathBuf]>, exclusions: &ExclusionSet) -> RootEnumeration {
    let mut enumeration = match explicit {
        Some(paths) => explicit_roots(paths),
        None => discover_volumes(),
    };

    for root in &mut enumeration.roots {
        if exclusions.is_excluded_utf8(&root.path) {
            tracing::info!("Scan root {} is excluded, not walking it", root.path);
            root.excluded = true;
        }
    }

    for (path, reason) in &enumeration.unavailable {
        tracing::warn!("Skipping scan root {}: {}", path, reason);
    }

    enumeration
}

/// Validate configured roots: each must exist and be a directory. Roots
/// covered by an earlier or enclosing root are dropped.
pub fn explicit_roots(paths: &[Utf8PathBuf]) -> RootEnumeration {
    let mut enumeration = RootEnumeration::default();

    for path in paths {
        let path = absolute_normalized(path).unwrap_or_else(|_| normalize_lexically(path));
        if enumeration.roots.iter().any(|r| r.path == path) {
            continue;
        }
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => enumeration
                .roots
                .push(ScanRoot::new(path, RootOrigin::Explicit)),
            Ok(_) => enumeration.unavailable.push((
                path,
                SkipReason::RootUnavailable("not a directory".to_string()),
            )),
            Err(err) => enumeration
                .unavailable
                .push((path, root_unavailable(&err))),
        }
    }

    enumeration.roots = collapse_nested(enumeration.roots);
    enumeration
}

/// Keep only roots that no other root contains. Of two roots naming the same
/// directory the first wins.
fn collapse_nested(roots: Vec<ScanRoot>) -> Vec<ScanRoot> {
    let keys: Vec<PathBuf> = roots.iter().map(|root| containment_key(&root.path)).collect();
    let mut kept = Vec::with_capacity(roots.len());

    for (index, root) in roots.into_iter().enumerate() {
        let key = &keys[index];
        let outer = keys.iter().enumerate().find(|&(other, candidate)| {
            other != index && key.starts_with(candidate) && (key != candidate || other < index)
        });
        match outer {
            Some((_, candidate)) => tracing::info!(
                "Scan root {} lies inside {}, walking it once",
                root.path,
                candidate.display()
            ),
            None => kept.push(root),
        }
    }

    kept
}

/// Symlink-resolved path when available, so aliases of one directory compare equal.
fn containment_key(path: &Utf8Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.as_std_path().to_path_buf())
}

/// Discover mounted volumes suitable for scanning.
pub fn discover_volumes() -> RootEnumeration {
    let mut enumeration = RootEnumeration::default();
    let disks = Disks::new_with_refreshed_list();

    for disk in disks.list() {
        let Some(mount) = disk.mount_point().to_str() else {
            tracing::debug!("Ignoring volume with non-UTF-8 mount point");
            continue;
        };
        let mount = Utf8PathBuf::from(mount);
        if enumeration.roots.iter().any(|r| r.path == mount) {
            continue;
        }

        let fs_type = disk.file_system().to_string_lossy();
        match assess_volume(&mount, &fs_type, disk.is_read_only()) {
            VolumeAssessment::Scan => match fs::read_dir(&mount) {
                Ok(_) => enumeration
                    .roots
                    .push(ScanRoot::new(mount, RootOrigin::Volume)),
                Err(err) => enumeration.unavailable.push((mount, root_unavailable(&err))),
            },
            VolumeAssessment::Ignore => {
                tracing::debug!("Ignoring virtual or remote volume {} ({})", mount, fs_type);
            }
            VolumeAssessment::Unavailable(reason) => {
                enumeration.unavailable.push((mount, reason));
            }
        }
    }

    enumeration.roots.sort_by(|a, b| a.path.cmp(&b.path));
    enumeration
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum VolumeAssessment {
    Scan,
    /// Not a local data volume; dropped without a warning.
    Ignore,
    Unavailable(SkipReason),
}

fn assess_volume(mount: &Utf8Path, fs_type: &str, read_only: bool) -> VolumeAssessment {
    if is_virtual_filesystem(mount.as_str(), fs_type) {
        return VolumeAssessment::Ignore;
    }
    if read_only {
        return VolumeAssessment::Unavailable(SkipReason::RootUnavailable(
            "read-only volume".to_string(),
        ));
    }
    VolumeAssessment::Scan
}

/// Pseudo, container and network filesystems are never scanned as volumes.
fn is_virtual_filesystem(mount_point: &str, fs_type: &str) -> bool {
    if mount_point.starts_with("/dev")
        || mount_point.starts_with("/sys")
        || mount_point.starts_with("/proc")
        || mount_point.starts_with("/run")
        || mount_point.starts_with("/snap")
        || mount_point.contains("docker")
    {
        return true;
    }

    matches!(
        fs_type.to_lowercase().as_str(),
        "devfs"
            | "procfs"
            | "proc"
            | "sysfs"
            | "tmpfs"
            | "devtmpfs"
            | "overlay"
            | "aufs"
            | "squashfs"
            | "autofs"
            | "nfs"
            | "nfs4"
            | "cifs"
            | "smbfs"
    )
}

fn root_unavailable(err: &std::io::Error) -> SkipReason {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => {
            SkipReason::RootUnavailable("access denied".to_string())
        }
        std::io::ErrorKind::NotFound => SkipReason::RootUnavailable(String::new()),
        _ => SkipReason::RootUnavailable(err.to_string()),
    }
}
