//! Lazy per-root file walk.
//!
//! Built on `walkdir`: excluded directories are pruned with `filter_entry`
//! so their subtrees are never read, entries are yielded in file-name order
//! for a deterministic scan log, and symlink cycles are detected by walkdir
//! when links are followed. When following links, directories are also
//! checked with their links resolved, so a link into an excluded tree is
//! pruned like the tree itself.

use crate::models::{FileEntry, ScanRoot, SkipReason};
use crate::services::catalog::CategorySelection;
use crate::services::exclusions::ExclusionSet;
use camino::Utf8PathBuf;
use std::fs;
use std::path::PathBuf;
use walkdir::{DirEntry, WalkDir};

/// One item produced by the walk.
#[derive(Debug, Clone)]
pub enum WalkItem {
    File(FileEntry),
    Skipped { path: Utf8PathBuf, reason: SkipReason },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    pub follow_symlinks: bool,
}

/// Walk one root.
///
/// The returned iterator is independent of any other root's walk and ends
/// when the subtree is exhausted. Each file is tagged with the category
/// `selection` assigns to it.
pub fn walk<'a>(
    root: &ScanRoot,
    exclusions: &'a ExclusionSet,
    selection: &'a CategorySelection,
    options: WalkOptions,
) -> impl Iterator<Item = WalkItem> + 'a {
    WalkDir::new(root.path.as_std_path())
        .follow_links(options.follow_symlinks)
        .same_file_system(root.same_file_system())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| entry.depth() == 0 || !is_pruned(entry, exclusions, options))
        .filter_map(move |result| match result {
            Ok(entry) => visit(entry, selection),
            Err(err) => Some(walk_error(err)),
        })
}

fn is_pruned(entry: &DirEntry, exclusions: &ExclusionSet, options: WalkOptions) -> bool {
    if options.follow_symlinks && (entry.file_type().is_dir() || entry.path_is_symlink()) {
        exclusions.is_excluded_resolved(entry.path())
    } else {
        exclusions.is_excluded(entry.path())
    }
}

fn visit(entry: DirEntry, selection: &CategorySelection) -> Option<WalkItem> {
    let file_type = entry.file_type();

    if file_type.is_dir() {
        tracing::debug!("[SCAN] {}", entry.path().display());
        return None;
    }

    let path = match Utf8PathBuf::from_path_buf(entry.path().to_path_buf()) {
        Ok(path) => path,
        Err(raw) => {
            return Some(WalkItem::Skipped {
                path: lossy(raw),
                reason: SkipReason::NonUtf8Path,
            });
        }
    };

    if file_type.is_symlink() {
        // Only reached when links are not followed.
        return match fs::metadata(&path) {
            Ok(_) => {
                tracing::debug!("Not following symlink {}", path);
                None
            }
            Err(_) => Some(WalkItem::Skipped {
                path,
                reason: SkipReason::BrokenLink,
            }),
        };
    }

    if !file_type.is_file() {
        return None;
    }

    let metadata = match entry.metadata() {
        Ok(meta) => meta,
        Err(err) => {
            let reason = err
                .io_error()
                .map(SkipReason::from_io)
                .unwrap_or_else(|| SkipReason::Unreadable(err.to_string()));
            return Some(WalkItem::Skipped { path, reason });
        }
    };

    let modified = match metadata.modified() {
        Ok(time) => time,
        Err(err) => {
            return Some(WalkItem::Skipped {
                path,
                reason: SkipReason::from_io(&err),
            });
        }
    };

    let category = selection.classify(&path);
    Some(WalkItem::File(FileEntry {
        path,
        size: metadata.len(),
        modified,
        category,
    }))
}

fn walk_error(err: walkdir::Error) -> WalkItem {
    let path = err
        .path()
        .map(|p| lossy(p.to_path_buf()))
        .unwrap_or_default();

    let reason = if err.loop_ancestor().is_some() {
        SkipReason::SymlinkLoop
    } else if let Some(io) = err.io_error() {
        if io.kind() == std::io::ErrorKind::NotFound && fs::symlink_metadata(&path).is_ok() {
            SkipReason::BrokenLink
        } else {
            SkipReason::from_io(io)
        }
    } else {
        SkipReason::Unreadable(err.to_string())
    };

    tracing::debug!("Walk error at {}: {}", path, reason);
    WalkItem::Skipped { path, reason }
}

fn lossy(path: PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from(path.to_string_lossy().into_owned())
}
