//! Data models for SafePurge.
//!
//! - [`PurgeSettings`]: the on-disk settings schema, every field defaulted
//! - [`ScanRoot`] / [`FileEntry`]: what the root enumerator and file walker produce
//! - [`SkipReason`]: why an entry never reached (or failed) its retention decision
//!
//! Decision and quarantine result types live next to the services that
//! produce them ([`crate::services::retention`], [`crate::services::quarantine`]).

pub mod config;
pub mod entry;

pub use config::{PurgeSettings, default_exclude_dirs, default_file_categories};
pub use entry::{FileEntry, RootOrigin, ScanRoot, SkipReason};
