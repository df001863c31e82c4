//! Services module - the purge engine's building blocks.
//!
//! Leaves first:
//!
//! - [`catalog`]: category → extension lookup, `all` expanded once
//! - [`paths`]: lexical normalization shared by every path comparison
//! - [`exclusions`]: path-prefix and pattern exclusions
//! - [`roots`]: explicit roots or discovered volumes
//! - [`walker`]: lazy per-root walk with pruning and cycle detection
//! - [`retention`]: the MOVE/SKIP rule
//! - [`quarantine`]: rename or copy-verify-delete into the quarantine tree
//! - [`audit`]: the scan log and move log
//! - [`cleanup`]: optional permanent deletion after the run
//! - [`disk_usage`]: volume capacity report for the scan log
//!
//! None of these touch global state; [`crate::engine::PurgeEngine`] wires
//! them together.

pub mod audit;
pub mod catalog;
pub mod cleanup;
pub mod disk_usage;
pub mod exclusions;
pub mod paths;
pub mod quarantine;
pub mod retention;
pub mod roots;
pub mod walker;

pub use audit::{AuditError, AuditLogger, parse_move_line};
pub use catalog::{ALL_CATEGORY, CatalogError, CategoryCatalog, CategorySelection};
pub use cleanup::{CleanupOutcome, CleanupReport, PostRunCleaner};
pub use exclusions::ExclusionSet;
pub use quarantine::{
    MoveError, MoveOutcome, MoveStrategy, QuarantineMover, QuarantineRecord, RetryPolicy,
};
pub use retention::{DecisionReason, RetentionDecision, RetentionPolicy, Verdict};
pub use roots::RootEnumeration;
pub use walker::{WalkItem, WalkOptions};
