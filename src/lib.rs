// SafePurge - age-based quarantine of stale user files
//
// This is the library crate containing the purge engine and its building blocks.
// The binary crate (main.rs) loads settings and drives one run.

pub mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigManager, RunConfiguration};
pub use engine::{PurgeEngine, RootReport, RunError, RunSummary};
pub use models::{FileEntry, PurgeSettings, ScanRoot, SkipReason};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
