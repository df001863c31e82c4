//! Settings loading and run configuration resolution.
//!
//! [`ConfigManager`] reads the settings file through the `config` crate
//! (YAML, or a legacy JSON `config.json`) layered under `SAFEPURGE_*`
//! environment overrides; [`RunConfiguration`] turns those settings into the
//! validated, immutable configuration a run executes with.

mod run;

pub use run::RunConfiguration;

use crate::models::PurgeSettings;
use crate::services::CatalogError;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;
use thiserror::Error;

/// Primary settings file name.
pub const SETTINGS_FILE_NAME: &str = "safepurge.yaml";

/// Settings file used by earlier script-based deployments.
pub const LEGACY_SETTINGS_FILE_NAME: &str = "config.json";

/// Environment override prefix: `SAFEPURGE_RETENTION_DAYS=30`.
pub const ENV_PREFIX: &str = "SAFEPURGE";

/// Fatal configuration faults. Any of these aborts the run before scanning.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Quarantine root not configured (set data_dir or quarantine_dir)")]
    MissingQuarantineRoot,

    #[error("Log directory not configured (set data_dir or log_dir)")]
    MissingLogDir,

    #[error("retention_days must be non-negative, got {0}")]
    NegativeRetention(i64),

    #[error("Invalid category selection: {0}")]
    Categories(#[from] CatalogError),

    #[error("Invalid exclusion pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("max_workers must be at least 1")]
    ZeroWorkers,

    #[error("Path cannot be resolved as UTF-8: {0}")]
    InvalidPath(String),
}

/// Configuration manager for loading and saving the settings file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    legacy_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager for the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing `safepurge.yaml`
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE_NAME),
            legacy_path: config_dir.join(LEGACY_SETTINGS_FILE_NAME),
            config_dir,
        })
    }

    /// Load settings from file and environment.
    ///
    /// Precedence, lowest first: built-in defaults, the settings file
    /// (`safepurge.yaml`, else legacy `config.json`), `SAFEPURGE_*`
    /// environment variables. A missing file is not an error.
    pub fn load_settings(&self) -> Result<PurgeSettings> {
        let mut builder = Config::builder();

        if self.settings_path.exists() {
            tracing::info!("Loading settings from {}", self.settings_path);
            builder = builder.add_source(File::new(self.settings_path.as_str(), FileFormat::Yaml));
        } else if self.legacy_path.exists() {
            tracing::info!("Using legacy settings file: {}", self.legacy_path);
            builder = builder.add_source(File::new(self.legacy_path.as_str(), FileFormat::Json));
        } else {
            tracing::warn!(
                "Settings file not found at {} or {}, using defaults",
                self.settings_path,
                self.legacy_path
            );
        }

        let layered = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("categories")
                    .with_list_parse_key("scan_roots")
                    .with_list_parse_key("exclude_dirs")
                    .with_list_parse_key("exclude_patterns"),
            )
            .build()
            .context("Failed to assemble settings sources")?;

        let settings: PurgeSettings = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings in {}", self.config_dir))?;

        Ok(settings)
    }

    /// Write settings to `safepurge.yaml`.
    pub fn save_settings(&self, settings: &PurgeSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load settings and resolve them into a [`RunConfiguration`].
    pub fn load_run_configuration(&self) -> Result<RunConfiguration> {
        let settings = self.load_settings()?;
        RunConfiguration::from_settings(&settings).context("Invalid configuration")
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.settings_path().ends_with(SETTINGS_FILE_NAME));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let settings = manager.load_settings().unwrap();
        assert_eq!(settings.retention_days, 7);
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_load_save_settings() {
        let (manager, _temp_dir) = create_test_config_manager();

        let settings = PurgeSettings {
            retention_days: 45,
            dry_run: true,
            categories: vec!["documents".to_string(), "images".to_string()],
            ..PurgeSettings::default()
        };
        manager.save_settings(&settings).unwrap();

        let loaded = manager.load_settings().unwrap();
        assert_eq!(loaded.retention_days, 45);
        assert!(loaded.dry_run);
        assert_eq!(loaded.categories, settings.categories);
    }
}
