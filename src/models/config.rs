use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Settings loaded from `safepurge.yaml` (or a legacy `config.json`).
///
/// Every field has a default so a partial file, or no file at all, still
/// deserializes. Validation happens later in
/// [`RunConfiguration::from_settings`](crate::config::RunConfiguration::from_settings).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeSettings {
    /// Base directory holding `Quarantine/` and `Logs/` unless overridden.
    #[serde(alias = "PROGRAM_DATA_DIR", alias = "program_data_dir")]
    pub data_dir: Option<Utf8PathBuf>,

    pub quarantine_dir: Option<Utf8PathBuf>,

    pub log_dir: Option<Utf8PathBuf>,

    /// Selected category names; `all` selects every category.
    pub categories: Vec<String>,

    /// Minimum age in whole days. Signed so that a negative value can be rejected.
    pub retention_days: i64,

    #[serde(alias = "EXCLUDE_DIRS")]
    pub exclude_dirs: Vec<Utf8PathBuf>,

    /// Regular expressions matched against the full path of every entry.
    pub exclude_patterns: Vec<String>,

    /// Explicit roots. Empty means every mounted local volume.
    pub scan_roots: Vec<Utf8PathBuf>,

    pub dry_run: bool,

    #[serde(alias = "AutoDelete", alias = "autodelete")]
    pub auto_delete: bool,

    /// Upper bound on roots processed concurrently.
    pub max_workers: usize,

    pub follow_symlinks: bool,

    pub lock_retries: u32,

    pub lock_retry_delay_ms: u64,

    /// Minimum time a file must sit in quarantine before auto-delete may remove it.
    pub cleanup_grace_days: Option<u32>,

    #[serde(alias = "FILE_CATEGORIES")]
    pub file_categories: IndexMap<String, Vec<String>>,

    pub debug_mode: bool,

    pub log_json: bool,

    pub console_output: bool,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            quarantine_dir: None,
            log_dir: None,
            categories: vec!["all".to_string()],
            retention_days: default_retention_days(),
            exclude_dirs: default_exclude_dirs(),
            exclude_patterns: Vec::new(),
            scan_roots: Vec::new(),
            dry_run: false,
            auto_delete: false,
            max_workers: default_max_workers(),
            follow_symlinks: false,
            lock_retries: 3,
            lock_retry_delay_ms: 200,
            cleanup_grace_days: None,
            file_categories: default_file_categories(),
            debug_mode: false,
            log_json: false,
            console_output: true,
        }
    }
}

fn default_retention_days() -> i64 {
    7
}

fn default_max_workers() -> usize {
    2
}

/// Built-in category table.
pub fn default_file_categories() -> IndexMap<String, Vec<String>> {
    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|e| e.to_string()).collect()
    }

    let mut table = IndexMap::new();
    table.insert(
        "documents".to_string(),
        exts(&[
            ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".pdf", ".csv", ".rtf", ".txt",
        ]),
    );
    table.insert(
        "videos".to_string(),
        exts(&[
            ".mp4", ".avi", ".mov", ".mkv", ".wmv", ".m4v", ".3gp", ".flv", ".webm",
        ]),
    );
    table.insert(
        "images".to_string(),
        exts(&[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp"]),
    );
    table.insert(
        "archives".to_string(),
        exts(&[".zip", ".rar", ".7z", ".tar", ".gz"]),
    );
    table
}

/// System locations never worth scanning on this platform.
pub fn default_exclude_dirs() -> Vec<Utf8PathBuf> {
    let dirs: &[&str] = if cfg!(windows) {
        &[
            r"C:\Windows",
            r"C:\Program Files",
            r"C:\Program Files (x86)",
            r"C:\ProgramData",
            r"C:\Users\All Users",
            r"C:\$Recycle.Bin",
            r"C:\System Volume Information",
        ]
    } else {
        &["/proc", "/sys", "/dev", "/run"]
    };
    dirs.iter().map(Utf8PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_settings_defaults() {
        let settings = PurgeSettings::default();
        assert_eq!(settings.retention_days, 7);
        assert_eq!(settings.categories, vec!["all".to_string()]);
        assert!(!settings.dry_run);
        assert!(!settings.auto_delete);
        assert!(settings.cleanup_grace_days.is_none());
        assert!(settings.scan_roots.is_empty());
    }

    #[test]
    fn test_default_categories_include_txt_documents() {
        let table = default_file_categories();
        let documents = table.get("documents").unwrap();
        assert!(documents.contains(&".pdf".to_string()));
        assert!(documents.contains(&".txt".to_string()));
        assert_eq!(
            table.keys().collect::<Vec<_>>(),
            vec!["documents", "videos", "images", "archives"]
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "retention_days: 30\ndry_run: true\n";
        let settings: PurgeSettings = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(settings.retention_days, 30);
        assert!(settings.dry_run);
        assert_eq!(settings.max_workers, 2);
        assert!(settings.file_categories.contains_key("images"));
    }

    #[test]
    fn test_legacy_key_aliases() {
        let yaml = r#"
PROGRAM_DATA_DIR: /srv/purge
EXCLUDE_DIRS: [/srv/keep]
AutoDelete: true
FILE_CATEGORIES:
  logs: [".log"]
"#;
        let settings: PurgeSettings = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(settings.data_dir, Some(Utf8PathBuf::from("/srv/purge")));
        assert_eq!(settings.exclude_dirs, vec![Utf8PathBuf::from("/srv/keep")]);
        assert!(settings.auto_delete);
        assert_eq!(settings.file_categories.len(), 1);
    }
}
