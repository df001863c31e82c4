//! SafePurge - age-based quarantine of stale user files
//!
//! Main entry point for one unattended purge run.
//!
//! # Execution Flow
//!
//! 1. Locate the configuration directory (first argument, else `SafePurge Data/`)
//! 2. Load `safepurge.yaml` (or legacy `config.json`) plus `SAFEPURGE_*` overrides
//! 3. Resolve and validate the run configuration; faults here abort before any scan
//! 4. Initialize logging → `<log dir>/safepurge.<date>`
//! 5. Create the tokio runtime and run the engine to completion
//! 6. Log the run summary
//!
//! Per-file and per-root problems never fail the process; they are recorded
//! in the scan log and the summary. Only configuration and setup faults
//! produce a non-zero exit.

use anyhow::{Context, Result};
use safepurge::logging::{LoggingOptions, setup_logging};
use safepurge::{APP_NAME, ConfigManager, PurgeEngine, RunConfiguration, VERSION};

const DEFAULT_CONFIG_DIR: &str = "SafePurge Data";

fn main() -> Result<()> {
    let config_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());

    let config_manager = ConfigManager::new(config_dir.as_str())?;
    let settings = config_manager.load_settings()?;
    let run_config = RunConfiguration::from_settings(&settings)
        .with_context(|| format!("Invalid configuration in {}", config_manager.config_dir()))?;

    // Guard must live until exit to flush the non-blocking writer
    let _log_guard = setup_logging(
        &run_config.log_dir,
        "safepurge",
        LoggingOptions {
            debug_mode: settings.debug_mode,
            json: settings.log_json,
            console_output: settings.console_output,
        },
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Settings: {}", config_manager.settings_path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(run_config.max_workers.max(1))
        .thread_name("safepurge-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let engine = PurgeEngine::new(run_config);
    let result = runtime.block_on(engine.run());

    let summary = result.map_err(|e| {
        tracing::error!("Run aborted: {}", e);
        anyhow::Error::new(e).context("Purge run aborted")
    })?;

    summary.log();
    if !summary.is_clean() {
        tracing::warn!("Run completed with errors; see the scan log for details");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
