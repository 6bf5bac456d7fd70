//! Shared helper functions for CLI commands

use aletheia_core::{
    error::Result, CalibrationRegistry, CalibrationSnapshot, LibsqlFeedbackStore, PipelineConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Feedback database path from the CLI flag, falling back to configuration
pub fn db_path(cli_path: Option<&Path>, config: &PipelineConfig) -> PathBuf {
    cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.feedback.db_path))
}

pub fn snapshot_path(config: &PipelineConfig) -> PathBuf {
    PathBuf::from(&config.feedback.snapshot_path)
}

pub async fn open_store(
    cli_path: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Arc<LibsqlFeedbackStore>> {
    let path = db_path(cli_path, config);
    debug!("Using feedback database {:?}", path);
    Ok(Arc::new(LibsqlFeedbackStore::open(&path).await?))
}

/// Registry seeded with the last saved snapshot, or identity on cold start
pub fn load_registry(config: &PipelineConfig) -> Result<Arc<CalibrationRegistry>> {
    let snapshot = CalibrationSnapshot::load(&snapshot_path(config))?
        .unwrap_or_else(CalibrationSnapshot::identity);
    Ok(Arc::new(CalibrationRegistry::new(snapshot)))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
