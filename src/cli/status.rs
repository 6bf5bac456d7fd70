//! Show the active calibration

use aletheia_core::{error::Result, feedback::FeedbackStore, CalibrationStatus, PipelineConfig};
use serde_json::json;
use std::path::Path;

use super::helpers::{load_registry, open_store, print_json};

/// Handle the status command
pub async fn handle(config: &PipelineConfig, json_output: bool, db_path: Option<&Path>) -> Result<()> {
    let registry = load_registry(config)?;
    let status = CalibrationStatus::from(registry.current().as_ref());
    let store = open_store(db_path, config).await?;
    let records = store.count().await?;

    if json_output {
        return print_json(&json!({
            "calibration": status,
            "feedback_records": records,
        }));
    }

    println!("Calibration method:  {}", status.method);
    println!("Model version:       {}", status.model_version);
    println!("Training samples:    {}", status.sample_count);
    match status.last_fit_timestamp {
        Some(at) => println!("Last fit:            {}", at.to_rfc3339()),
        None => println!("Last fit:            never (identity mapping)"),
    }
    println!("Feedback records:    {}", records);
    Ok(())
}
