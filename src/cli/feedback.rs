//! Label a delivered answer as correct or incorrect

use aletheia_core::{error::Result, feedback::record_label, PipelineConfig, QueryId};
use std::path::Path;

use super::helpers::open_store;

/// Handle the feedback command
pub async fn handle(
    config: &PipelineConfig,
    query_id: QueryId,
    correct: bool,
    db_path: Option<&Path>,
) -> Result<()> {
    let store = open_store(db_path, config).await?;
    let label = record_label(store.as_ref(), query_id, correct).await?;

    println!(
        "Recorded query {} as {} (record {})",
        query_id,
        if correct { "correct" } else { "incorrect" },
        label.id
    );
    Ok(())
}
