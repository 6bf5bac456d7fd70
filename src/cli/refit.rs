//! Run one calibration refit and persist the result

use aletheia_core::{
    error::{AletheiaError, Result},
    CalibrationRefitter, PipelineConfig, RefitOutcome,
};
use std::path::Path;

use super::helpers::{load_registry, open_store, print_json, snapshot_path};

/// Handle the refit command
pub async fn handle(config: &PipelineConfig, json_output: bool, db_path: Option<&Path>) -> Result<()> {
    let store = open_store(db_path, config).await?;
    let registry = load_registry(config)?;
    let refitter = CalibrationRefitter::new(config.calibration.clone(), store, registry.clone());

    let outcome = match refitter.refit_once().await {
        Ok(outcome) => outcome,
        Err(AletheiaError::InsufficientFeedback { required, available }) => {
            println!(
                "Not enough new feedback to refit: {} labelled records, {} required",
                available, required
            );
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if let RefitOutcome::Published { .. } = outcome {
        registry.current().save(&snapshot_path(config))?;
    }

    if json_output {
        return print_json(&outcome);
    }

    match outcome {
        RefitOutcome::Published {
            version,
            sample_count,
            brier_before,
            brier_after,
        } => println!(
            "Published {} from {} samples (Brier {:.4} -> {:.4})",
            version, sample_count, brier_before, brier_after
        ),
        RefitOutcome::Rejected {
            sample_count,
            brier_before,
            brier_after,
        } => println!(
            "Rejected fit on {} samples: Brier {:.4} would worsen to {:.4}",
            sample_count, brier_before, brier_after
        ),
        RefitOutcome::Disabled => println!("Calibration method is none; nothing to fit"),
    }
    Ok(())
}
