//! Confidence calibration
//!
//! [`ConfidenceCalibrator`] maps a raw composite to a calibrated probability
//! using whatever snapshot the [`CalibrationRegistry`] holds. Before the first
//! successful fit that snapshot is the identity mapping with method `none`.
//! Fitting happens in [`CalibrationRefitter`], never on the request path.

pub mod metrics;
pub mod model;
pub mod refit;
pub mod registry;

pub use metrics::{brier_score, expected_calibration_error, DEFAULT_ECE_BINS};
pub use model::{fit, CalibrationModel, IsotonicBlock, LabelledSample, TemperatureBounds};
pub use refit::{CalibrationRefitter, RefitOutcome};
pub use registry::{CalibrationRegistry, CalibrationSnapshot};

use crate::types::{CalibratedConfidence, CalibrationMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Observability view of the active calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub method: CalibrationMethod,
    pub model_version: String,
    pub sample_count: usize,
    pub last_fit_timestamp: Option<DateTime<Utc>>,
}

impl From<&CalibrationSnapshot> for CalibrationStatus {
    fn from(snapshot: &CalibrationSnapshot) -> Self {
        Self {
            method: snapshot.method(),
            model_version: snapshot.version.clone(),
            sample_count: snapshot.sample_count,
            last_fit_timestamp: snapshot.fitted_at,
        }
    }
}

/// Request-path calibrator
#[derive(Clone)]
pub struct ConfidenceCalibrator {
    registry: Arc<CalibrationRegistry>,
}

impl ConfidenceCalibrator {
    pub fn new(registry: Arc<CalibrationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CalibrationRegistry> {
        &self.registry
    }

    /// Snapshot to hold for the duration of one query
    pub fn snapshot(&self) -> Arc<CalibrationSnapshot> {
        self.registry.current()
    }

    /// Calibrate against the current snapshot
    pub fn calibrate(&self, raw_composite: f64) -> CalibratedConfidence {
        self.snapshot().calibrate(raw_composite)
    }

    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus::from(self.snapshot().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tracks_published_snapshot() {
        let calibrator = ConfidenceCalibrator::new(Arc::new(CalibrationRegistry::default()));

        let cold = calibrator.status();
        assert_eq!(cold.method, CalibrationMethod::None);
        assert_eq!(cold.model_version, "v0-identity");
        assert_eq!(cold.sample_count, 0);
        assert!(cold.last_fit_timestamp.is_none());

        calibrator.registry().publish(CalibrationSnapshot::fitted(
            1,
            CalibrationModel::Platt { a: 6.0, b: -3.0 },
            220,
            0.21,
            0.17,
        ));

        let warm = calibrator.status();
        assert_eq!(warm.method, CalibrationMethod::Platt);
        assert_eq!(warm.model_version, "v1-platt");
        assert_eq!(warm.sample_count, 220);
        assert!(warm.last_fit_timestamp.is_some());

        let confidence = calibrator.calibrate(0.5);
        assert!((confidence.calibrated - 0.5).abs() < 1e-12);
        assert_eq!(confidence.model_version, "v1-platt");
    }
}
