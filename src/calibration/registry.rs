//! Versioned calibration snapshots
//!
//! Every fit produces a new immutable [`CalibrationSnapshot`]. The registry
//! publishes it through a `tokio::sync::watch` channel holding an `Arc`, so a
//! reader clones the pointer once at query start and keeps that snapshot for
//! the rest of the query, whatever the refit job publishes meanwhile.

use super::model::CalibrationModel;
use crate::error::Result;
use crate::types::{CalibratedConfidence, CalibrationMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Immutable calibration state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    /// Monotonic fit counter; 0 for the cold-start identity snapshot
    pub sequence: u64,
    /// `v{sequence}-{method}`, stamped on every calibrated confidence
    pub version: String,
    pub model: CalibrationModel,
    /// Labelled records the model was fitted on
    pub sample_count: usize,
    pub fitted_at: Option<DateTime<Utc>>,
    /// Training Brier score of the identity mapping
    pub brier_before: Option<f64>,
    /// Training Brier score of the fitted model
    pub brier_after: Option<f64>,
}

impl CalibrationSnapshot {
    /// Cold-start snapshot: identity mapping, method `none`
    pub fn identity() -> Self {
        Self {
            sequence: 0,
            version: "v0-identity".to_string(),
            model: CalibrationModel::Identity,
            sample_count: 0,
            fitted_at: None,
            brier_before: None,
            brier_after: None,
        }
    }

    pub fn fitted(
        sequence: u64,
        model: CalibrationModel,
        sample_count: usize,
        brier_before: f64,
        brier_after: f64,
    ) -> Self {
        Self {
            sequence,
            version: format!("v{}-{}", sequence, model.method()),
            model,
            sample_count,
            fitted_at: Some(Utc::now()),
            brier_before: Some(brier_before),
            brier_after: Some(brier_after),
        }
    }

    pub fn method(&self) -> CalibrationMethod {
        self.model.method()
    }

    /// Whether a fitted model is active
    pub fn is_fitted(&self) -> bool {
        !matches!(self.model, CalibrationModel::Identity)
    }

    pub fn calibrate(&self, raw_composite: f64) -> CalibratedConfidence {
        CalibratedConfidence {
            raw_composite,
            calibrated: self.model.apply(raw_composite),
            method: self.method(),
            model_version: self.version.clone(),
        }
    }

    /// Read a snapshot saved with [`save`](Self::save); `None` if the file
    /// does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("No calibration snapshot at {:?}", path);
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        debug!("Loaded calibration snapshot {} from {:?}", snapshot.version, path);
        Ok(Some(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved calibration snapshot {} to {:?}", self.version, path);
        Ok(())
    }
}

/// Holder of the current snapshot
pub struct CalibrationRegistry {
    sender: watch::Sender<Arc<CalibrationSnapshot>>,
}

impl CalibrationRegistry {
    pub fn new(initial: CalibrationSnapshot) -> Self {
        let (sender, _receiver) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Snapshot in force right now
    pub fn current(&self) -> Arc<CalibrationSnapshot> {
        self.sender.borrow().clone()
    }

    /// Atomically replace the current snapshot
    pub fn publish(&self, snapshot: CalibrationSnapshot) {
        info!(
            "Publishing calibration snapshot {} ({} samples)",
            snapshot.version, snapshot.sample_count
        );
        self.sender.send_replace(Arc::new(snapshot));
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Arc<CalibrationSnapshot>> {
        self.sender.subscribe()
    }

    /// Sequence number for the next fit
    pub fn next_sequence(&self) -> u64 {
        self.sender.borrow().sequence + 1
    }
}

impl Default for CalibrationRegistry {
    fn default() -> Self {
        Self::new(CalibrationSnapshot::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_is_identity() {
        let registry = CalibrationRegistry::default();
        let snapshot = registry.current();

        assert_eq!(snapshot.method(), CalibrationMethod::None);
        assert!(!snapshot.is_fitted());

        let confidence = snapshot.calibrate(0.73);
        assert_eq!(confidence.calibrated, 0.73);
        assert_eq!(confidence.method, CalibrationMethod::None);
        assert_eq!(confidence.model_version, "v0-identity");
    }

    #[test]
    fn test_held_snapshot_survives_publish() {
        let registry = CalibrationRegistry::default();
        let held = registry.current();

        registry.publish(CalibrationSnapshot::fitted(
            registry.next_sequence(),
            CalibrationModel::Platt { a: 4.0, b: -2.0 },
            250,
            0.2,
            0.15,
        ));

        assert_eq!(held.version, "v0-identity");
        assert_eq!(held.calibrate(0.9).calibrated, 0.9);

        let current = registry.current();
        assert_eq!(current.version, "v1-platt");
        assert_eq!(current.sample_count, 250);
        assert!(current.fitted_at.is_some());
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("calibration.json");
        assert!(CalibrationSnapshot::load(&path).unwrap().is_none());

        let snapshot = CalibrationSnapshot::fitted(
            3,
            CalibrationModel::Platt { a: 5.0, b: -2.5 },
            410,
            0.22,
            0.16,
        );
        snapshot.save(&path).unwrap();

        let loaded = CalibrationSnapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.calibrate(0.5).model_version, "v3-platt");
    }

    #[tokio::test]
    async fn test_subscribers_see_publish() {
        let registry = CalibrationRegistry::default();
        let mut receiver = registry.subscribe();

        registry.publish(CalibrationSnapshot::fitted(
            1,
            CalibrationModel::Temperature { temperature: 2.0 },
            300,
            0.2,
            0.18,
        ));

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow().version, "v1-temperature");
    }
}
