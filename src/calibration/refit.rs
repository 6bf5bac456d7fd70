//! Calibration refit job
//!
//! Reads a consistent batch of feedback, fits the configured method and
//! publishes a new snapshot. Runs off the request path; queries only ever see
//! the registry's atomic pointer swap.

use super::metrics::brier_score;
use super::model::{fit, TemperatureBounds};
use super::registry::{CalibrationRegistry, CalibrationSnapshot};
use crate::config::CalibrationConfig;
use crate::error::{AletheiaError, Result};
use crate::feedback::{labelled_samples, resolve_labels, FeedbackStore};
use crate::types::CalibrationMethod;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one refit attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefitOutcome {
    /// New snapshot is live
    Published {
        version: String,
        sample_count: usize,
        brier_before: f64,
        brier_after: f64,
    },
    /// Fitted model scored worse than identity; previous snapshot kept
    Rejected {
        sample_count: usize,
        brier_before: f64,
        brier_after: f64,
    },
    /// Calibration method is `none`
    Disabled,
}

pub struct CalibrationRefitter {
    config: CalibrationConfig,
    store: Arc<dyn FeedbackStore>,
    registry: Arc<CalibrationRegistry>,
}

impl CalibrationRefitter {
    pub fn new(
        config: CalibrationConfig,
        store: Arc<dyn FeedbackStore>,
        registry: Arc<CalibrationRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
        }
    }

    /// Run a single refit
    ///
    /// Fails with `InsufficientFeedback` when fewer than
    /// `min_feedback_count` labelled records arrived since the current
    /// snapshot was fitted.
    pub async fn refit_once(&self) -> Result<RefitOutcome> {
        let method = self.config.method;
        if method == CalibrationMethod::None {
            debug!("Calibration method is none, skipping refit");
            return Ok(RefitOutcome::Disabled);
        }

        // Cut-off one millisecond ahead so records stamped this millisecond count
        let cutoff = Utc::now() + ChronoDuration::milliseconds(1);
        let records = self
            .store
            .records_between(DateTime::<Utc>::MIN_UTC, cutoff)
            .await?;
        let resolved = resolve_labels(&records);

        let current = self.registry.current();
        let fresh = match current.fitted_at {
            Some(fitted_at) => resolved.iter().filter(|r| r.timestamp > fitted_at).count(),
            None => resolved.len(),
        };
        if fresh < self.config.min_feedback_count {
            return Err(AletheiaError::InsufficientFeedback {
                required: self.config.min_feedback_count,
                available: fresh,
            });
        }

        let samples = labelled_samples(&resolved);
        let bounds = TemperatureBounds {
            min: self.config.min_temperature,
            max: self.config.max_temperature,
        };
        let model = fit(method, &samples, bounds)?;

        let brier_before = brier_score(&samples, |raw| raw.clamp(0.0, 1.0));
        let brier_after = brier_score(&samples, |raw| model.apply(raw));

        if brier_after > brier_before {
            warn!(
                "Rejecting {} fit: Brier {:.4} is worse than identity {:.4}",
                method, brier_after, brier_before
            );
            return Ok(RefitOutcome::Rejected {
                sample_count: samples.len(),
                brier_before,
                brier_after,
            });
        }

        let snapshot = CalibrationSnapshot::fitted(
            self.registry.next_sequence(),
            model,
            samples.len(),
            brier_before,
            brier_after,
        );
        let version = snapshot.version.clone();
        self.registry.publish(snapshot);

        Ok(RefitOutcome::Published {
            version,
            sample_count: samples.len(),
            brier_before,
            brier_after,
        })
    }

    /// Refit every `refit_interval` until `shutdown` fires
    ///
    /// The first attempt runs immediately.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.refit_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Calibration refit job started (every {:?})",
                self.config.refit_interval()
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Calibration refit job stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.refit_once().await {
                            Ok(outcome) => debug!("Refit finished: {:?}", outcome),
                            Err(AletheiaError::InsufficientFeedback { required, available }) => {
                                debug!(
                                    "Skipping refit: {} new labelled records, {} required",
                                    available, required
                                );
                            }
                            Err(e) => warn!("Calibration refit failed: {}", e),
                        }
                    }
                }
            }
        })
    }
}
