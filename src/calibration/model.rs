//! Calibration models and their fitting procedures
//!
//! Each method is one variant of [`CalibrationModel`] with a fit function and
//! an `apply` arm:
//!
//! - temperature: `sigmoid(logit(raw) / T)`, `T` minimising log loss
//! - isotonic: monotone step function from pool-adjacent-violators
//! - Platt: `sigmoid(a * raw + b)` by regularised Newton-Raphson

use crate::error::{AletheiaError, Result};
use crate::types::CalibrationMethod;
use serde::{Deserialize, Serialize};
use tracing::debug;

const LOGIT_EPS: f64 = 1e-6;
const GOLDEN_SECTION_ITERATIONS: usize = 100;
const NEWTON_MAX_ITERATIONS: usize = 100;
const NEWTON_TOLERANCE: f64 = 1e-10;
const PLATT_RIDGE: f64 = 1e-6;

/// One labelled outcome: the raw composite and whether the answer was correct
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelledSample {
    pub raw: f64,
    pub correct: bool,
}

impl LabelledSample {
    pub fn new(raw: f64, correct: bool) -> Self {
        Self { raw, correct }
    }

    pub fn target(&self) -> f64 {
        if self.correct {
            1.0
        } else {
            0.0
        }
    }
}

/// Constant segment of an isotonic step function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotonicBlock {
    /// Smallest raw value pooled into this block
    pub lower: f64,
    /// Largest raw value pooled into this block
    pub upper: f64,
    /// Observed accuracy of the block
    pub value: f64,
}

/// Fitted mapping from raw composite to calibrated probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CalibrationModel {
    Identity,
    Temperature { temperature: f64 },
    Isotonic { blocks: Vec<IsotonicBlock> },
    Platt { a: f64, b: f64 },
}

impl CalibrationModel {
    pub fn method(&self) -> CalibrationMethod {
        match self {
            CalibrationModel::Identity => CalibrationMethod::None,
            CalibrationModel::Temperature { .. } => CalibrationMethod::Temperature,
            CalibrationModel::Isotonic { .. } => CalibrationMethod::Isotonic,
            CalibrationModel::Platt { .. } => CalibrationMethod::Platt,
        }
    }

    /// Calibrated probability for a raw composite, always in `[0, 1]`
    pub fn apply(&self, raw: f64) -> f64 {
        let raw = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) };
        let calibrated = match self {
            CalibrationModel::Identity => raw,
            CalibrationModel::Temperature { temperature } => sigmoid(logit(raw) / temperature),
            CalibrationModel::Isotonic { blocks } => apply_isotonic(blocks, raw),
            CalibrationModel::Platt { a, b } => sigmoid(a * raw + b),
        };
        calibrated.clamp(0.0, 1.0)
    }
}

/// Bounds for the temperature search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for TemperatureBounds {
    fn default() -> Self {
        Self {
            min: 0.05,
            max: 20.0,
        }
    }
}

/// Fit a model of the given method
pub fn fit(
    method: CalibrationMethod,
    samples: &[LabelledSample],
    bounds: TemperatureBounds,
) -> Result<CalibrationModel> {
    if samples.is_empty() {
        return Err(AletheiaError::InsufficientFeedback {
            required: 1,
            available: 0,
        });
    }

    let model = match method {
        CalibrationMethod::None => CalibrationModel::Identity,
        CalibrationMethod::Temperature => CalibrationModel::Temperature {
            temperature: fit_temperature(samples, bounds),
        },
        CalibrationMethod::Isotonic => CalibrationModel::Isotonic {
            blocks: fit_isotonic(samples),
        },
        CalibrationMethod::Platt => {
            let (a, b) = fit_platt(samples);
            CalibrationModel::Platt { a, b }
        }
    };

    debug!("Fitted {} calibration on {} samples", method, samples.len());
    Ok(model)
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Log-odds with the input clamped away from 0 and 1
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

fn log_loss(samples: &[LabelledSample], predict: impl Fn(f64) -> f64) -> f64 {
    samples
        .iter()
        .map(|s| {
            let p = predict(s.raw).clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
            if s.correct {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum::<f64>()
        / samples.len() as f64
}

/// Temperature minimising log loss, by golden-section search on `ln T`
///
/// Log loss is convex in `1 / T`, so it is unimodal in `ln T`.
pub fn fit_temperature(samples: &[LabelledSample], bounds: TemperatureBounds) -> f64 {
    let logits: Vec<(f64, bool)> = samples.iter().map(|s| (logit(s.raw), s.correct)).collect();
    let loss = |log_t: f64| {
        let t = log_t.exp();
        logits
            .iter()
            .map(|(z, correct)| {
                let p = sigmoid(z / t).clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
                if *correct {
                    -p.ln()
                } else {
                    -(1.0 - p).ln()
                }
            })
            .sum::<f64>()
    };

    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let mut lo = bounds.min.ln();
    let mut hi = bounds.max.ln();
    let mut c = hi - inv_phi * (hi - lo);
    let mut d = lo + inv_phi * (hi - lo);
    let mut fc = loss(c);
    let mut fd = loss(d);

    for _ in 0..GOLDEN_SECTION_ITERATIONS {
        if fc < fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - inv_phi * (hi - lo);
            fc = loss(c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + inv_phi * (hi - lo);
            fd = loss(d);
        }
    }

    ((lo + hi) / 2.0).exp()
}

/// Pool-adjacent-violators fit; samples with equal raw values are pooled first
pub fn fit_isotonic(samples: &[LabelledSample]) -> Vec<IsotonicBlock> {
    struct Block {
        lower: f64,
        upper: f64,
        sum: f64,
        weight: f64,
    }

    impl Block {
        fn mean(&self) -> f64 {
            self.sum / self.weight
        }
    }

    let mut sorted: Vec<LabelledSample> = samples
        .iter()
        .filter(|s| !s.raw.is_nan())
        .copied()
        .collect();
    sorted.sort_by(|a, b| a.raw.total_cmp(&b.raw));

    let mut blocks: Vec<Block> = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let x = sorted[i].raw;
        let mut sum = 0.0;
        let mut weight = 0.0;
        while i < sorted.len() && sorted[i].raw == x {
            sum += sorted[i].target();
            weight += 1.0;
            i += 1;
        }

        blocks.push(Block {
            lower: x,
            upper: x,
            sum,
            weight,
        });

        // Merge backwards while the last two blocks violate monotonicity
        while let [.., prev, last] = blocks.as_slice() {
            if prev.mean() <= last.mean() {
                break;
            }
            if let Some(last) = blocks.pop() {
                if let Some(prev) = blocks.last_mut() {
                    prev.upper = last.upper;
                    prev.sum += last.sum;
                    prev.weight += last.weight;
                }
            }
        }
    }

    blocks
        .into_iter()
        .map(|b| IsotonicBlock {
            lower: b.lower,
            upper: b.upper,
            value: b.mean(),
        })
        .collect()
}

/// Step function lookup: value of the last block starting at or below `raw`
fn apply_isotonic(blocks: &[IsotonicBlock], raw: f64) -> f64 {
    if blocks.is_empty() {
        return raw;
    }
    let idx = blocks.partition_point(|b| b.lower <= raw);
    if idx == 0 {
        blocks[0].value
    } else {
        blocks[idx - 1].value
    }
}

/// Platt scaling `(a, b)` with smoothed targets
pub fn fit_platt(samples: &[LabelledSample]) -> (f64, f64) {
    let positives = samples.iter().filter(|s| s.correct).count() as f64;
    let negatives = samples.len() as f64 - positives;
    let hi_target = (positives + 1.0) / (positives + 2.0);
    let lo_target = 1.0 / (negatives + 2.0);

    let points: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| {
            let target = if s.correct { hi_target } else { lo_target };
            (s.raw.clamp(0.0, 1.0), target)
        })
        .collect();

    let prior = (positives + 1.0) / (samples.len() as f64 + 2.0);
    let mut a = 0.0;
    let mut b = logit(prior);

    for _ in 0..NEWTON_MAX_ITERATIONS {
        let mut g_a = PLATT_RIDGE * a;
        let mut g_b = PLATT_RIDGE * b;
        let mut h_aa = PLATT_RIDGE;
        let mut h_ab = 0.0;
        let mut h_bb = PLATT_RIDGE;

        for &(x, t) in &points {
            let p = sigmoid(a * x + b);
            let residual = p - t;
            let w = (p * (1.0 - p)).max(1e-12);
            g_a += residual * x;
            g_b += residual;
            h_aa += w * x * x;
            h_ab += w * x;
            h_bb += w;
        }

        let det = h_aa * h_bb - h_ab * h_ab;
        if det.abs() < 1e-18 {
            break;
        }
        let step_a = (h_bb * g_a - h_ab * g_b) / det;
        let step_b = (h_aa * g_b - h_ab * g_a) / det;

        // Backtrack if the full step does not reduce the loss
        let current = platt_loss(&points, a, b);
        let mut scale = 1.0;
        let (mut next_a, mut next_b) = (a - step_a, b - step_b);
        while platt_loss(&points, next_a, next_b) > current && scale > 1e-4 {
            scale /= 2.0;
            next_a = a - scale * step_a;
            next_b = b - scale * step_b;
        }

        let moved = (next_a - a).abs() + (next_b - b).abs();
        a = next_a;
        b = next_b;
        if moved < NEWTON_TOLERANCE {
            break;
        }
    }

    (a, b)
}

fn platt_loss(points: &[(f64, f64)], a: f64, b: f64) -> f64 {
    let data: f64 = points
        .iter()
        .map(|&(x, t)| {
            let p = sigmoid(a * x + b).clamp(1e-15, 1.0 - 1e-15);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    data + 0.5 * PLATT_RIDGE * (a * a + b * b)
}

/// Mean log loss of a fitted model, for diagnostics
pub fn model_log_loss(model: &CalibrationModel, samples: &[LabelledSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    log_loss(samples, |x| model.apply(x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identity_apply() {
        assert_eq!(CalibrationModel::Identity.apply(0.42), 0.42);
        assert_eq!(CalibrationModel::Identity.apply(1.7), 1.0);
        assert_eq!(CalibrationModel::Identity.method(), CalibrationMethod::None);
    }

    #[test]
    fn test_temperature_one_is_near_identity() {
        let model = CalibrationModel::Temperature { temperature: 1.0 };
        for raw in [0.1, 0.5, 0.9] {
            assert!((model.apply(raw) - raw).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fit_temperature_recovers_overconfidence() {
        // Outcomes drawn so that the true probability is sigmoid(logit(x) / 2):
        // each raw value appears with the exact proportion of correct labels.
        let mut samples = Vec::new();
        for raw in [0.1, 0.2, 0.3, 0.7, 0.8, 0.9] {
            let p = sigmoid(logit(raw) / 2.0);
            let correct = (p * 100.0).round() as usize;
            for i in 0..100 {
                samples.push(LabelledSample::new(raw, i < correct));
            }
        }

        let t = fit_temperature(&samples, TemperatureBounds::default());
        assert!((t - 2.0).abs() < 0.1, "temperature was {}", t);
    }

    #[test]
    fn test_isotonic_pools_violators() {
        let samples = vec![
            LabelledSample::new(0.1, false),
            LabelledSample::new(0.2, true),
            LabelledSample::new(0.3, false),
            LabelledSample::new(0.4, true),
        ];
        let blocks = fit_isotonic(&samples);

        // 0.2 (1.0) and 0.3 (0.0) violate order and pool to 0.5
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].value, 0.0);
        assert_eq!(blocks[1].value, 0.5);
        assert_eq!(blocks[1].lower, 0.2);
        assert_eq!(blocks[1].upper, 0.3);
        assert_eq!(blocks[2].value, 1.0);
    }

    #[test]
    fn test_isotonic_groups_ties() {
        let samples = vec![
            LabelledSample::new(0.5, true),
            LabelledSample::new(0.5, false),
            LabelledSample::new(0.5, true),
            LabelledSample::new(0.5, true),
        ];
        let blocks = fit_isotonic(&samples);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].value, 0.75);
    }

    #[test]
    fn test_isotonic_step_lookup() {
        let model = CalibrationModel::Isotonic {
            blocks: vec![
                IsotonicBlock { lower: 0.2, upper: 0.3, value: 0.1 },
                IsotonicBlock { lower: 0.5, upper: 0.6, value: 0.4 },
                IsotonicBlock { lower: 0.8, upper: 0.9, value: 0.95 },
            ],
        };
        assert_eq!(model.apply(0.0), 0.1);
        assert_eq!(model.apply(0.45), 0.1);
        assert_eq!(model.apply(0.5), 0.4);
        assert_eq!(model.apply(0.79), 0.4);
        assert_eq!(model.apply(1.0), 0.95);
    }

    #[test]
    fn test_platt_learns_increasing_mapping() {
        let mut samples = Vec::new();
        for i in 0..200 {
            let raw = i as f64 / 200.0;
            samples.push(LabelledSample::new(raw, raw > 0.5));
        }
        let (a, b) = fit_platt(&samples);
        assert!(a > 0.0);
        let model = CalibrationModel::Platt { a, b };
        assert!(model.apply(0.9) > 0.8);
        assert!(model.apply(0.1) < 0.2);
    }

    #[test]
    fn test_fit_rejects_empty_samples() {
        let result = fit(CalibrationMethod::Isotonic, &[], TemperatureBounds::default());
        assert!(matches!(result, Err(AletheiaError::InsufficientFeedback { .. })));
    }

    #[test]
    fn test_logit_is_clamped() {
        assert!(logit(0.0).is_finite());
        assert!(logit(1.0).is_finite());
        assert!((sigmoid(logit(0.3)) - 0.3).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_isotonic_is_monotone(
            data in proptest::collection::vec((0.0f64..=1.0, any::<bool>()), 1..200),
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
        ) {
            let samples: Vec<LabelledSample> =
                data.iter().map(|(raw, correct)| LabelledSample::new(*raw, *correct)).collect();
            let model = CalibrationModel::Isotonic { blocks: fit_isotonic(&samples) };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(model.apply(lo) <= model.apply(hi));
        }

        #[test]
        fn prop_calibrated_in_unit_range(
            raw in -1.0f64..=2.0,
            t in 0.05f64..=20.0,
            pa in -20.0f64..=20.0,
            pb in -20.0f64..=20.0,
        ) {
            for model in [
                CalibrationModel::Identity,
                CalibrationModel::Temperature { temperature: t },
                CalibrationModel::Platt { a: pa, b: pb },
            ] {
                let p = model.apply(raw);
                prop_assert!((0.0..=1.0).contains(&p));
            }
        }
    }
}
