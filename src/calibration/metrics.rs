//! Calibration quality metrics

use super::model::LabelledSample;

/// Default number of bins for expected calibration error
pub const DEFAULT_ECE_BINS: usize = 10;

/// Mean squared error between predicted probability and outcome
///
/// Returns 0 for an empty set.
pub fn brier_score<F>(samples: &[LabelledSample], predict: F) -> f64
where
    F: Fn(f64) -> f64,
{
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .map(|s| {
            let diff = predict(s.raw) - s.target();
            diff * diff
        })
        .sum();
    total / samples.len() as f64
}

/// Expected calibration error over `bins` equal-width bins
///
/// Weighted mean over bins of `|mean predicted - observed accuracy|`.
pub fn expected_calibration_error<F>(samples: &[LabelledSample], bins: usize, predict: F) -> f64
where
    F: Fn(f64) -> f64,
{
    if samples.is_empty() || bins == 0 {
        return 0.0;
    }

    let mut confidence_sum = vec![0.0f64; bins];
    let mut correct_sum = vec![0.0f64; bins];
    let mut counts = vec![0usize; bins];

    for sample in samples {
        let p = predict(sample.raw).clamp(0.0, 1.0);
        let bin = ((p * bins as f64) as usize).min(bins - 1);
        confidence_sum[bin] += p;
        correct_sum[bin] += sample.target();
        counts[bin] += 1;
    }

    let n = samples.len() as f64;
    (0..bins)
        .filter(|&b| counts[b] > 0)
        .map(|b| {
            let count = counts[b] as f64;
            let gap = (confidence_sum[b] / count - correct_sum[b] / count).abs();
            gap * count / n
        })
        .sum()
}
