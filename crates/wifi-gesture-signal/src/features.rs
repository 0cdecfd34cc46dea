//! Feature Extraction Module
//!
//! Reduces a conditioned magnitude series plus its signal-strength reading to
//! the fixed 14-component [`FeatureVector`] the gesture models are trained
//! on. Layout is given by [`Feature`].
//!
//! Numeric conventions:
//!
//! - standard deviations are population (divide by `n`)
//! - percentiles interpolate linearly between closest ranks
//! - first-difference statistics of a single-point series are 0
//! - the two correlation components compare subcarrier groups `[0, 10)` with
//!   `[10, 20)` and `[20, 30)`; they are 0 when the series has fewer than 30
//!   points or when the coefficient is undefined

use wifi_gesture_core::{ConditionedSeries, Feature, FeatureVector, FEATURE_COUNT};

/// Width of each correlation group.
pub const CORRELATION_GROUP_LEN: usize = 10;

/// Minimum series length for the correlation components.
pub const MIN_CORRELATION_LEN: usize = 3 * CORRELATION_GROUP_LEN;

/// Stateless feature extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Extract the feature vector.
    ///
    /// Returns `None` only for an empty series.
    pub fn extract(&self, series: &ConditionedSeries, signal_strength: f64) -> Option<FeatureVector> {
        self.extract_values(series.as_slice(), signal_strength)
    }

    /// Extract from a raw slice of conditioned magnitudes.
    pub fn extract_values(&self, values: &[f64], signal_strength: f64) -> Option<FeatureVector> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
        let (corr_12, corr_13) = group_correlations(values);

        let mut out = [0.0; FEATURE_COUNT];
        out[Feature::Mean.index()] = mean(values);
        out[Feature::StdDev.index()] = std_dev(values);
        out[Feature::Min.index()] = sorted[0];
        out[Feature::Max.index()] = sorted[sorted.len() - 1];
        out[Feature::Median.index()] = percentile_sorted(&sorted, 50.0);
        out[Feature::P25.index()] = percentile_sorted(&sorted, 25.0);
        out[Feature::P75.index()] = percentile_sorted(&sorted, 75.0);
        out[Feature::SignalStrength.index()] = signal_strength;
        out[Feature::SignalStrengthAbs.index()] = signal_strength.abs();
        out[Feature::Sum.index()] = values.iter().sum();
        out[Feature::DiffMean.index()] = mean(&diffs);
        out[Feature::DiffStdDev.index()] = std_dev(&diffs);
        out[Feature::CorrGroup12.index()] = corr_12;
        out[Feature::CorrGroup13.index()] = corr_13;

        Some(FeatureVector::new(out))
    }
}

fn group_correlations(values: &[f64]) -> (f64, f64) {
    if values.len() < MIN_CORRELATION_LEN {
        return (0.0, 0.0);
    }
    let g = CORRELATION_GROUP_LEN;
    let first = &values[..g];
    (
        pearson(first, &values[g..2 * g]),
        pearson(first, &values[2 * g..3 * g]),
    )
}

/// Arithmetic mean; 0 for an empty slice.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for an empty slice.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Pearson correlation, clamped to [-1, 1]; 0 when undefined.
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn extract(values: &[f64], rssi: f64) -> FeatureVector {
        FeatureExtractor::new().extract_values(values, rssi).unwrap()
    }

    #[test]
    fn test_basic_statistics() {
        let f = extract(&[1.0, 2.0, 3.0, 4.0], -50.0);
        assert_relative_eq!(f[Feature::Mean], 2.5);
        assert_relative_eq!(f[Feature::StdDev], 1.25_f64.sqrt());
        assert_relative_eq!(f[Feature::Min], 1.0);
        assert_relative_eq!(f[Feature::Max], 4.0);
        assert_relative_eq!(f[Feature::Median], 2.5);
        assert_relative_eq!(f[Feature::P25], 1.75);
        assert_relative_eq!(f[Feature::P75], 3.25);
        assert_relative_eq!(f[Feature::SignalStrength], -50.0);
        assert_relative_eq!(f[Feature::SignalStrengthAbs], 50.0);
        assert_relative_eq!(f[Feature::Sum], 10.0);
        assert_relative_eq!(f[Feature::DiffMean], 1.0);
        assert_relative_eq!(f[Feature::DiffStdDev], 0.0);
    }

    #[test]
    fn test_single_point_series() {
        let f = extract(&[7.0], -30.0);
        assert_eq!(f.as_slice().len(), FEATURE_COUNT);
        assert_relative_eq!(f[Feature::StdDev], 0.0);
        assert_relative_eq!(f[Feature::Median], 7.0);
        assert_eq!(f[Feature::DiffMean], 0.0);
        assert_eq!(f[Feature::DiffStdDev], 0.0);
        assert!(f.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_empty_series_has_no_features() {
        assert!(FeatureExtractor::new().extract_values(&[], -30.0).is_none());
    }

    #[test]
    fn test_short_series_has_zero_correlations() {
        for len in 1..MIN_CORRELATION_LEN {
            let values: Vec<f64> = (0..len).map(|i| (i * i) as f64).collect();
            let f = extract(&values, -40.0);
            assert_eq!(f[Feature::CorrGroup12], 0.0);
            assert_eq!(f[Feature::CorrGroup13], 0.0);
        }
    }

    #[test]
    fn test_correlated_groups() {
        // Groups 1 and 2 rise together, group 3 falls.
        let mut values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        values.extend((0..10).map(|i| 2.0 * i as f64 + 5.0));
        values.extend((0..10).map(|i| 100.0 - i as f64));
        let f = extract(&values, -40.0);
        assert_relative_eq!(f[Feature::CorrGroup12], 1.0, epsilon = 1e-12);
        assert_relative_eq!(f[Feature::CorrGroup13], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_groups_give_zero_not_nan() {
        let values = vec![4.0; 52];
        let f = extract(&values, -40.0);
        assert_eq!(f[Feature::CorrGroup12], 0.0);
        assert_eq!(f[Feature::CorrGroup13], 0.0);

        let mut values: Vec<f64> = vec![1.0; 10];
        values.extend((0..20).map(|i| i as f64));
        let f = extract(&values, -40.0);
        assert_eq!(f[Feature::CorrGroup12], 0.0);
        assert_eq!(f[Feature::CorrGroup13], 0.0);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_relative_eq!(percentile_sorted(&sorted, 0.0), 10.0);
        assert_relative_eq!(percentile_sorted(&sorted, 25.0), 20.0);
        assert_relative_eq!(percentile_sorted(&sorted, 60.0), 34.0, epsilon = 1e-9);
        assert_relative_eq!(percentile_sorted(&sorted, 100.0), 50.0);
    }
}
