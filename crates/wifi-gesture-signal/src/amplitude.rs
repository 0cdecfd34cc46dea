//! Amplitude Transform
//!
//! Pairs interleaved coefficients as `(re, im)` and takes the magnitude of
//! each complex value.

use num_complex::Complex64;
use wifi_gesture_core::{MagnitudeSeries, Sample};

/// Magnitudes of interleaved `[re, im, re, im, ...]` coefficients.
///
/// Returns `None` for an empty or odd-length input.
pub fn amplitude(coefficients: &[f64]) -> Option<MagnitudeSeries> {
    if coefficients.is_empty() || coefficients.len() % 2 != 0 {
        return None;
    }
    let magnitudes = coefficients
        .chunks_exact(2)
        .map(|pair| Complex64::new(pair[0], pair[1]).norm())
        .collect();
    MagnitudeSeries::new(magnitudes)
}

/// Magnitudes of a parsed sample's coefficients.
pub fn sample_amplitude(sample: &Sample) -> Option<MagnitudeSeries> {
    amplitude(sample.coefficients())
}
