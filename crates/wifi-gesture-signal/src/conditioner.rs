//! Signal Conditioner
//!
//! Zero-phase low-pass smoothing of a magnitude series.
//!
//! The filter is a digital Butterworth low-pass designed by the bilinear
//! transform and stored as cascaded second-order sections (SOS). Zero-phase
//! filtering runs the cascade forward and backward over an odd-extended copy
//! of the input, with each pass started from the steady-state initial
//! conditions scaled by the first sample. Both the section layout and the
//! padding rule match the conventional `sosfiltfilt` formulation, so trained
//! models see the same conditioned values they were trained on.
//!
//! The coefficients are computed once in [`SosFilter::butterworth_lowpass`]
//! and never mutated afterwards.
//!
//! # Example
//!
//! ```rust
//! use wifi_gesture_signal::SosFilter;
//!
//! let filter = SosFilter::butterworth_lowpass(4, 0.1).unwrap();
//! assert_eq!(filter.sections().len(), 2);
//! assert_eq!(filter.padlen(), 15);
//! ```

use std::f64::consts::PI;

use num_complex::Complex64;
use thiserror::Error;
use wifi_gesture_core::{ConditionedSeries, MagnitudeSeries};

/// Default filter order.
pub const DEFAULT_FILTER_ORDER: usize = 4;

/// Default cutoff as a fraction of the Nyquist frequency.
pub const DEFAULT_CUTOFF: f64 = 0.1;

/// Highest supported filter order.
pub const MAX_FILTER_ORDER: usize = 8;

const REAL_POLE_TOLERANCE: f64 = 1e-12;

/// Errors from filter design or application.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// Filter order out of range.
    #[error("Filter order must be in 1..={max}, got {order}")]
    InvalidOrder {
        /// Requested order
        order: usize,
        /// Maximum supported order
        max: usize,
    },

    /// Cutoff outside the open interval (0, 1).
    #[error("Cutoff must be in (0, 1) of Nyquist, got {cutoff}")]
    InvalidCutoff {
        /// Requested cutoff
        cutoff: f64,
    },

    /// The input is too short for the edge padding.
    #[error("Input length {len} must be greater than padding length {padlen}")]
    InputTooShort {
        /// Input length
        len: usize,
        /// Required padding length
        padlen: usize,
    },
}

/// One biquad section: `b` numerator and `a` denominator, `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SosSection {
    /// Numerator coefficients
    pub b: [f64; 3],
    /// Denominator coefficients
    pub a: [f64; 3],
}

impl SosSection {
    /// Steady-state initial conditions for a unit step input.
    fn step_zi(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let p0 = b1 - a1 * b0;
        let p1 = b2 - a2 * b0;
        let z0 = (p0 + p1) / (1.0 + a1 + a2);
        [z0, p1 - a2 * z0]
    }

    /// DC gain of the section.
    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }
}

/// Cascaded second-order-section filter.
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<SosSection>,
    zi: Vec<[f64; 2]>,
    padlen: usize,
}

impl SosFilter {
    /// Design a digital Butterworth low-pass filter.
    ///
    /// `cutoff` is normalised to the Nyquist frequency.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the order or cutoff is out of range.
    pub fn butterworth_lowpass(order: usize, cutoff: f64) -> Result<Self, FilterError> {
        if order == 0 || order > MAX_FILTER_ORDER {
            return Err(FilterError::InvalidOrder {
                order,
                max: MAX_FILTER_ORDER,
            });
        }
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(FilterError::InvalidCutoff { cutoff });
        }

        // Analog prototype poles on the left half of the unit circle,
        // pre-warped to the cutoff.
        let n = order as i64;
        let warped = 4.0 * (PI * cutoff / 2.0).tan();
        let analog: Vec<Complex64> = (-n + 1..n)
            .step_by(2)
            .map(|m| -Complex64::from_polar(1.0, PI * m as f64 / (2.0 * n as f64)) * warped)
            .collect();

        // Bilinear transform with 2 * fs = 4 (fs = 2 for Nyquist-normalised cutoff).
        let fs2 = Complex64::new(4.0, 0.0);
        let digital: Vec<Complex64> = analog.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();
        let denom = analog
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, p| acc * (fs2 - p));
        let gain = (Complex64::new(warped.powi(order as i32), 0.0) / denom).re;

        // One section per conjugate pair, one for the real pole of an odd
        // order. Poles farthest from the unit circle come first.
        let mut poles: Vec<Complex64> = digital
            .iter()
            .copied()
            .filter(|p| p.im >= -REAL_POLE_TOLERANCE)
            .collect();
        poles.sort_by(|a, b| a.norm().total_cmp(&b.norm()));

        let mut sections: Vec<SosSection> = poles
            .iter()
            .map(|p| {
                if p.im.abs() <= REAL_POLE_TOLERANCE {
                    SosSection {
                        b: [1.0, 1.0, 0.0],
                        a: [1.0, -p.re, 0.0],
                    }
                } else {
                    SosSection {
                        b: [1.0, 2.0, 1.0],
                        a: [1.0, -2.0 * p.re, p.norm_sqr()],
                    }
                }
            })
            .collect();
        if let Some(first) = sections.first_mut() {
            for coeff in &mut first.b {
                *coeff *= gain;
            }
        }

        Ok(Self::from_sections(sections))
    }

    /// Build a filter from explicit sections.
    pub fn from_sections(sections: Vec<SosSection>) -> Self {
        let mut zi = Vec::with_capacity(sections.len());
        let mut scale = 1.0;
        for section in &sections {
            let [z0, z1] = section.step_zi();
            zi.push([scale * z0, scale * z1]);
            scale *= section.dc_gain();
        }

        let trailing_b = sections.iter().filter(|s| s.b[2] == 0.0).count();
        let trailing_a = sections.iter().filter(|s| s.a[2] == 0.0).count();
        let ntaps = 2 * sections.len() + 1 - trailing_b.min(trailing_a);

        Self {
            sections,
            zi,
            padlen: 3 * ntaps,
        }
    }

    /// The cascade, first section first.
    pub fn sections(&self) -> &[SosSection] {
        &self.sections
    }

    /// Number of samples added at each end before filtering.
    pub fn padlen(&self) -> usize {
        self.padlen
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InputTooShort`] unless `x.len() > padlen()`.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>, FilterError> {
        let n = self.padlen;
        if x.len() <= n {
            return Err(FilterError::InputTooShort {
                len: x.len(),
                padlen: n,
            });
        }

        let first = x[0];
        let last = x[x.len() - 1];
        let mut ext = Vec::with_capacity(x.len() + 2 * n);
        ext.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(x);
        ext.extend((0..n).map(|i| 2.0 * last - x[x.len() - 2 - i]));

        let x0 = ext[0];
        let mut y = self.run(&ext, x0);
        y.reverse();
        let y0 = y[0];
        let mut y = self.run(&y, y0);
        y.reverse();

        Ok(y[n..y.len() - n].to_vec())
    }

    /// One causal pass (transposed direct form II), starting from the
    /// steady state for a constant input of `initial`.
    fn run(&self, input: &[f64], initial: f64) -> Vec<f64> {
        let mut state: Vec<[f64; 2]> = self
            .zi
            .iter()
            .map(|[z0, z1]| [z0 * initial, z1 * initial])
            .collect();

        input
            .iter()
            .map(|&sample| {
                let mut v = sample;
                for (section, z) in self.sections.iter().zip(state.iter_mut()) {
                    let [b0, b1, b2] = section.b;
                    let [_, a1, a2] = section.a;
                    let y = b0 * v + z[0];
                    z[0] = b1 * v - a1 * y + z[1];
                    z[1] = b2 * v - a2 * y;
                    v = y;
                }
                v
            })
            .collect()
    }
}

/// Best-effort low-pass smoothing of magnitude series.
///
/// Series too short for the filter padding pass through unchanged.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    filter: SosFilter,
}

impl SignalConditioner {
    /// Create a conditioner with a Butterworth low-pass of the given order
    /// and Nyquist-normalised cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the filter cannot be designed.
    pub fn new(order: usize, cutoff: f64) -> Result<Self, FilterError> {
        Ok(Self {
            filter: SosFilter::butterworth_lowpass(order, cutoff)?,
        })
    }

    /// The underlying filter.
    pub fn filter(&self) -> &SosFilter {
        &self.filter
    }

    /// Smallest series length that is actually filtered.
    pub fn min_filtered_len(&self) -> usize {
        self.filter.padlen() + 1
    }

    /// Smooth `series`, or pass it through if it is too short.
    pub fn condition(&self, series: MagnitudeSeries) -> ConditionedSeries {
        match self.filter.filtfilt(series.as_slice()) {
            Ok(values) => ConditionedSeries::filtered(values),
            Err(_) => ConditionedSeries::passthrough(series),
        }
    }
}

impl Default for SignalConditioner {
    fn default() -> Self {
        // Default parameters are always in range; identity section otherwise.
        Self::new(DEFAULT_FILTER_ORDER, DEFAULT_CUTOFF).unwrap_or_else(|_| Self {
            filter: SosFilter::from_sections(vec![SosSection {
                b: [1.0, 0.0, 0.0],
                a: [1.0, 0.0, 0.0],
            }]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fourth_order_sections() {
        let filter = SosFilter::butterworth_lowpass(4, 0.1).unwrap();
        let s = filter.sections();
        assert_eq!(s.len(), 2);

        assert_relative_eq!(s[0].b[0], 0.000_416_599_204_406_599_4, max_relative = 1e-9);
        assert_relative_eq!(s[0].b[1], 0.000_833_198_408_813_198_8, max_relative = 1e-9);
        assert_relative_eq!(s[0].b[2], 0.000_416_599_204_406_599_4, max_relative = 1e-9);
        assert_relative_eq!(s[0].a[1], -1.479_674_216_931_193_4, max_relative = 1e-9);
        assert_relative_eq!(s[0].a[2], 0.555_821_543_282_488_8, max_relative = 1e-9);

        assert_eq!(s[1].b, [1.0, 2.0, 1.0]);
        assert_relative_eq!(s[1].a[1], -1.700_964_331_943_526, max_relative = 1e-9);
        assert_relative_eq!(s[1].a[2], 0.788_499_739_815_298, max_relative = 1e-9);
    }

    #[test]
    fn test_unity_dc_gain() {
        for order in 1..=MAX_FILTER_ORDER {
            let filter = SosFilter::butterworth_lowpass(order, 0.2).unwrap();
            let gain: f64 = filter.sections().iter().map(SosSection::dc_gain).product();
            assert_relative_eq!(gain, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_odd_order_padlen() {
        let filter = SosFilter::butterworth_lowpass(3, 0.1).unwrap();
        assert_eq!(filter.sections().len(), 2);
        assert_eq!(filter.padlen(), 12);
    }

    #[test]
    fn test_invalid_design() {
        assert!(matches!(
            SosFilter::butterworth_lowpass(0, 0.1),
            Err(FilterError::InvalidOrder { .. })
        ));
        assert!(matches!(
            SosFilter::butterworth_lowpass(4, 1.0),
            Err(FilterError::InvalidCutoff { .. })
        ));
        assert!(matches!(
            SosFilter::butterworth_lowpass(4, f64::NAN),
            Err(FilterError::InvalidCutoff { .. })
        ));
    }

    #[test]
    fn test_filtfilt_reference_output() {
        let filter = SosFilter::butterworth_lowpass(4, 0.1).unwrap();
        let x: Vec<f64> = (0..20).map(|i| (i % 7) as f64 + 0.5 * i as f64).collect();
        let y = filter.filtfilt(&x).unwrap();
        let expected = [
            0.127_726_294_324_174_37,
            1.262_654_190_315_608_5,
            2.345_598_144_282_146_5,
            3.353_976_275_503_387,
            4.272_112_631_314_585,
            5.092_678_154_085_859,
            5.817_264_055_681_941_5,
            6.455_998_950_296_758,
            7.026_280_874_903_442,
            7.550_846_219_952_689,
            8.055_470_881_872_775,
            8.566_563_816_065_859,
            9.108_814_835_464_136,
            9.702_978_913_348_01,
            10.363_873_034_406_73,
            11.098_728_308_336_774,
            11.906_124_178_731_254,
            12.775_750_834_905_907,
            13.689_155_539_093_003,
            14.621_460_672_738_81,
        ];
        assert_eq!(y.len(), expected.len());
        for (got, want) in y.iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constant_input_is_preserved() {
        let filter = SosFilter::butterworth_lowpass(4, 0.1).unwrap();
        let y = filter.filtfilt(&[3.0; 16]).unwrap();
        for v in y {
            assert_relative_eq!(v, 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_padding_boundary() {
        let filter = SosFilter::butterworth_lowpass(4, 0.1).unwrap();
        assert_eq!(
            filter.filtfilt(&[1.0; 15]),
            Err(FilterError::InputTooShort { len: 15, padlen: 15 })
        );
        assert!(filter.filtfilt(&[1.0; 16]).is_ok());
    }

    #[test]
    fn test_conditioner_passthrough_when_short() {
        let conditioner = SignalConditioner::default();
        assert_eq!(conditioner.min_filtered_len(), 16);

        let short = MagnitudeSeries::new(vec![1.0, 5.0, 2.0]).unwrap();
        let out = conditioner.condition(short);
        assert!(!out.is_filtered());
        assert_eq!(out.as_slice(), &[1.0, 5.0, 2.0]);

        let long = MagnitudeSeries::new((0..52).map(|i| (i % 5) as f64).collect()).unwrap();
        let out = conditioner.condition(long);
        assert!(out.is_filtered());
        assert_eq!(out.len(), 52);
    }
}
