//! Core data types for the WiFi-Gesture system.
//!
//! The types follow one sensor line through the pipeline:
//!
//! ```text
//! "DATA,..." -> Sample -> MagnitudeSeries -> ConditionedSeries -> FeatureVector
//!            -> Prediction (+ ClassProbabilities) -> GestureEvent
//! ```
//!
//! Each type enforces its own shape invariant at construction, so a value
//! that exists is always well-formed.

use std::ops::Index;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of features in the reference feature layout.
pub const FEATURE_COUNT: usize = 14;

// ============================================================================
// Sample
// ============================================================================

/// One parsed sensor record: a signal-strength reading plus interleaved
/// real/imaginary channel coefficients.
///
/// The coefficient sequence always has even length.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    signal_strength: f64,
    coefficients: Vec<f64>,
}

impl Sample {
    /// Creates a sample, returning `None` when the coefficient count is odd.
    #[must_use]
    pub fn new(signal_strength: f64, coefficients: Vec<f64>) -> Option<Self> {
        if coefficients.len() % 2 != 0 {
            return None;
        }
        Some(Self {
            signal_strength,
            coefficients,
        })
    }

    /// Received signal strength reported alongside the coefficients.
    #[must_use]
    pub fn signal_strength(&self) -> f64 {
        self.signal_strength
    }

    /// Interleaved `[re0, im0, re1, im1, ...]` coefficients.
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Number of complex coefficients (subcarriers) in the sample.
    #[must_use]
    pub fn subcarrier_count(&self) -> usize {
        self.coefficients.len() / 2
    }
}

// ============================================================================
// Magnitude / conditioned series
// ============================================================================

/// Per-subcarrier magnitudes, one per complex coefficient. Never negative.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MagnitudeSeries(Vec<f64>);

impl MagnitudeSeries {
    /// Wraps magnitudes, returning `None` if any value is negative or NaN.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Option<Self> {
        if values.iter().all(|v| *v >= 0.0) {
            Some(Self(values))
        } else {
            None
        }
    }

    /// Borrow the magnitudes.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of magnitudes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the series is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the raw vector.
    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// A magnitude series after low-pass conditioning.
///
/// When the series was too short to filter, the values are the unfiltered
/// magnitudes and [`is_filtered`](Self::is_filtered) is `false`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConditionedSeries {
    values: Vec<f64>,
    filtered: bool,
}

impl ConditionedSeries {
    /// Series produced by the low-pass filter.
    #[must_use]
    pub fn filtered(values: Vec<f64>) -> Self {
        Self {
            values,
            filtered: true,
        }
    }

    /// Series passed through unchanged.
    #[must_use]
    pub fn passthrough(series: MagnitudeSeries) -> Self {
        Self {
            values: series.into_inner(),
            filtered: false,
        }
    }

    /// Borrow the conditioned values.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Whether the filter was actually applied.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Feature vector
// ============================================================================

/// Position of each component in a [`FeatureVector`].
///
/// The order is a compatibility contract with trained models and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Feature {
    /// Mean magnitude
    Mean = 0,
    /// Population standard deviation of magnitudes
    StdDev = 1,
    /// Minimum magnitude
    Min = 2,
    /// Maximum magnitude
    Max = 3,
    /// Median magnitude
    Median = 4,
    /// 25th percentile
    P25 = 5,
    /// 75th percentile
    P75 = 6,
    /// Signal strength as reported
    SignalStrength = 7,
    /// Absolute signal strength
    SignalStrengthAbs = 8,
    /// Sum of magnitudes
    Sum = 9,
    /// Mean of first differences
    DiffMean = 10,
    /// Standard deviation of first differences
    DiffStdDev = 11,
    /// Pearson correlation between subcarrier groups 1 and 2
    CorrGroup12 = 12,
    /// Pearson correlation between subcarrier groups 1 and 3
    CorrGroup13 = 13,
}

impl Feature {
    /// All features in layout order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Mean,
        Feature::StdDev,
        Feature::Min,
        Feature::Max,
        Feature::Median,
        Feature::P25,
        Feature::P75,
        Feature::SignalStrength,
        Feature::SignalStrengthAbs,
        Feature::Sum,
        Feature::DiffMean,
        Feature::DiffStdDev,
        Feature::CorrGroup12,
        Feature::CorrGroup13,
    ];

    /// Index of this feature in the vector.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable column name, used for CSV headers and logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Feature::Mean => "mean",
            Feature::StdDev => "std",
            Feature::Min => "min",
            Feature::Max => "max",
            Feature::Median => "median",
            Feature::P25 => "p25",
            Feature::P75 => "p75",
            Feature::SignalStrength => "rssi",
            Feature::SignalStrengthAbs => "rssi_abs",
            Feature::Sum => "sum",
            Feature::DiffMean => "diff_mean",
            Feature::DiffStdDev => "diff_std",
            Feature::CorrGroup12 => "corr_g1_g2",
            Feature::CorrGroup13 => "corr_g1_g3",
        }
    }
}

/// Fixed-length feature vector fed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Wraps a full feature array.
    #[must_use]
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Builds a vector from a slice, returning `None` unless it has exactly
    /// [`FEATURE_COUNT`] elements.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let array: [f64; FEATURE_COUNT] = values.try_into().ok()?;
        Some(Self(array))
    }

    /// Borrow as a slice in layout order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Iterate `(feature, value)` pairs in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.0[f.index()]))
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.0[feature.index()]
    }
}

// ============================================================================
// Prediction
// ============================================================================

/// Probability assigned to one class label.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassProbability {
    /// Class label
    pub label: String,
    /// Probability in [0, 1]
    pub probability: f64,
}

/// Class-probability distribution returned by a classifier, in the model's
/// class order. Never empty.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<ClassProbability>", into = "Vec<ClassProbability>"))]
pub struct ClassProbabilities(Vec<ClassProbability>);

impl ClassProbabilities {
    /// Builds a distribution from `(label, probability)` pairs.
    ///
    /// Returns `None` if there are no pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let entries: Vec<ClassProbability> = pairs
            .into_iter()
            .map(|(label, probability)| ClassProbability {
                label: label.into(),
                probability,
            })
            .collect();
        if entries.is_empty() {
            None
        } else {
            Some(Self(entries))
        }
    }

    /// The most probable class. Ties resolve to the earliest class.
    #[must_use]
    pub fn best(&self) -> &ClassProbability {
        let mut best = &self.0[0];
        for entry in &self.0[1..] {
            if entry.probability > best.probability {
                best = entry;
            }
        }
        best
    }

    /// Maximum probability in the distribution.
    #[must_use]
    pub fn max_probability(&self) -> f64 {
        self.best().probability
    }

    /// Probability for `label`, if the class exists.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.probability)
    }

    /// Iterate entries in class order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassProbability> {
        self.0.iter()
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The prediction implied by this distribution: the best label, with the
    /// maximum probability as confidence.
    #[must_use]
    pub fn to_prediction(&self) -> Prediction {
        let best = self.best();
        Prediction::new(best.label.clone(), best.probability)
    }
}

impl TryFrom<Vec<ClassProbability>> for ClassProbabilities {
    type Error = String;

    fn try_from(entries: Vec<ClassProbability>) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            Err("class probability list must not be empty".to_string())
        } else {
            Ok(Self(entries))
        }
    }
}

impl From<ClassProbabilities> for Vec<ClassProbability> {
    fn from(p: ClassProbabilities) -> Self {
        p.0
    }
}

/// A single classifier output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prediction {
    /// Predicted label
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Prediction {
    /// Creates a prediction, clamping confidence into [0, 1].
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            confidence,
        }
    }
}

// ============================================================================
// Gesture event
// ============================================================================

/// A de-bounced gesture emitted by the decision engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GestureEvent {
    /// Gesture label
    pub label: String,
    /// Confidence of the prediction that fired the event
    pub confidence: f64,
    /// When the event fired
    pub timestamp: DateTime<Utc>,
}
