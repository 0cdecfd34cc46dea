//! # WiFi-Gesture Core
//!
//! Core types, traits, and errors for the WiFi CSI gesture detection system.
//!
//! This crate provides the foundational building blocks shared by every stage
//! of the real-time pipeline:
//!
//! - **Core Data Types**: [`Sample`], [`MagnitudeSeries`], [`ConditionedSeries`],
//!   [`FeatureVector`], [`Prediction`], [`ClassProbabilities`], and
//!   [`GestureEvent`] describing the data as it flows from a raw text line to
//!   a de-bounced gesture.
//!
//! - **Error Types**: Subsystem errors via the [`error`] module.
//!
//! - **Traits**: The seams the pipeline is assembled from: [`LineSource`]
//!   (transport), [`GestureClassifier`] (trained model) and [`EventSink`]
//!   (event consumers).
//!
//! ## Feature Flags
//!
//! - `std` (default): Enable standard library support
//! - `serde`: Enable serialization/deserialization via serde
//!
//! ## Example
//!
//! ```rust
//! use wifi_gesture_core::{Feature, FeatureVector, FEATURE_COUNT};
//!
//! let values = [0.0; FEATURE_COUNT];
//! let features = FeatureVector::new(values);
//! assert_eq!(features[Feature::SignalStrength], 0.0);
//! assert_eq!(features.as_slice().len(), 14);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ClassifierError, CoreError, CoreResult, TransportError};
pub use traits::{ensure_arity, EventSink, GestureClassifier, LineRead, LineSource};
pub use types::{
    ClassProbabilities, ClassProbability, ConditionedSeries, Feature, FeatureVector, GestureEvent,
    MagnitudeSeries, Prediction, Sample, FEATURE_COUNT,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label conventionally used by trained models for "no gesture".
pub const DEFAULT_NO_GESTURE_LABEL: &str = "no_gesture";

/// Prelude module for convenient imports.
///
/// ```rust
/// use wifi_gesture_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ClassifierError, CoreError, CoreResult, TransportError};
    pub use crate::traits::{EventSink, GestureClassifier, LineRead, LineSource};
    pub use crate::types::{
        ClassProbabilities, ConditionedSeries, Feature, FeatureVector, GestureEvent,
        MagnitudeSeries, Prediction, Sample, FEATURE_COUNT,
    };
}
