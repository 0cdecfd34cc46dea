//! WiFi-Gesture Signal Processing Library
//!
//! This crate turns raw sensor lines into the feature vectors consumed by a
//! gesture classifier. Every stage is a pure function of its input, and each
//! stage that can drop a line says so in its return type.
//!
//! # Stages
//!
//! - **Frame Parser** ([`FrameParser`]): tagged text line to [`Sample`]
//! - **Amplitude Transform** ([`amplitude`]): interleaved coefficients to
//!   per-subcarrier magnitudes
//! - **Signal Conditioner** ([`SignalConditioner`]): zero-phase Butterworth
//!   low-pass smoothing, falling back to pass-through for short series
//! - **Feature Extraction** ([`FeatureExtractor`]): 14 statistics in fixed order
//!
//! # Example
//!
//! ```rust
//! use wifi_gesture_signal::{
//!     sample_amplitude, FeatureExtractor, FrameParser, SignalConditioner,
//! };
//!
//! let parser = FrameParser::default();
//! let conditioner = SignalConditioner::default();
//! let extractor = FeatureExtractor::new();
//!
//! let sample = parser.parse("DATA,1,-45,[3,4,6,8]").unwrap();
//! let magnitudes = sample_amplitude(&sample).unwrap();
//! let conditioned = conditioner.condition(magnitudes);
//! let features = extractor.extract(&conditioned, sample.signal_strength()).unwrap();
//! assert_eq!(features.as_slice().len(), 14);
//! ```
//!
//! [`Sample`]: wifi_gesture_core::Sample

pub mod amplitude;
pub mod conditioner;
pub mod features;
pub mod frame;

pub use amplitude::{amplitude, sample_amplitude};
pub use conditioner::{
    FilterError, SignalConditioner, SosFilter, SosSection, DEFAULT_CUTOFF, DEFAULT_FILTER_ORDER,
    MAX_FILTER_ORDER,
};
pub use features::{FeatureExtractor, CORRELATION_GROUP_LEN, MIN_CORRELATION_LEN};
pub use frame::{FrameParser, FrameRejection, DEFAULT_FRAME_TAG};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
