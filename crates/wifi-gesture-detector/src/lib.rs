//! Real-time gesture detection.
//!
//! Assembles the signal stages into a [`GesturePipeline`], classifies each
//! sample with a tree-ensemble model ([`ForestClassifier`]), de-bounces the
//! predictions with a [`DecisionEngine`] and drives the whole thing from a
//! line source with a [`StreamDriver`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wifi_gesture_detector::{
//!     status_channel, DetectorConfig, ForestClassifier, GesturePipeline, StreamDriver,
//! };
//! use wifi_gesture_hardware::{SerialConfig, SourceSpec};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DetectorConfig::default();
//! let model = Arc::new(ForestClassifier::from_json_file("gesture_model.json")?);
//! let pipeline = GesturePipeline::new(&config, model)?;
//! let (publisher, reader) = status_channel();
//!
//! let source = SourceSpec::Serial(SerialConfig::new("/dev/ttyUSB0")).open()?;
//! let report = StreamDriver::new(pipeline, &config)
//!     .with_status(publisher)
//!     .with_sink(|e: &wifi_gesture_core::GestureEvent| println!("{}", e.label))
//!     .run(source);
//! println!("{:?} after {} samples", report.reason, reader.snapshot().samples_processed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decision;
pub mod driver;
pub mod forest;
pub mod pipeline;
pub mod status;

pub use config::{ConfigError, DetectorConfig, DetectorConfigBuilder};
pub use decision::{Decision, DecisionConfig, DecisionEngine, DecisionState, IgnoreReason};
pub use driver::{
    monotonic_clock, DriverStats, SessionReport, StopHandle, StopReason, StreamDriver,
};
pub use forest::{ForestArtifact, ForestClassifier, ModelError, TreeArtifact, TreeNode};
pub use pipeline::{Classification, GesturePipeline, LineOutcome, PipelineError};
pub use status::{status_channel, DetectionSnapshot, LatestPrediction, StatusPublisher, StatusReader};
