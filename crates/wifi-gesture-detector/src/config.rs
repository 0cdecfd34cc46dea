//! Detector configuration.
//!
//! [`DetectorConfig`] holds every tunable of a detection session: framing,
//! filter design, decision policy and driver timing. It is serializable via
//! [`serde`] so it can be kept in a JSON file next to the model artifact;
//! missing fields take their defaults.
//!
//! # Example
//!
//! ```rust
//! use wifi_gesture_detector::DetectorConfig;
//!
//! let cfg = DetectorConfig::builder()
//!     .confidence_threshold(0.8)
//!     .cooldown_secs(2.0)
//!     .build();
//! cfg.validate().expect("valid config");
//! assert_eq!(cfg.history_capacity, 5);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wifi_gesture_core::{DEFAULT_NO_GESTURE_LABEL, FEATURE_COUNT};
use wifi_gesture_signal::{DEFAULT_CUTOFF, DEFAULT_FILTER_ORDER, DEFAULT_FRAME_TAG, MAX_FILTER_ORDER};

use crate::decision::DecisionConfig;

/// Errors from loading or validating a [`DetectorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file `{}`: {source}", path.display())]
    FileAccess {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{}`: {source}", path.display())]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete configuration for a detection session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Record tag of sensor lines. Default: **"DATA"**.
    pub frame_tag: String,

    /// Butterworth filter order. Default: **4**.
    pub filter_order: usize,

    /// Filter cutoff as a fraction of Nyquist. Default: **0.1**.
    pub filter_cutoff: f64,

    /// Predictions at or below this confidence are ignored. Default: **0.7**.
    pub confidence_threshold: f64,

    /// Refractory window after an event, in seconds. Default: **3.0**.
    pub cooldown_secs: f64,

    /// Capacity of the recent-label history. Default: **5**.
    pub history_capacity: usize,

    /// Number of most recent labels that vote. Default: **3**.
    pub vote_window: usize,

    /// Votes within the window needed to fire. Default: **2**.
    pub votes_required: usize,

    /// Label that never fires an event. Default: **"no_gesture"**.
    pub no_gesture_label: String,

    /// Upper bound on one transport read, in milliseconds. Default: **1000**.
    pub read_timeout_ms: u64,

    /// Period of status reports, in seconds. Default: **3.0**.
    pub status_interval_secs: f64,

    /// Feature count the model must accept. Default: **14**.
    pub expected_features: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_tag: DEFAULT_FRAME_TAG.to_string(),
            filter_order: DEFAULT_FILTER_ORDER,
            filter_cutoff: DEFAULT_CUTOFF,
            confidence_threshold: 0.7,
            cooldown_secs: 3.0,
            history_capacity: 5,
            vote_window: 3,
            votes_required: 2,
            no_gesture_label: DEFAULT_NO_GESTURE_LABEL.to_string(),
            read_timeout_ms: 1000,
            status_interval_secs: 3.0,
            expected_features: FEATURE_COUNT,
        }
    }
}

impl DetectorConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> DetectorConfigBuilder {
        DetectorConfigBuilder::new()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileAccess`] if the file cannot be read,
    /// [`ConfigError::Parse`] if the JSON is malformed and
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: DetectorConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileAccess`] if the file cannot be written.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate all fields, returning the first problem found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_tag.is_empty() || self.frame_tag.contains(',') {
            return Err(ConfigError::invalid_value(
                "frame_tag",
                "must be non-empty and contain no comma",
            ));
        }
        if self.filter_order == 0 || self.filter_order > MAX_FILTER_ORDER {
            return Err(ConfigError::invalid_value(
                "filter_order",
                format!("must be in 1..={MAX_FILTER_ORDER}"),
            ));
        }
        if !(self.filter_cutoff > 0.0 && self.filter_cutoff < 1.0) {
            return Err(ConfigError::invalid_value("filter_cutoff", "must be in (0, 1)"));
        }
        if !(self.confidence_threshold >= 0.0 && self.confidence_threshold < 1.0) {
            return Err(ConfigError::invalid_value(
                "confidence_threshold",
                "must be in [0, 1)",
            ));
        }
        if positive_duration(self.cooldown_secs).is_none() {
            return Err(ConfigError::invalid_value(
                "cooldown_secs",
                "must be a positive, representable number of seconds",
            ));
        }
        if self.vote_window > self.history_capacity {
            return Err(ConfigError::invalid_value(
                "vote_window",
                format!("must not exceed history_capacity ({})", self.history_capacity),
            ));
        }
        if self.votes_required == 0 || self.votes_required > self.vote_window {
            return Err(ConfigError::invalid_value(
                "votes_required",
                format!("must be in 1..={}", self.vote_window),
            ));
        }
        if self.no_gesture_label.is_empty() {
            return Err(ConfigError::invalid_value("no_gesture_label", "must be non-empty"));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::invalid_value("read_timeout_ms", "must be > 0"));
        }
        if positive_duration(self.status_interval_secs).is_none() {
            return Err(ConfigError::invalid_value(
                "status_interval_secs",
                "must be a positive, representable number of seconds",
            ));
        }
        if self.expected_features != FEATURE_COUNT {
            return Err(ConfigError::invalid_value(
                "expected_features",
                format!("the feature extractor produces {FEATURE_COUNT} features"),
            ));
        }
        Ok(())
    }

    /// Decision policy derived from this configuration.
    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig {
            confidence_threshold: self.confidence_threshold,
            cooldown: saturating_duration(self.cooldown_secs),
            history_capacity: self.history_capacity,
            vote_window: self.vote_window,
            votes_required: self.votes_required,
            no_gesture_label: self.no_gesture_label.clone(),
        }
    }

    /// Per-read transport timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Status report period.
    pub fn status_interval(&self) -> Duration {
        saturating_duration(self.status_interval_secs)
    }
}

/// `secs` as a non-zero [`Duration`], or `None` if it is not positive,
/// overflows, or rounds down to zero.
fn positive_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok().filter(|d| !d.is_zero())
}

/// Lossy conversion for values that skipped validation: out-of-range
/// values clamp to `Duration::MAX`, everything else to at least 1 ns.
fn saturating_duration(secs: f64) -> Duration {
    if secs.is_nan() {
        return Duration::from_nanos(1);
    }
    Duration::try_from_secs_f64(secs)
        .unwrap_or(if secs > 0.0 { Duration::MAX } else { Duration::ZERO })
        .max(Duration::from_nanos(1))
}

/// Builder for [`DetectorConfig`].
#[derive(Debug, Default)]
pub struct DetectorConfigBuilder {
    config: DetectorConfig,
}

impl DetectorConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
        }
    }

    /// Set the record tag
    pub fn frame_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.frame_tag = tag.into();
        self
    }

    /// Set the filter design
    pub fn filter(mut self, order: usize, cutoff: f64) -> Self {
        self.config.filter_order = order;
        self.config.filter_cutoff = cutoff;
        self
    }

    /// Set the confidence threshold
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    /// Set the cooldown in seconds
    pub fn cooldown_secs(mut self, secs: f64) -> Self {
        self.config.cooldown_secs = secs;
        self
    }

    /// Set history capacity, vote window and votes required
    pub fn voting(mut self, history_capacity: usize, vote_window: usize, votes_required: usize) -> Self {
        self.config.history_capacity = history_capacity;
        self.config.vote_window = vote_window;
        self.config.votes_required = votes_required;
        self
    }

    /// Set the no-gesture label
    pub fn no_gesture_label(mut self, label: impl Into<String>) -> Self {
        self.config.no_gesture_label = label.into();
        self
    }

    /// Set the read timeout in milliseconds
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the status interval in seconds
    pub fn status_interval_secs(mut self, secs: f64) -> Self {
        self.config.status_interval_secs = secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> DetectorConfig {
        self.config
    }
}
