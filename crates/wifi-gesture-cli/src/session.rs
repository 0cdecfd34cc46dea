//! Options shared by the `detect` and `serve` front ends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use wifi_gesture_core::GestureClassifier;
use wifi_gesture_detector::{DetectorConfig, ForestClassifier};
use wifi_gesture_hardware::{SerialConfig, SourceSpec, DEFAULT_BAUD_RATE};

/// Model, source and policy options for a detection session.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Trained model artifact (JSON)
    #[arg(short, long, default_value = "gesture_model.json", env = "WIFI_GESTURE_MODEL")]
    pub model: PathBuf,

    /// Detector configuration file (JSON); flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial port of the ESP32 receiver
    #[arg(short, long, default_value = "/dev/ttyUSB0", env = "WIFI_GESTURE_PORT")]
    pub port: String,

    /// Serial baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Delay after opening the port before reading, in milliseconds
    #[arg(long, default_value = "2000")]
    pub settle_ms: u64,

    /// Replay a recorded capture instead of reading the serial port
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Replay pace in lines per second (as fast as possible if omitted)
    #[arg(long, requires = "replay")]
    pub rate_hz: Option<f64>,

    /// Confidence threshold override (0.0-1.0)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Cooldown override in seconds
    #[arg(long)]
    pub cooldown: Option<f64>,
}

impl SessionArgs {
    /// Configuration from the file (or defaults) with flag overrides,
    /// validated.
    pub fn load_config(&self) -> Result<DetectorConfig> {
        let mut config = match &self.config {
            Some(path) => DetectorConfig::from_json(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => DetectorConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.confidence_threshold = threshold;
        }
        if let Some(cooldown) = self.cooldown {
            config.cooldown_secs = cooldown;
        }
        config.validate().context("Invalid detector configuration")?;
        Ok(config)
    }

    /// The line source these options describe.
    pub fn source_spec(&self) -> SourceSpec {
        match &self.replay {
            Some(path) => SourceSpec::Replay {
                path: path.clone(),
                rate_hz: self.rate_hz,
            },
            None => SourceSpec::Serial(SerialConfig {
                port: self.port.clone(),
                baud_rate: self.baud,
                settle: Duration::from_millis(self.settle_ms),
            }),
        }
    }

    /// Load the model artifact.
    pub fn load_model(&self) -> Result<Arc<dyn GestureClassifier>> {
        let model = ForestClassifier::from_json_file(&self.model).with_context(|| {
            format!(
                "Failed to load model {} (expected a JSON tree-ensemble artifact, see wifi_gesture_detector::forest)",
                self.model.display()
            )
        })?;
        Ok(Arc::new(model))
    }
}
