//! Selection of the line source for a detection session.

use std::fmt;
use std::path::PathBuf;

use wifi_gesture_core::LineSource;

use crate::error::HardwareError;
use crate::replay::ReplayLineSource;
use crate::serial::{SerialConfig, SerialLineSource};

/// Where sensor lines come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// Live serial device.
    Serial(SerialConfig),
    /// Recorded capture file, optionally paced.
    Replay {
        /// Capture file
        path: PathBuf,
        /// Lines per second, or as fast as possible when `None`
        rate_hz: Option<f64>,
    },
}

impl SourceSpec {
    /// Open the described source.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] if the device or file cannot be opened.
    pub fn open(&self) -> Result<Box<dyn LineSource>, HardwareError> {
        match self {
            Self::Serial(config) => Ok(Box::new(SerialLineSource::open(config)?)),
            Self::Replay { path, rate_hz } => {
                let source = ReplayLineSource::open(path)?;
                match rate_hz {
                    Some(rate) => Ok(Box::new(source.with_rate(*rate)?)),
                    None => Ok(Box::new(source)),
                }
            }
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(config) => write!(f, "serial {} @ {} baud", config.port, config.baud_rate),
            Self::Replay { path, rate_hz: Some(rate) } => {
                write!(f, "replay {} @ {rate} Hz", path.display())
            }
            Self::Replay { path, rate_hz: None } => write!(f, "replay {}", path.display()),
        }
    }
}
