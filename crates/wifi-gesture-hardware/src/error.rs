//! Error types for opening sensor transports.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when opening a line source.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// The serial device could not be opened.
    #[error("Failed to open serial port {port} at {baud_rate} baud: {source}")]
    SerialOpen {
        port: String,
        baud_rate: u32,
        #[source]
        source: serialport::Error,
    },

    /// The replay file could not be opened.
    #[error("Failed to open replay file {}: {source}", path.display())]
    ReplayOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source description is unusable.
    #[error("Invalid source: {0}")]
    InvalidSource(String),
}
