//! WiFi-Gesture hardware interface.
//!
//! Transports that feed text lines from the sensor into the detection
//! pipeline, plus the parser for recorded dataset captures:
//!
//! - **Serial** ([`SerialLineSource`]): live ESP32 output over UART, assembled
//!   into lines with a bounded per-read timeout
//! - **Replay** ([`ReplayLineSource`]): a recorded capture file, optionally
//!   paced at a fixed line rate
//! - **Capture rows** ([`parse_capture_line`]): the `CSI_DATA` CSV format used
//!   by the training dataset
//!
//! Every transport implements [`LineSource`](wifi_gesture_core::LineSource)
//! and is released by `close()`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use wifi_gesture_core::{LineRead, LineSource};
//! use wifi_gesture_hardware::{SerialConfig, SourceSpec};
//!
//! let spec = SourceSpec::Serial(SerialConfig::new("/dev/ttyUSB0"));
//! let mut source = spec.open().unwrap();
//! if let Ok(LineRead::Line(line)) = source.read_line(Duration::from_secs(1)) {
//!     println!("{line}");
//! }
//! source.close().unwrap();
//! ```

mod capture;
mod error;
mod replay;
mod serial;
mod source;

pub use capture::{
    parse_capture_line, CaptureRejection, CAPTURE_COEFFICIENTS, CAPTURE_HEADER_PREFIX,
    CAPTURE_TAG, COEFFICIENT_COLUMN, RSSI_COLUMN,
};
pub use error::HardwareError;
pub use replay::ReplayLineSource;
pub use serial::{
    LineAssembler, SerialConfig, SerialLineSource, DEFAULT_BAUD_RATE, DEFAULT_SETTLE,
    MAX_LINE_BYTES,
};
pub use source::SourceSpec;
