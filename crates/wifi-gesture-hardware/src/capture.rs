//! Dataset capture format parser.
//!
//! Recorded training captures use the ESP-IDF CSI console format, one CSV
//! row per packet:
//!
//! ```text
//! type,seq,timestamp,...,rssi(6),...,"[re0,im0,...,re51,im51]"
//! CSI_DATA,1,1712,...,-45,...,"[12,-3,...]"
//! ```
//!
//! Because the coefficient list is not quoted consistently, a plain comma
//! split spreads it over 104 columns starting at column 27. Quotes and
//! brackets are stripped from each of those columns.

use std::fmt;

use wifi_gesture_core::Sample;

/// Record tag of a capture row.
pub const CAPTURE_TAG: &str = "CSI_DATA";

/// Header row prefix written by the capture tool.
pub const CAPTURE_HEADER_PREFIX: &str = "type,seq,timestamp";

/// Column holding the integer RSSI.
pub const RSSI_COLUMN: usize = 6;

/// Column where the coefficients start.
pub const COEFFICIENT_COLUMN: usize = 27;

/// Number of coefficients in a capture row (52 subcarriers).
pub const CAPTURE_COEFFICIENTS: usize = 104;

/// Why a capture row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureRejection {
    /// Empty line.
    Blank,
    /// Column header row.
    Header,
    /// Not a `CSI_DATA` row.
    NotCsiData,
    /// Too few columns to reach the coefficients.
    TooFewColumns {
        /// Number of columns found
        found: usize,
    },
    /// RSSI column is not an integer.
    InvalidRssi,
    /// Wrong number of parseable coefficients.
    CoefficientCount {
        /// Number of coefficients parsed
        found: usize,
    },
}

impl fmt::Display for CaptureRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "blank line"),
            Self::Header => write!(f, "header row"),
            Self::NotCsiData => write!(f, "not a {CAPTURE_TAG} row"),
            Self::TooFewColumns { found } => {
                write!(f, "expected at least {} columns, found {found}", COEFFICIENT_COLUMN + 1)
            }
            Self::InvalidRssi => write!(f, "RSSI is not an integer"),
            Self::CoefficientCount { found } => {
                write!(f, "expected {CAPTURE_COEFFICIENTS} coefficients, found {found}")
            }
        }
    }
}

/// Parse one capture row into a [`Sample`].
///
/// # Errors
///
/// Returns a [`CaptureRejection`] for rows that carry no usable sample.
pub fn parse_capture_line(line: &str) -> Result<Sample, CaptureRejection> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CaptureRejection::Blank);
    }
    if line.starts_with(CAPTURE_HEADER_PREFIX) {
        return Err(CaptureRejection::Header);
    }
    if !line.starts_with(CAPTURE_TAG) {
        return Err(CaptureRejection::NotCsiData);
    }

    let columns: Vec<&str> = line.split(',').collect();
    if columns.len() <= COEFFICIENT_COLUMN {
        return Err(CaptureRejection::TooFewColumns {
            found: columns.len(),
        });
    }

    let rssi: i32 = columns[RSSI_COLUMN]
        .trim()
        .parse()
        .map_err(|_| CaptureRejection::InvalidRssi)?;

    let end = (COEFFICIENT_COLUMN + CAPTURE_COEFFICIENTS).min(columns.len());
    let coefficients: Vec<f64> = columns[COEFFICIENT_COLUMN..end]
        .iter()
        .filter_map(|col| {
            let cleaned = col.trim().trim_matches(|c: char| c == '"' || c == '[' || c == ']');
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        })
        .collect();

    if coefficients.len() != CAPTURE_COEFFICIENTS {
        return Err(CaptureRejection::CoefficientCount {
            found: coefficients.len(),
        });
    }

    Sample::new(f64::from(rssi), coefficients).ok_or(CaptureRejection::CoefficientCount {
        found: CAPTURE_COEFFICIENTS,
    })
}
