//! Frame Parser
//!
//! Turns one raw text line from the sensor into a [`Sample`].
//!
//! The wire format is a comma-delimited record:
//!
//! ```text
//! DATA,<seq>,<rssi>,[re0, im0, re1, im1, ...]
//! ```
//!
//! The first field is a fixed tag, the third holds the signal strength and
//! everything after the third comma is a bracketed coefficient list. Each
//! line is parsed on its own; the parser keeps no state between calls.
//! Rejections are returned as a [`FrameRejection`] value and are never logged
//! here.

use std::fmt;

use wifi_gesture_core::Sample;

/// Default record tag emitted by the sensor firmware.
pub const DEFAULT_FRAME_TAG: &str = "DATA";

/// Minimum number of comma-delimited fields before the coefficient list.
const MIN_FIELDS: usize = 4;

/// Position of the signal-strength field.
const SIGNAL_STRENGTH_FIELD: usize = 2;

/// Why a line was dropped by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRejection {
    /// The line does not start with the record tag.
    MissingTag,
    /// Fewer fields than the record format requires.
    TooFewFields {
        /// Number of fields found
        found: usize,
    },
    /// The signal-strength field is not a finite number.
    InvalidSignalStrength,
    /// The coefficient list is not a bracketed list of finite numbers.
    MalformedCoefficients,
    /// The coefficient list has an odd number of entries.
    OddCoefficientCount {
        /// Number of coefficients found
        count: usize,
    },
}

impl FrameRejection {
    /// Stable short name, used as a counter key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingTag => "missing_tag",
            Self::TooFewFields { .. } => "too_few_fields",
            Self::InvalidSignalStrength => "invalid_signal_strength",
            Self::MalformedCoefficients => "malformed_coefficients",
            Self::OddCoefficientCount { .. } => "odd_coefficient_count",
        }
    }
}

impl fmt::Display for FrameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTag => write!(f, "line does not start with the record tag"),
            Self::TooFewFields { found } => {
                write!(f, "expected at least {MIN_FIELDS} fields, found {found}")
            }
            Self::InvalidSignalStrength => write!(f, "signal strength is not a finite number"),
            Self::MalformedCoefficients => write!(f, "coefficient list is malformed"),
            Self::OddCoefficientCount { count } => {
                write!(f, "coefficient list has odd length {count}")
            }
        }
    }
}

/// Stateless parser for tagged sensor records.
#[derive(Debug, Clone)]
pub struct FrameParser {
    tag: String,
    prefix: String,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_TAG)
    }
}

impl FrameParser {
    /// Create a parser that accepts records starting with `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let prefix = format!("{tag},");
        Self { tag, prefix }
    }

    /// The record tag this parser accepts.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Parse one line into a [`Sample`].
    ///
    /// Leading and trailing whitespace (including the line terminator) is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns the [`FrameRejection`] describing the first check that failed.
    /// No partial sample is ever produced.
    pub fn parse(&self, line: &str) -> Result<Sample, FrameRejection> {
        let line = line.trim();
        if !line.starts_with(&self.prefix) {
            return Err(FrameRejection::MissingTag);
        }

        let fields: Vec<&str> = line.splitn(MIN_FIELDS, ',').collect();
        if fields.len() < MIN_FIELDS {
            return Err(FrameRejection::TooFewFields {
                found: fields.len(),
            });
        }

        let signal_strength: f64 = fields[SIGNAL_STRENGTH_FIELD]
            .trim()
            .parse()
            .map_err(|_| FrameRejection::InvalidSignalStrength)?;
        if !signal_strength.is_finite() {
            return Err(FrameRejection::InvalidSignalStrength);
        }

        let coefficients = parse_coefficient_list(fields[MIN_FIELDS - 1])?;
        let count = coefficients.len();
        Sample::new(signal_strength, coefficients)
            .ok_or(FrameRejection::OddCoefficientCount { count })
    }
}

/// Parse `[a, b, c]` into numbers. A single trailing comma is tolerated.
fn parse_coefficient_list(field: &str) -> Result<Vec<f64>, FrameRejection> {
    let inner = field
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or(FrameRejection::MalformedCoefficients)?
        .trim();

    if inner.is_empty() {
        return Ok(Vec::new());
    }
    let inner = inner.strip_suffix(',').unwrap_or(inner);

    inner
        .split(',')
        .map(|token| {
            token
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or(FrameRejection::MalformedCoefficients)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parses_well_formed_line() {
        let parser = FrameParser::default();
        let sample = parser.parse("DATA,17,-42,[3, 4, -6, 8]\r\n").unwrap();
        assert_relative_eq!(sample.signal_strength(), -42.0);
        assert_eq!(sample.coefficients(), &[3.0, 4.0, -6.0, 8.0]);
    }

    #[test]
    fn test_float_signal_strength_and_trailing_comma() {
        let parser = FrameParser::default();
        let sample = parser.parse("DATA,1,-40.5,[1.5,2.5,]").unwrap();
        assert_relative_eq!(sample.signal_strength(), -40.5);
        assert_eq!(sample.subcarrier_count(), 1);
    }

    #[test]
    fn test_rejects_missing_tag() {
        let parser = FrameParser::default();
        assert_eq!(
            parser.parse("CSI_DATA,1,-40,[1,2]"),
            Err(FrameRejection::MissingTag)
        );
        assert_eq!(parser.parse("DATAX,1,-40,[1,2]"), Err(FrameRejection::MissingTag));
        assert_eq!(parser.parse(""), Err(FrameRejection::MissingTag));
    }

    #[test]
    fn test_rejects_too_few_fields() {
        let parser = FrameParser::default();
        assert_eq!(
            parser.parse("DATA,1,-40"),
            Err(FrameRejection::TooFewFields { found: 3 })
        );
    }

    #[test]
    fn test_rejects_bad_signal_strength() {
        let parser = FrameParser::default();
        assert_eq!(
            parser.parse("DATA,1,strong,[1,2]"),
            Err(FrameRejection::InvalidSignalStrength)
        );
        assert_eq!(
            parser.parse("DATA,1,NaN,[1,2]"),
            Err(FrameRejection::InvalidSignalStrength)
        );
    }

    #[test]
    fn test_rejects_malformed_list() {
        let parser = FrameParser::default();
        for line in [
            "DATA,1,-40,1,2",
            "DATA,1,-40,[1,2",
            "DATA,1,-40,[1,,2]",
            "DATA,1,-40,[1,x]",
            "DATA,1,-40,[1,inf]",
        ] {
            assert_eq!(
                parser.parse(line),
                Err(FrameRejection::MalformedCoefficients),
                "{line}"
            );
        }
    }

    #[test]
    fn test_rejects_odd_length() {
        let parser = FrameParser::default();
        assert_eq!(
            parser.parse("DATA,1,-40,[1,2,3]"),
            Err(FrameRejection::OddCoefficientCount { count: 3 })
        );
    }

    #[test]
    fn test_empty_list_is_a_sample() {
        let parser = FrameParser::default();
        let sample = parser.parse("DATA,1,-40,[]").unwrap();
        assert!(sample.coefficients().is_empty());
    }

    #[test]
    fn test_custom_tag() {
        let parser = FrameParser::new("CSI");
        assert_eq!(parser.tag(), "CSI");
        assert!(parser.parse("CSI,0,-30,[0,1]").is_ok());
        assert_eq!(parser.parse("DATA,0,-30,[0,1]"), Err(FrameRejection::MissingTag));
    }

    #[test]
    fn test_split_line_is_rejected_not_buffered() {
        let parser = FrameParser::default();
        assert!(parser.parse("DATA,1,-40,[1,2").is_err());
        assert_eq!(parser.parse(",3]"), Err(FrameRejection::MissingTag));
        assert!(parser.parse("DATA,2,-40,[1,2]").is_ok());
    }
}
