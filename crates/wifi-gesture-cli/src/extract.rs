//! Offline feature extraction.
//!
//! Reads a recorded capture, either the live `DATA,...` wire format or the
//! dataset `CSI_DATA` CSV format, and writes one CSV row of the 14 named
//! features per usable sample, optionally tagged with a label column.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use tracing::debug;
use wifi_gesture_core::{Feature, Sample};
use wifi_gesture_hardware::{parse_capture_line, CAPTURE_HEADER_PREFIX, CAPTURE_TAG};
use wifi_gesture_signal::{
    sample_amplitude, FeatureExtractor, FrameParser, SignalConditioner, DEFAULT_CUTOFF,
    DEFAULT_FILTER_ORDER, DEFAULT_FRAME_TAG,
};

/// Input record format.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Decide per line
    Auto,
    /// `DATA,seq,rssi,[coefficients]` lines
    Data,
    /// `CSI_DATA` dataset rows
    Capture,
}

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Recorded capture to read
    pub input: PathBuf,

    /// CSV file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Input format
    #[arg(short, long, value_enum, default_value = "auto")]
    pub format: InputFormat,

    /// Value for a trailing `label` column
    #[arg(short, long)]
    pub label: Option<String>,

    /// Record tag of `DATA` lines
    #[arg(long, default_value = DEFAULT_FRAME_TAG)]
    pub frame_tag: String,
}

/// Counts from one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Lines read from the input
    pub lines_read: u64,
    /// Rows written to the output
    pub samples_extracted: u64,
}

/// Line-to-features converter for recorded captures.
#[derive(Debug)]
pub struct FeatureExport {
    format: InputFormat,
    parser: FrameParser,
    conditioner: SignalConditioner,
    extractor: FeatureExtractor,
    label: Option<String>,
}

impl FeatureExport {
    /// Create an exporter with the default filter design.
    pub fn new(format: InputFormat, frame_tag: &str, label: Option<String>) -> Result<Self> {
        Ok(Self {
            format,
            parser: FrameParser::new(frame_tag),
            conditioner: SignalConditioner::new(DEFAULT_FILTER_ORDER, DEFAULT_CUTOFF)
                .context("Failed to design the smoothing filter")?,
            extractor: FeatureExtractor::new(),
            label,
        })
    }

    fn parse(&self, line: &str) -> Option<Sample> {
        let capture = match self.format {
            InputFormat::Data => false,
            InputFormat::Capture => true,
            InputFormat::Auto => {
                let trimmed = line.trim_start();
                trimmed.starts_with(CAPTURE_TAG) || trimmed.starts_with(CAPTURE_HEADER_PREFIX)
            }
        };
        let parsed = if capture {
            parse_capture_line(line).map_err(|r| r.to_string())
        } else {
            self.parser.parse(line).map_err(|r| r.to_string())
        };
        match parsed {
            Ok(sample) => Some(sample),
            Err(reason) => {
                debug!(%reason, "Skipping line");
                None
            }
        }
    }

    /// Read every line of `input` and write feature rows to `output`.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than aborting the
    /// run; such lines normally just fail to parse.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, output: W) -> Result<ExtractSummary> {
        let mut writer = csv::Writer::from_writer(output);
        let mut header: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        if self.label.is_some() {
            header.push("label");
        }
        writer.write_record(&header)?;

        let mut summary = ExtractSummary::default();
        let mut raw = Vec::new();
        loop {
            raw.clear();
            if input.read_until(b'\n', &mut raw).context("Failed to read input")? == 0 {
                break;
            }
            summary.lines_read += 1;
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(['\r', '\n']);

            let Some(sample) = self.parse(line) else { continue };
            let Some(magnitudes) = sample_amplitude(&sample) else { continue };
            let conditioned = self.conditioner.condition(magnitudes);
            let Some(features) = self.extractor.extract(&conditioned, sample.signal_strength()) else {
                continue;
            };

            let mut row: Vec<String> = features.as_slice().iter().map(|v| v.to_string()).collect();
            if let Some(label) = &self.label {
                row.push(label.clone());
            }
            writer.write_record(&row)?;
            summary.samples_extracted += 1;
        }
        writer.flush()?;
        Ok(summary)
    }
}

/// Execute the extract command
pub fn execute(args: ExtractArgs) -> Result<()> {
    let input = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let output = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    println!("   Processing: {}", args.input.display());
    let export = FeatureExport::new(args.format, &args.frame_tag, args.label)?;
    let summary = export.run(BufReader::new(input), output)?;

    println!("      Total lines: {}", summary.lines_read);
    println!(
        "      Samples extracted: {}",
        summary.samples_extracted.to_string().green().bold()
    );
    println!("{} Features written to {}", "[OK]".green().bold(), args.output.display());
    Ok(())
}
