//! WiFi-Gesture CLI
//!
//! Command-line front ends over the shared detection core.
//!
//! # Commands
//!
//! - **detect**: run detection in the terminal, printing gestures and a
//!   periodic status line
//! - **serve**: run detection behind a small HTTP status API
//! - **extract**: turn a recorded capture into a CSV of features
//! - **version**: display version information
//!
//! # Usage
//!
//! ```bash
//! # Live detection from an ESP32 receiver
//! wifi-gesture detect --model gesture_model.json --port /dev/ttyUSB0
//!
//! # Replay a recorded session at 50 lines per second
//! wifi-gesture detect --replay capture.txt --rate-hz 50
//!
//! # HTTP front end on port 5000
//! wifi-gesture serve --port /dev/ttyUSB0 --bind 0.0.0.0:5000
//!
//! # Features for training
//! wifi-gesture extract captures/wave_01.csv -o wave_01_features.csv --label wave
//! ```

use clap::{Parser, Subcommand};

pub mod detect;
pub mod extract;
pub mod serve;
pub mod session;

/// WiFi-Gesture Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "wifi-gesture")]
#[command(author, version, about = "Real-time WiFi CSI gesture detection")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect gestures and print them to the console
    Detect(detect::DetectArgs),

    /// Detect gestures behind an HTTP status API
    Serve(serve::ServeArgs),

    /// Extract features from a recorded capture into CSV
    Extract(extract::ExtractArgs),

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_detect_with_overrides() {
        let cli = Cli::parse_from([
            "wifi-gesture",
            "detect",
            "--model",
            "m.json",
            "--replay",
            "capture.txt",
            "--threshold",
            "0.8",
        ]);
        match cli.command {
            Commands::Detect(args) => {
                assert_eq!(args.session.model.to_str(), Some("m.json"));
                assert_eq!(args.session.threshold, Some(0.8));
                assert!(args.session.replay.is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
