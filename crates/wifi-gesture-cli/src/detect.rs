//! Console front end.
//!
//! Runs the stream driver on a blocking thread, prints each gesture as it
//! fires and a status line every status interval. Ctrl+C requests a
//! cooperative stop; the process exits non-zero if the transport failed.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;
use wifi_gesture_core::GestureEvent;
use wifi_gesture_detector::{
    status_channel, DetectionSnapshot, GesturePipeline, SessionReport, StopReason, StreamDriver,
};

use crate::session::SessionArgs;

/// Arguments for the detect command
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Session options
    #[command(flatten)]
    pub session: SessionArgs,

    /// Suppress the periodic status line
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the detect command
pub async fn execute(args: DetectArgs) -> Result<()> {
    let config = args.session.load_config()?;
    let model = args.session.load_model()?;
    let labels = model.labels().join(", ");
    let pipeline = GesturePipeline::new(&config, model).context("Model does not fit the pipeline")?;
    let spec = args.session.source_spec();

    print_banner(&labels, &spec.to_string());

    let (publisher, reader) = status_channel();
    let driver = StreamDriver::new(pipeline, &config)
        .with_status(publisher)
        .with_sink(print_event);
    let stop = driver.stop_handle();

    let mut task = tokio::task::spawn_blocking(move || -> Result<SessionReport> {
        let source = spec
            .open()
            .with_context(|| format!("Failed to open {spec}"))?;
        Ok(driver.run(source))
    });

    let mut ticker = tokio::time::interval(config.status_interval());
    ticker.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    let report = loop {
        tokio::select! {
            joined = &mut task => break joined.context("Detection task panicked")??,
            _ = ticker.tick(), if !args.quiet => {
                print_status(&reader.snapshot());
            }
            _ = &mut ctrl_c, if !stopping => {
                stopping = true;
                info!("Stop requested");
                stop.stop();
            }
        }
    };

    print_summary(&report);
    if let StopReason::TransportFailed { message } = &report.reason {
        bail!("Line source failed: {message}");
    }
    Ok(())
}

fn print_banner(labels: &str, source: &str) {
    println!();
    println!("{}", "=".repeat(60));
    println!("{}", "REAL-TIME GESTURE DETECTION".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {} {}", "Gestures:".bold(), labels);
    println!("  {} {}", "Source:".bold(), source);
    println!("  Perform gestures between the ESP32 devices");
    println!("  Press Ctrl+C to stop");
    println!("{}", "-".repeat(60));
}

fn print_event(event: &GestureEvent) {
    println!(
        "{} {} (confidence: {:.3})",
        "[GESTURE]".green().bold(),
        event.label.to_uppercase().bold(),
        event.confidence
    );
}

fn print_status(snapshot: &DetectionSnapshot) {
    println!("{} [{}]", "[MONITOR]".bright_cyan().bold(), snapshot.status_line());
}

fn print_summary(report: &SessionReport) {
    let reason = match &report.reason {
        StopReason::Stopped => "stopped by user".yellow(),
        StopReason::EndOfStream => "end of stream".green(),
        StopReason::TransportFailed { .. } => "transport failed".red(),
    };
    println!();
    println!("{} Detection {}", "[DONE]".bold(), reason);
    println!("  Lines read:        {}", report.stats.lines_read);
    println!("  Samples processed: {}", report.stats.samples_processed);
    println!("  Frames rejected:   {}", report.stats.frames_rejected_total());
    println!(
        "  Gestures detected: {}",
        report.stats.events_fired.to_string().green().bold()
    );
}
