//! WiFi-Gesture CLI Entry Point
//!
//! This is the main entry point for the wifi-gesture command-line tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wifi_gesture_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => {
            wifi_gesture_cli::detect::execute(args).await?;
        }
        Commands::Serve(args) => {
            wifi_gesture_cli::serve::execute(args).await?;
        }
        Commands::Extract(args) => {
            wifi_gesture_cli::extract::execute(args)?;
        }
        Commands::Version => {
            println!("wifi-gesture {}", env!("CARGO_PKG_VERSION"));
            println!("Signal pipeline version: {}", wifi_gesture_signal::VERSION);
            println!("Feature layout: {} features", wifi_gesture_core::FEATURE_COUNT);
        }
    }

    Ok(())
}
