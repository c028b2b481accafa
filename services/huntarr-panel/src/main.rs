//! Huntarr Panel CLI
//!
//! Command-line interface for the headless Huntarr control panel.

use std::path::PathBuf;

use clap::Parser;
use huntarr_panel::{load_config, Config, PanelBuilder};
use tracing::Level;

#[derive(Parser)]
#[command(name = "huntarr-panel")]
#[command(about = "Log tail, history browser and cycle countdown for Huntarr")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info", value_parser = parse_log_level)]
    log_level: Level,
}

fn parse_log_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|_| {
        format!(
            "Invalid log level: {}. Use: trace, debug, info, warn, error",
            s
        )
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, base_url={:?}, dashboard_port={:?}, log_level={:?}",
        args.config,
        args.base_url,
        args.dashboard_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(base_url) = args.base_url {
        config.backend.base_url = base_url;
    }
    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }

    tracing::info!("Starting Huntarr panel");
    tracing::debug!(
        "Backend: {}, tracked apps: {}, dashboard: {}",
        config.backend.base_url,
        config.countdown.apps.len(),
        config.dashboard.enabled
    );

    PanelBuilder::new(config).build()?.start().await?;

    Ok(())
}
