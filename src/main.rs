//! Main entry point for the aircraft-enricher CLI

use aircraft_enricher::cli::error::EXIT_INTERRUPTED;
use aircraft_enricher::cli::{Cli, Commands};
use aircraft_enricher::metrics;
use aircraft_enricher::shutdown::{self, ShutdownCoordinator};
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("aircraft_enricher=info"));

    // Logs go to stderr so stdout carries only the command result
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr).await {
            warn!("Metrics exporter disabled: {}", e);
        }
    }

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    shutdown::listen_for_ctrl_c(shutdown.clone());

    let result = match cli.command {
        Commands::Enrich(ref args) => args.execute(&cli, shutdown.clone()).await,
        Commands::Status(ref args) => args.execute(&cli),
    };

    if let Err(e) = result {
        let code = e.exit_code();
        if code != EXIT_INTERRUPTED {
            error!("Command failed: {}", e);
        }
        std::process::exit(code);
    }
}
