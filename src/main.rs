//! tablerest server
//!
//! Binary entry point serving the configured resources over REST.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tablerest::common::config::TableRestConfig;
use tablerest::TableRest;

#[derive(Parser, Debug)]
#[command(name = "tablerest")]
#[command(about = "Convention-based REST exposure layer", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TABLEREST_CONFIG", default_value = "tablerest.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(args.json_logs.then(|| fmt::layer().json()))
        .with((!args.json_logs).then(fmt::layer))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("tablerest v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config: TableRestConfig = if args.config.exists() {
        let content = std::fs::read_to_string(&args.config)?;
        toml::from_str(&content)?
    } else {
        info!("Using default configuration");
        TableRestConfig::default()
    };

    let server = TableRest::new(config)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    let run = server.run();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        () = shutdown => {
            server.shutdown().await;
            if let Err(e) = run.await {
                error!("Server error during shutdown: {}", e);
            }
        }
    }

    Ok(())
}
