//! Ascent Daemon - Promotion orchestration service
//!
//! The Ascent daemon provides:
//! - REST API for bundle registration and promotion runs
//! - Ordered environment promotion with validation gates
//! - Append-only run history for audit and resume

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ascent_daemon::{DaemonConfig, Server};

/// Ascent Daemon CLI
#[derive(Parser)]
#[command(name = "ascentd")]
#[command(about = "Ascent Daemon - Promotion orchestration service", long_about = None)]
#[command(version)]
struct Cli {
    /// Listen address
    #[arg(
        short,
        long,
        env = "ASCENT_LISTEN_ADDR",
        default_value = "127.0.0.1:8080"
    )]
    listen: String,

    /// Environment registry JSON file
    #[arg(short, long, env = "ASCENT_REGISTRY")]
    registry: Option<String>,

    /// Log level
    #[arg(long, env = "ASCENT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "ASCENT_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = DaemonConfig {
        listen_addr: cli
            .listen
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?,
        registry_path: cli.registry,
    };

    let server = Server::new(config)?;
    server.run().await?;
    Ok(())
}
