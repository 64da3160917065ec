use anyhow::{Context, Result};
use clap::Parser;
use propval_api::{serve, ApiConfig, CliOverrides};
use propval_core::ContextHandle;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "propval-api")]
#[command(about = "Property price prediction API", long_about = None)]
struct Cli {
    /// TOML configuration file (falls back to $PROPVAL_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var_os(propval_api::config::CONFIG_PATH_ENV).map(PathBuf::from));

    let config = ApiConfig::load(
        config_path.as_deref(),
        &CliOverrides {
            host: cli.host,
            port: cli.port,
        },
    )?;

    init_logging(&config.log_level);
    info!("Starting propval-api v{}", env!("CARGO_PKG_VERSION"));

    let handle = ContextHandle::open(config.artifact_paths())
        .context("failed to load model artifacts; refusing to serve")?;

    serve(
        Arc::new(handle),
        &config.bind_addr(),
        config.cors_permissive,
        shutdown_signal(),
    )
    .await?;

    info!("propval-api stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down propval-api");
}
