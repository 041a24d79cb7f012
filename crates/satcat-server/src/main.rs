//! Entry point for the catalog HTTP API.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use satcat_learning::Predictor;
use satcat_processing::ArtifactStore;
use satcat_server::{AppState, build_router};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Serve status predictions and catalog aggregates over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SATCAT_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Directory holding the model artifacts and aggregate tables
    #[arg(long, env = "SATCAT_ARTIFACTS_DIR", default_value = "artifacts")]
    artifacts: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

/// `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str, json_output: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json_output {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.json);

    let store = ArtifactStore::new(&args.artifacts);
    let predictor = match Predictor::load(&store) {
        Ok(predictor) => Some(predictor),
        Err(e) => {
            warn!("Serving without a model: {}", e);
            None
        }
    };
    let app = build_router(AppState::new(store, predictor));

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Binding {}", args.bind))?;
    info!(
        "Listening on {} with artifacts from {}",
        args.bind,
        args.artifacts.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;
    Ok(())
}
