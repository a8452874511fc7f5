//! # admin-api
//!
//! ```text
//! .env ──► tracing ──► AdminConfig::load ──► Database (migrations)
//!                                                │
//!                                                ▼
//!                         AppState ──► axum::serve ──► shutdown on Ctrl+C / SIGTERM
//! ```
//!
//! Usage: `admin-api [--config <path>]`

use std::path::PathBuf;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use comptoir_admin_api::{build_router, AdminConfig, AppState};
use comptoir_db::{Database, DbConfig};

const DEFAULT_LOG_FILTER: &str = "info,comptoir=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Comptoir admin API");

    let config = AdminConfig::load(config_path_arg()).context("loading configuration")?;
    let addr = config.server.socket_addr()?;

    let db = Database::new(DbConfig::new(&config.database.path).max_connections(config.database.max_connections))
        .await
        .with_context(|| format!("opening database {}", config.database.path.display()))?;
    info!(path = %config.database.path.display(), "Database ready");

    let state = AppState::new(db.clone(), config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// `--config <path>` or `--config=<path>`.
fn config_path_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
