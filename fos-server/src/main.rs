//! FranchiseOS signage backend - main entry point
//!
//! Startup order matters: recovery and migrations complete before the HTTP
//! listener accepts any traffic, and the backup scheduler runs from then
//! on, independent of request handling.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fos_common::config::{resolve_data_dir, TomlConfig};
use fos_common::db::{open_store, spawn_backup_scheduler};
use fos_server::api::{build_router, AppState};
use fos_server::sms::{ConsoleSender, Msg91Sender, SmsSender};

/// Command-line arguments for fos-server
#[derive(Parser, Debug)]
#[command(name = "fos-server")]
#[command(about = "FranchiseOS digital-signage backend")]
#[command(version)]
struct Args {
    /// Port to listen on (falls back to the config file, then 3000)
    #[arg(short, long, env = "FOS_PORT")]
    port: Option<u16>,

    /// Directory holding database.json, backups/ and audit.log
    #[arg(short, long, env = "FOS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Admin API key (X-API-Key header)
    #[arg(long, env = "FOS_API_KEY")]
    api_key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fos_server=debug,fos_common=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let toml_config = TomlConfig::load_default()
        .context("Failed to load config file")?
        .unwrap_or_default();

    let data_dir = resolve_data_dir(args.data_dir.as_ref());
    let port = args.port.or(toml_config.port).unwrap_or(3000);

    info!("Starting FranchiseOS backend on port {}", port);
    info!("Data directory: {}", data_dir.display());

    // Recover, migrate, and only then accept traffic
    let (store, backups) =
        open_store(&data_dir).context("Failed to open document store")?;
    let store = Arc::new(store);
    info!("Document store ready");

    spawn_backup_scheduler(backups);

    let sms: Arc<dyn SmsSender> = match toml_config.msg91 {
        Some(msg91) => {
            info!("SMS dispatch: MSG91");
            Arc::new(Msg91Sender::new(msg91.auth_key, msg91.template_id))
        }
        None => {
            info!("SMS dispatch: not configured, codes will be logged");
            Arc::new(ConsoleSender)
        }
    };

    let state = AppState::new(store, sms, args.api_key);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
