//! # arbor-server
//!
//! HTTP backend for the Arbor diagram editor.
//!
//! This binary provides:
//! - **Tree CRUD** under `/api/trees`, persisted in SQLite via `arbor-store`
//! - **Image uploads** per tree, written under a configured upload root and
//!   served back from `/uploads/{tree_id}/{file}`
//! - **Health check** at `/health`

mod api;
mod config;
mod db;
mod error;
mod upload_store;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,arbor_server=debug,arbor_store=info")),
        )
        .init();

    info!("Starting Arbor server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize storage (migrations, upload root)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState::new(config).await?;
    info!(
        database = %app_state.config.database_path.display(),
        uploads = %app_state.uploads.root().display(),
        purge_uploads_on_delete = app_state.config.purge_uploads_on_delete,
        "Storage ready"
    );

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
