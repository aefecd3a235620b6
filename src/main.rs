use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use courier::config::Config;
use courier::store::SqliteStore;
use courier::transport::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // Not fatal, the environment may already carry everything
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Courier relay starting...");

    let config = Config::from_env()?;

    info!("Initializing store at {}", config.db_path.display());
    let store = SqliteStore::new(&config.db_path).await?;
    store.init().await?;
    if config.seed_users {
        let seeded = store.seed_default_users().await?;
        if seeded > 0 {
            info!("Seeded {} default users", seeded);
        }
    }

    let state = AppState::new(Arc::new(store));
    let app = router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = axum::serve(listener, app) => {
            res.context("Server stopped with error")?;
        }
    }

    Ok(())
}
