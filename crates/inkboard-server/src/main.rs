//! Inkboard Server
//!
//! Remote board store: clients subscribe to a board over WebSocket, write
//! full snapshots, and receive each other's writes. The latest document of
//! every board is kept in memory and, when `INKBOARD_DATA_DIR` is set,
//! persisted as JSON files.
//!
//! ## Protocol
//!
//! Frames are JSON text tagged by `type`:
//! ```json
//! { "type": "subscribe", "board": "main", "user": "ada" }
//! { "type": "write", "snapshot": "data:image/png;base64,...", "width": 800, "height": 600 }
//! { "type": "read", "board": "main" }
//! { "type": "unsubscribe" }
//! ```
//!
//! HTTP: `GET /boards/{id}` returns the latest document as JSON.

mod config;
mod hub;
mod routes;

use config::{ConfigError, ServerConfig};
use hub::BoardHub;
use inkboard_core::storage::{FileStorage, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to open board storage: {0}")]
    Storage(#[from] StorageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkboard_server=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;

    let hub = match &config.data_dir {
        Some(dir) => {
            info!("Storing boards in {}", dir.display());
            BoardHub::new(Arc::new(FileStorage::new(dir.clone())?))
        }
        None => {
            warn!("INKBOARD_DATA_DIR is not set, boards are kept in memory only");
            BoardHub::in_memory()
        }
    };

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("Inkboard server listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);

    axum::serve(listener, routes::router(Arc::new(hub))).await?;
    Ok(())
}
