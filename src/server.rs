use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{Extension, Router, routing::get};
use tokio::sync::Mutex;
use tracing::info;

use crate::{Res, api, config, error::SyncError, types::PkceToken};

pub fn router(state: Arc<Mutex<Option<PkceToken>>>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback).layer(Extension(state)))
}

/// Serves the login callback on `SERVER_ADDRESS` until the task is dropped.
pub async fn start_api_server(state: Arc<Mutex<Option<PkceToken>>>) -> Res<()> {
    let addr = SocketAddr::from_str(&config::server_addr()).map_err(|e| SyncError::Input {
        message: format!("invalid SERVER_ADDRESS: {}", e),
    })?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "callback server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
