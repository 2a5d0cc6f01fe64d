use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

use crate::broker::{Counters, Manager};
use crate::transport::{sse, status, websocket};

/// Shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub manager: Manager,
    pub counters: Arc<Counters>,
    pub instance_id: Arc<str>,
}

impl AppState {
    pub fn new(manager: Manager, instance_id: impl Into<Arc<str>>) -> Self {
        let counters = manager.counters().clone();
        Self {
            manager,
            counters,
            instance_id: instance_id.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status::home))
        .route("/admin", get(sse::admin))
        .route("/streaming/{route}/{topics}", get(sse::stream))
        .route("/ws-streaming/{route}/{topics}", get(websocket::stream))
        .with_state(state)
}

/// Serve HTTP on `listener` until the server fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
