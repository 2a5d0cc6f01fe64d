use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::broker::CounterSnapshot;
use crate::transport::server::AppState;

/// Read-only view served at `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "Server-Id")]
    pub server_id: String,
    #[serde(rename = "SSE-Total")]
    pub sse_total: u64,
    #[serde(rename = "SSE-Closed")]
    pub sse_closed: u64,
    #[serde(rename = "SSE-Live")]
    pub sse_live: u64,
    #[serde(rename = "Messages")]
    pub messages: u64,
    #[serde(rename = "WS-Total")]
    pub ws_total: u64,
    #[serde(rename = "WS-Closed")]
    pub ws_closed: u64,
    #[serde(rename = "WS-Live")]
    pub ws_live: u64,
}

impl Status {
    pub fn new(server_id: &str, snapshot: &CounterSnapshot) -> Self {
        Self {
            server_id: server_id.to_string(),
            sse_total: snapshot.sse_total,
            sse_closed: snapshot.sse_closed,
            sse_live: snapshot.sse_live,
            messages: snapshot.messages,
            ws_total: snapshot.ws_total,
            ws_closed: snapshot.ws_closed,
            ws_live: snapshot.ws_live,
        }
    }
}

pub async fn home(State(state): State<AppState>) -> Json<Status> {
    Json(Status::new(&state.instance_id, &state.counters.snapshot()))
}
