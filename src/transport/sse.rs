//! Server-Sent Events transport
//!
//! Each message becomes one unnamed event whose data is the payload. The
//! subscription lives inside the response stream: when the client goes
//! away hyper drops the stream, which releases the subscription and the
//! connection counters.

use std::borrow::Cow;
use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use futures::stream;
use tracing::{error, info};

use crate::broker::{ConnectionGuard, TransportKind};
use crate::client::Subscription;
use crate::transport::server::AppState;

struct SseConnection {
    subscription: Subscription,
    label: String,
    _guard: Option<ConnectionGuard>,
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        info!("DISCONNECT SSE | {} | {}", self.subscription.id(), self.label);
    }
}

/// `GET /streaming/{route}/{topics}`
pub async fn stream(
    Path((route, topics)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    open(state, &route, &topics, true).await
}

/// `GET /admin`: heartbeat reports only, no PING, not counted.
pub async fn admin(State(state): State<AppState>) -> Response {
    open(state, "sse", "admin", false).await
}

async fn open(state: AppState, route: &str, topics: &str, counted: bool) -> Response {
    let subscription = match state.manager.open(route, topics).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("failed to open SSE subscription: {e}");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };
    let guard = counted.then(|| state.counters.connection_opened(TransportKind::Sse));
    let label = format!("{route}/{topics}");
    info!("CONNECT SSE | {} | {}", subscription.id(), label);

    Sse::new(events(SseConnection {
        subscription,
        label,
        _guard: guard,
    }))
    .into_response()
}

fn events(connection: SseConnection) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    stream::unfold(connection, |connection| async move {
        let message = connection.subscription.recv().await?;
        let event = Event::default().data(event_data(&message.payload_text()));
        Some((Ok::<_, Infallible>(event), connection))
    })
}

/// SSE cannot carry carriage returns; fold them into line feeds.
pub(crate) fn event_data(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
