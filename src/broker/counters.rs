//! Service-wide counters
//!
//! Connection counters are updated from the connection tasks through a
//! `ConnectionGuard`; the message counter only from the manager actor.
//! Everything is atomic, so readers (status endpoint, heartbeat reporter)
//! take a `CounterSnapshot` without coordinating with anyone.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Which transport a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Sse,
    WebSocket,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Sse => f.write_str("SSE"),
            TransportKind::WebSocket => f.write_str("WS"),
        }
    }
}

#[derive(Debug, Default)]
struct ConnectionCounters {
    total: AtomicU64,
    live: AtomicU64,
    closed: AtomicU64,
}

#[derive(Debug, Default)]
pub struct Counters {
    sse: ConnectionCounters,
    ws: ConnectionCounters,
    messages: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub sse_total: u64,
    pub sse_live: u64,
    pub sse_closed: u64,
    pub ws_total: u64,
    pub ws_live: u64,
    pub ws_closed: u64,
    pub messages: u64,
    pub dropped: u64,
}

impl Counters {
    /// Count a new connection as total and live. Dropping the guard moves
    /// it from live to closed.
    pub fn connection_opened(self: &Arc<Self>, kind: TransportKind) -> ConnectionGuard {
        let counters = self.connection(kind);
        counters.total.fetch_add(1, Ordering::Relaxed);
        counters.live.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            counters: Arc::clone(self),
            kind,
        }
    }

    pub(crate) fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            sse_total: self.sse.total.load(Ordering::Relaxed),
            sse_live: self.sse.live.load(Ordering::Relaxed),
            sse_closed: self.sse.closed.load(Ordering::Relaxed),
            ws_total: self.ws.total.load(Ordering::Relaxed),
            ws_live: self.ws.live.load(Ordering::Relaxed),
            ws_closed: self.ws.closed.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn connection(&self, kind: TransportKind) -> &ConnectionCounters {
        match kind {
            TransportKind::Sse => &self.sse,
            TransportKind::WebSocket => &self.ws,
        }
    }
}

/// Keeps one connection counted as live until dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    kind: TransportKind,
}

impl ConnectionGuard {
    pub fn kind(&self) -> TransportKind {
        self.kind
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let counters = self.counters.connection(self.kind);
        counters.live.fetch_sub(1, Ordering::Relaxed);
        counters.closed.fetch_add(1, Ordering::Relaxed);
    }
}
