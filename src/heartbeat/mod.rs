//! Heartbeat scheduler
//!
//! Every period the scheduler publishes the current time into the `PING`
//! topic, which reaches every ordinary connection through the normal
//! dispatch path, and hands a one-line counters report to a `StatsSink`.
//! Reports are fire-and-forget: a failure is logged and the next tick
//! simply sends a fresh one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::broker::{CounterSnapshot, Counters, Manager};
use crate::client::PING_TOPIC;
use crate::utils::error::Result;

/// Timestamp layout of heartbeat payloads, e.g. `01-31-2026 15:04:05`.
pub const PING_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

/// Destination of the periodic counters report.
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn report(&self, line: String) -> Result<()>;
}

/// Human-readable report line shared with other instances.
pub fn report_line(instance_id: &str, snapshot: &CounterSnapshot) -> String {
    format!(
        "{}, SSE-Total:{}, SSE-Live:{}, SSE-Closed:{}, WS-Total:{}, WS-Live:{}, WS-Closed:{}, Messages:{}",
        instance_id,
        snapshot.sse_total,
        snapshot.sse_live,
        snapshot.sse_closed,
        snapshot.ws_total,
        snapshot.ws_live,
        snapshot.ws_closed,
        snapshot.messages,
    )
}

pub struct Heartbeat {
    manager: Manager,
    counters: Arc<Counters>,
    sink: Option<Arc<dyn StatsSink>>,
    instance_id: String,
    period: Duration,
}

impl Heartbeat {
    pub fn new(manager: Manager, instance_id: impl Into<String>, period: Duration) -> Self {
        let counters = manager.counters().clone();
        Self {
            manager,
            counters,
            sink: None,
            instance_id: instance_id.into(),
            period,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Tick forever. Returns only when the manager is gone.
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.tick().await.is_err() {
                debug!("manager stopped, heartbeat exiting");
                return;
            }
        }
    }

    /// Publish one heartbeat and send one report.
    pub async fn tick(&self) -> Result<()> {
        let now = Local::now().format(PING_FORMAT).to_string();
        self.manager.publish(PING_TOPIC, now).await?;

        if let Some(sink) = &self.sink {
            let line = report_line(&self.instance_id, &self.counters.snapshot());
            let sink = Arc::clone(sink);
            tokio::spawn(async move {
                if let Err(e) = sink.report(line).await {
                    warn!("failed to report stats: {e}");
                }
            });
        }
        Ok(())
    }
}
