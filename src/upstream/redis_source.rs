use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::broker::Manager;
use crate::heartbeat::StatsSink;
use crate::utils::error::{Error, Result};

/// Pattern subscribed upstream; every channel is bridged.
pub const SUBSCRIBE_PATTERN: &str = "*";

/// Channel the counters report is published to. The admin stream
/// subscribes to the topic of the same name, so reports from every
/// instance come back through the bridge.
pub const ADMIN_CHANNEL: &str = "sse:admin";

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Bridges Redis pub/sub into the manager.
pub struct RedisSource {
    client: redis::Client,
    manager: Manager,
    retry_delay: Duration,
}

impl RedisSource {
    pub fn new(client: redis::Client, manager: Manager) -> Self {
        Self {
            client,
            manager,
            retry_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Relay upstream messages until the manager stops, reconnecting after
    /// the retry delay whenever the subscription fails or ends.
    pub async fn run(self) {
        loop {
            match self.relay().await {
                Err(Error::ManagerStopped) => {
                    debug!("manager stopped, upstream relay exiting");
                    return;
                }
                Err(e) => error!("upstream subscription failed: {e}"),
                Ok(()) => warn!("upstream subscription ended"),
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    pub(crate) async fn relay(&self) -> Result<()> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(SUBSCRIBE_PATTERN).await?;
        info!("subscribed upstream to pattern {SUBSCRIBE_PATTERN}");

        let mut messages = pubsub.into_on_message();
        while let Some(msg) = messages.next().await {
            let channel = msg.get_channel_name().to_string();
            let payload = msg.get_payload_bytes().to_vec();
            self.manager.submit(&channel, payload).await?;
        }
        Ok(())
    }
}

/// Publishes the heartbeat report to `ADMIN_CHANNEL`.
///
/// The connection is opened on the first report and dropped after any
/// failure, so the next report starts from a fresh one.
pub struct RedisStatsSink {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStatsSink {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            connection: Mutex::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }
}

#[async_trait]
impl StatsSink for RedisStatsSink {
    async fn report(&self, line: String) -> Result<()> {
        let mut slot = self.connection.lock().await;
        let mut connection = match slot.clone() {
            Some(connection) => connection,
            None => {
                let connection = self.client.get_multiplexed_async_connection().await?;
                debug!("stats connection established");
                *slot = Some(connection.clone());
                connection
            }
        };

        let published: redis::RedisResult<i64> = connection.publish(ADMIN_CHANNEL, line).await;
        if let Err(e) = published {
            *slot = None;
            return Err(e.into());
        }
        Ok(())
    }
}
