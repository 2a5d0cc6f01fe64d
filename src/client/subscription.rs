use futures::Stream;
use futures::stream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::{Manager, Message, SubscriptionQueue};
use crate::utils::error::Result;

/// Reserved topic carrying heartbeats.
pub const PING_TOPIC: &str = "PING";

/// Route used by the admin stream.
const ADMIN_ROUTE: &str = "sse";
/// Topic list used by the admin stream.
const ADMIN_TOPIC: &str = "admin";

/// Whether a connection on `route` asking for `topic_list` also receives
/// heartbeats. The admin stream (`sse` / `admin`) is exempt.
pub fn wants_heartbeat(route: &str, topic_list: &str) -> bool {
    route != ADMIN_ROUTE && topic_list != ADMIN_TOPIC
}

/// Fully qualified topic names for a connection, `route:name` for each
/// comma-separated entry, followed by `PING` when heartbeats apply.
/// Repeated entries are subscribed once.
pub fn topic_names(route: &str, topic_list: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in topic_list.split(',') {
        let qualified = format!("{route}:{name}");
        if !names.contains(&qualified) {
            names.push(qualified);
        }
    }
    if wants_heartbeat(route, topic_list) {
        names.push(PING_TOPIC.to_string());
    }
    names
}

/// One connection's multiplexed view over its topics.
///
/// All topics write into the same queue, so `recv` yields messages of every
/// topic in the order they were dispatched. The subscription is released by
/// `close`, or, when the owner never gets to call it, by `Drop`.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    topics: Vec<String>,
    queue: SubscriptionQueue,
    manager: Manager,
    /// Topics still registered; emptied one unsubscribe at a time.
    pending: Vec<String>,
}

impl Subscription {
    /// Register a new queue under every topic of `route`/`topic_list` and
    /// return once the manager has applied all registrations.
    pub async fn open(manager: &Manager, route: &str, topic_list: &str) -> Result<Self> {
        let topics = topic_names(route, topic_list);
        let subscription = Self {
            id: Uuid::new_v4(),
            pending: topics.clone(),
            topics,
            queue: manager.new_queue(),
            manager: manager.clone(),
        };
        // on failure the drop guard releases whatever was registered
        manager
            .subscribe_all(&subscription.topics, &subscription.queue)
            .await?;
        debug!(id = %subscription.id, topics = ?subscription.topics, "subscription opened");
        Ok(subscription)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn queue(&self) -> &SubscriptionQueue {
        &self.queue
    }

    pub fn is_closed(&self) -> bool {
        self.pending.is_empty()
    }

    /// Next message from any of the subscribed topics; `None` once the
    /// subscription has been released and its queue drained.
    pub async fn recv(&self) -> Option<Message> {
        self.queue.recv().await
    }

    /// Turn the subscription into an endless stream of messages. Dropping
    /// the stream releases the subscription.
    pub fn into_stream(self) -> impl Stream<Item = Message> + Send + 'static {
        stream::unfold(self, |subscription| async move {
            let message = subscription.recv().await?;
            Some((message, subscription))
        })
    }

    /// Unsubscribe from every topic. Later calls do nothing.
    ///
    /// A topic is forgotten only once its unsubscribe has been handed to the
    /// manager, so if this future is dropped midway `Drop` releases the rest.
    pub async fn close(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        while let Some(topic) = self.pending.last() {
            self.manager.unsubscribe(topic.as_str(), &self.queue).await?;
            self.pending.pop();
        }
        debug!(id = %self.id, "subscription closed");
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(id = %self.id, "no runtime to release subscription");
            return;
        };
        let manager = self.manager.clone();
        let queue = self.queue.clone();
        let pending = std::mem::take(&mut self.pending);
        let id = self.id;
        runtime.spawn(async move {
            for topic in pending.into_iter().rev() {
                if manager.unsubscribe(topic, &queue).await.is_err() {
                    return;
                }
            }
            debug!(%id, "subscription released on drop");
        });
    }
}
