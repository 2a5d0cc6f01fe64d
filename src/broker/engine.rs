//! Topic manager
//!
//! The manager is a single actor task that owns the topic `Registry`. Every
//! other task talks to it through a cloneable `Manager` handle whose methods
//! send into one of three bounded mailboxes:
//!
//! - control: subscribe, unsubscribe and introspection queries. They share a
//!   mailbox so the requests of one connection are applied in issue order.
//! - delete: explicit topic removal.
//! - publish: messages to fan out.
//!
//! Each loop iteration waits for any mailbox, then drains up to
//! `DRAIN_BATCH` requests from every mailbox, so a busy publisher cannot
//! starve lifecycle requests and vice versa. Senders wait when a mailbox is
//! full, which bounds the amount of queued lifecycle work.
//!
//! The actor also tracks, per queue, the topic names it was subscribed
//! under. The unsubscribe that empties that set closes the queue, and since
//! only the actor ever closes queues this happens exactly once.
//!
//! The loop has no error path. It ends when every `Manager` clone is gone;
//! a panic inside it ends the service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::broker::counters::Counters;
use crate::broker::message::Message;
use crate::broker::queue::{QueueId, SubscriptionQueue};
use crate::broker::registry::Registry;
use crate::broker::topic::Dispatch;
use crate::client::Subscription;
use crate::config::BrokerSettings;
use crate::utils::error::{Error, Result};

/// Upper bound of requests taken from one mailbox per loop iteration.
const DRAIN_BATCH: usize = 64;

enum Control {
    Subscribe {
        topic: String,
        queue: SubscriptionQueue,
        ack: Option<oneshot::Sender<()>>,
    },
    Unsubscribe {
        topic: String,
        queue: SubscriptionQueue,
    },
    SubscriberCount {
        topic: String,
        reply: oneshot::Sender<Option<usize>>,
    },
}

/// Handle to the manager actor.
#[derive(Debug, Clone)]
pub struct Manager {
    control: mpsc::Sender<Control>,
    deletes: mpsc::Sender<String>,
    publishes: mpsc::Sender<Message>,
    counters: Arc<Counters>,
    queue_capacity: usize,
}

impl Manager {
    /// Start the actor on the current runtime.
    pub fn spawn(settings: &BrokerSettings, counters: Arc<Counters>) -> (Self, JoinHandle<()>) {
        let capacity = settings.mailbox_capacity.max(1);
        let (control_tx, control_rx) = mpsc::channel(capacity);
        let (delete_tx, delete_rx) = mpsc::channel(capacity);
        let (publish_tx, publish_rx) = mpsc::channel(capacity);

        let actor = ManagerActor {
            registry: Registry::new(settings.topic_capacity, counters.clone()),
            bindings: HashMap::new(),
            counters: counters.clone(),
            control: control_rx,
            deletes: delete_rx,
            publishes: publish_rx,
        };
        let task = tokio::spawn(actor.run());

        let manager = Self {
            control: control_tx,
            deletes: delete_tx,
            publishes: publish_tx,
            counters,
            queue_capacity: settings.queue_capacity,
        };
        (manager, task)
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// A fresh, unregistered queue with the configured capacity.
    pub fn new_queue(&self) -> SubscriptionQueue {
        SubscriptionQueue::new(self.queue_capacity)
    }

    /// Open a multiplexed subscription for one connection.
    pub async fn open(&self, route: &str, topic_list: &str) -> Result<Subscription> {
        Subscription::open(self, route, topic_list).await
    }

    /// Register `queue` under `topic`, creating the topic if needed.
    pub async fn subscribe(&self, topic: impl Into<String>, queue: &SubscriptionQueue) -> Result<()> {
        self.send_control(Control::Subscribe {
            topic: topic.into(),
            queue: queue.clone(),
            ack: None,
        })
        .await
    }

    /// Register `queue` under every name in `topics` and wait until the
    /// manager has applied all of them.
    pub async fn subscribe_all(&self, topics: &[String], queue: &SubscriptionQueue) -> Result<()> {
        let Some((last, rest)) = topics.split_last() else {
            return Ok(());
        };
        for topic in rest {
            self.subscribe(topic.clone(), queue).await?;
        }

        let (ack, applied) = oneshot::channel();
        self.send_control(Control::Subscribe {
            topic: last.clone(),
            queue: queue.clone(),
            ack: Some(ack),
        })
        .await?;
        applied.await.map_err(|_| Error::ManagerStopped)
    }

    /// Remove `queue` from `topic`. Unknown registrations are ignored.
    pub async fn unsubscribe(&self, topic: impl Into<String>, queue: &SubscriptionQueue) -> Result<()> {
        self.send_control(Control::Unsubscribe {
            topic: topic.into(),
            queue: queue.clone(),
        })
        .await
    }

    pub async fn delete_topic(&self, topic: impl Into<String>) -> Result<()> {
        self.deletes
            .send(topic.into())
            .await
            .map_err(|_| Error::ManagerStopped)
    }

    pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> Result<()> {
        self.publishes
            .send(Message::new(topic, payload))
            .await
            .map_err(|_| Error::ManagerStopped)
    }

    /// Publish one payload to each topic of a comma-separated list.
    pub async fn submit(&self, topics: &str, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        for topic in topics.split(',') {
            self.publish(topic, payload.clone()).await?;
        }
        Ok(())
    }

    /// Number of queues registered under `topic`, `None` if no such topic.
    pub async fn subscriber_count(&self, topic: impl Into<String>) -> Result<Option<usize>> {
        let (reply, answer) = oneshot::channel();
        self.send_control(Control::SubscriberCount {
            topic: topic.into(),
            reply,
        })
        .await?;
        answer.await.map_err(|_| Error::ManagerStopped)
    }

    async fn send_control(&self, request: Control) -> Result<()> {
        self.control
            .send(request)
            .await
            .map_err(|_| Error::ManagerStopped)
    }
}

struct Binding {
    queue: SubscriptionQueue,
    topics: HashSet<String>,
}

struct ManagerActor {
    registry: Registry,
    bindings: HashMap<QueueId, Binding>,
    counters: Arc<Counters>,
    control: mpsc::Receiver<Control>,
    deletes: mpsc::Receiver<String>,
    publishes: mpsc::Receiver<Message>,
}

impl ManagerActor {
    async fn run(mut self) {
        debug!("topic manager started");
        loop {
            tokio::select! {
                Some(request) = self.control.recv() => self.handle_control(request),
                Some(topic) = self.deletes.recv() => self.delete_topic(&topic),
                Some(message) = self.publishes.recv() => self.publish(message),
                else => break,
            }
            self.drain();
        }
        debug!(topics = self.registry.len(), "topic manager stopped");
    }

    fn drain(&mut self) {
        for _ in 0..DRAIN_BATCH {
            match self.control.try_recv() {
                Ok(request) => self.handle_control(request),
                Err(_) => break,
            }
        }
        for _ in 0..DRAIN_BATCH {
            match self.deletes.try_recv() {
                Ok(topic) => self.delete_topic(&topic),
                Err(_) => break,
            }
        }
        for _ in 0..DRAIN_BATCH {
            match self.publishes.try_recv() {
                Ok(message) => self.publish(message),
                Err(_) => break,
            }
        }
    }

    fn handle_control(&mut self, request: Control) {
        match request {
            Control::Subscribe { topic, queue, ack } => {
                self.subscribe(topic, queue);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            Control::Unsubscribe { topic, queue } => self.unsubscribe(&topic, queue.id()),
            Control::SubscriberCount { topic, reply } => {
                let count = self.registry.get(&topic).map(|t| t.subscriber_count());
                let _ = reply.send(count);
            }
        }
    }

    fn subscribe(&mut self, topic: String, queue: SubscriptionQueue) {
        if queue.is_closed() {
            debug!(topic = %topic, queue = queue.id(), "ignoring subscribe of a closed queue");
            return;
        }

        self.registry.get_or_create(&topic).subscribe(queue.clone());
        let id = queue.id();
        self.bindings
            .entry(id)
            .or_insert_with(|| Binding {
                queue,
                topics: HashSet::new(),
            })
            .topics
            .insert(topic);
        trace!(queue = id, "subscribed");
    }

    fn unsubscribe(&mut self, topic: &str, id: QueueId) {
        if let Some(t) = self.registry.get_mut(topic) {
            t.unsubscribe(id);
        }

        let Some(binding) = self.bindings.get_mut(&id) else {
            return;
        };
        if binding.topics.remove(topic) && binding.topics.is_empty() {
            if let Some(binding) = self.bindings.remove(&id) {
                if binding.queue.close() {
                    trace!(queue = id, "queue closed");
                }
            }
        }
    }

    fn delete_topic(&mut self, topic: &str) {
        if let Some(released) = self.registry.delete(topic) {
            debug!(topic, released = released.len(), "topic deleted");
        }
    }

    fn publish(&mut self, message: Message) {
        self.counters.record_message();
        let topic = self.registry.get_or_create(&message.topic);
        if let Dispatch::Backlogged = topic.dispatch(message) {
            trace!(topic = topic.name(), "message dropped at dispatch");
        }
    }
}
