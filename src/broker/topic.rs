//! Topic management
//!
//! A `Topic` holds the queues registered under one name. Topics are owned by
//! the registry inside the manager actor, so none of this is synchronized.
//!
//! Fan-out does not happen on the actor. On the first publish that has
//! somebody to deliver to, the topic spawns its own dispatcher task fed by a
//! bounded backlog of `capacity` entries. `dispatch` snapshots the current
//! subscribers and hands the message to that task with `try_send`; the task
//! pushes into each queue without waiting. A slow consumer can only fill its
//! own queue, and a saturated backlog drops the message instead of stalling
//! the manager.
//!
//! Closing a topic leaves its dispatcher to finish the backlog. A topic
//! created later under the same name is started `after` that dispatcher, and
//! its own one waits for it, so per-topic order holds across a delete.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broker::counters::Counters;
use crate::broker::message::Message;
use crate::broker::queue::{Push, QueueId, SubscriptionQueue};

/// Outcome of handing one message to a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    NoSubscribers,
    /// Queued for delivery to this many subscribers.
    Queued(usize),
    /// The dispatcher backlog was full; the message was dropped.
    Backlogged,
}

struct Delivery {
    message: Message,
    targets: Arc<[SubscriptionQueue]>,
}

pub struct Topic {
    name: Arc<str>,
    capacity: usize,
    subscribers: HashMap<QueueId, SubscriptionQueue>,
    targets: Option<Arc<[SubscriptionQueue]>>,
    outbox: Option<mpsc::Sender<Delivery>>,
    dispatcher: Option<JoinHandle<()>>,
    predecessor: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

/// What is left of a closed topic.
#[derive(Debug)]
pub struct Retired {
    /// Queues that were still registered.
    pub released: Vec<QueueId>,
    /// Dispatcher still draining the backlog, if any.
    pub dispatcher: Option<JoinHandle<()>>,
}

impl Topic {
    pub fn new(name: &str, capacity: usize, counters: Arc<Counters>) -> Self {
        Self {
            name: Arc::from(name),
            capacity: capacity.max(1),
            subscribers: HashMap::new(),
            targets: None,
            outbox: None,
            dispatcher: None,
            predecessor: None,
            counters,
        }
    }

    /// Hold back this topic's deliveries until `predecessor` has finished.
    pub fn after(mut self, predecessor: Option<JoinHandle<()>>) -> Self {
        self.predecessor = predecessor;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn contains(&self, id: QueueId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Register a queue. Returns `false` if it was already registered.
    pub fn subscribe(&mut self, queue: SubscriptionQueue) -> bool {
        let added = self.subscribers.insert(queue.id(), queue).is_none();
        if added {
            self.targets = None;
        }
        added
    }

    /// Unregister a queue. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: QueueId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            self.targets = None;
        }
        removed
    }

    /// Hand `message` to every currently registered queue.
    pub fn dispatch(&mut self, message: Message) -> Dispatch {
        if self.subscribers.is_empty() {
            return Dispatch::NoSubscribers;
        }

        let targets = self.targets();
        let fan_out = targets.len();
        if self.outbox.is_none() {
            let (outbox, dispatcher) = spawn_dispatcher(
                self.name.clone(),
                self.capacity,
                self.counters.clone(),
                self.predecessor.take().or_else(|| self.dispatcher.take()),
            );
            self.outbox = Some(outbox);
            self.dispatcher = Some(dispatcher);
        }
        let Some(outbox) = self.outbox.as_ref() else {
            return Dispatch::Backlogged;
        };

        match outbox.try_send(Delivery { message, targets }) {
            Ok(()) => Dispatch::Queued(fan_out),
            Err(TrySendError::Full(_)) => {
                warn!(topic = %self.name, "dispatch backlog full, dropping message");
                self.counters.record_dropped(fan_out as u64);
                Dispatch::Backlogged
            }
            Err(TrySendError::Closed(_)) => {
                // dispatcher is gone; start a fresh one on the next publish
                warn!(topic = %self.name, "dispatcher stopped, dropping message");
                self.outbox = None;
                self.counters.record_dropped(fan_out as u64);
                Dispatch::Backlogged
            }
        }
    }

    /// Close the topic and release its queues without closing them.
    pub fn close(mut self) -> Retired {
        // dropping the sender lets the dispatcher drain its backlog and exit
        self.outbox = None;
        self.targets = None;
        Retired {
            released: self.subscribers.drain().map(|(id, _)| id).collect(),
            dispatcher: self.dispatcher.take().or_else(|| self.predecessor.take()),
        }
    }

    fn targets(&mut self) -> Arc<[SubscriptionQueue]> {
        self.targets
            .get_or_insert_with(|| self.subscribers.values().cloned().collect())
            .clone()
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

fn spawn_dispatcher(
    name: Arc<str>,
    capacity: usize,
    counters: Arc<Counters>,
    predecessor: Option<JoinHandle<()>>,
) -> (mpsc::Sender<Delivery>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(run_dispatcher(name, rx, counters, predecessor));
    (tx, task)
}

async fn run_dispatcher(
    name: Arc<str>,
    mut rx: mpsc::Receiver<Delivery>,
    counters: Arc<Counters>,
    predecessor: Option<JoinHandle<()>>,
) {
    if let Some(predecessor) = predecessor {
        let _ = predecessor.await;
    }
    debug!(topic = %name, "dispatcher started");
    while let Some(Delivery { message, targets }) = rx.recv().await {
        for queue in targets.iter() {
            if queue.push(message.clone()) == Push::DisplacedOldest {
                counters.record_dropped(1);
                debug!(topic = %name, queue = queue.id(), "slow consumer, oldest message dropped");
            }
        }
    }
    debug!(topic = %name, "dispatcher stopped");
}
