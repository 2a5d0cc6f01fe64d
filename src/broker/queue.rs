//! Connection queues
//!
//! A `SubscriptionQueue` is the single consumption point of one connection.
//! Every topic the connection is registered with writes into it; exactly one
//! task reads from it. Writers never wait: when the queue is full the oldest
//! message is discarded to make room.
//!
//! Only the manager closes a queue, and `close` reports whether this call
//! was the one that closed it, so a queue is observed closed exactly once.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::broker::message::Message;

pub type QueueId = u64;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Result of a single non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Delivered,
    /// Delivered after evicting the oldest queued message.
    DisplacedOldest,
    /// The queue was already closed; the message was discarded.
    Closed,
}

#[derive(Clone)]
pub struct SubscriptionQueue {
    inner: Arc<Inner>,
}

struct Inner {
    id: QueueId,
    capacity: usize,
    buffer: Mutex<VecDeque<Message>>,
    closed: AtomicBool,
    ready: Notify,
}

impl SubscriptionQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
                capacity,
                buffer: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
                closed: AtomicBool::new(false),
                ready: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> QueueId {
        self.inner.id
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Enqueue without waiting, evicting the oldest message when full.
    pub fn push(&self, message: Message) -> Push {
        let outcome = {
            let mut buffer = self.buffer();
            if self.is_closed() {
                return Push::Closed;
            }
            let outcome = if buffer.len() >= self.inner.capacity {
                buffer.pop_front();
                Push::DisplacedOldest
            } else {
                Push::Delivered
            };
            buffer.push_back(message);
            outcome
        };
        self.inner.ready.notify_one();
        outcome
    }

    /// Wait for the next message.
    ///
    /// Messages queued before the close are still handed out; `None` is
    /// returned once the queue is closed and drained.
    pub async fn recv(&self) -> Option<Message> {
        loop {
            {
                let mut buffer = self.buffer();
                if let Some(message) = buffer.pop_front() {
                    return Some(message);
                }
                if self.is_closed() {
                    return None;
                }
            }
            // notify_one stores a permit, so a push racing with this
            // point still wakes us
            self.inner.ready.notified().await;
        }
    }

    pub fn try_recv(&self) -> Option<Message> {
        self.buffer().pop_front()
    }

    /// Mark the queue closed. Returns `true` only for the call that
    /// actually closed it.
    pub(crate) fn close(&self) -> bool {
        let first = !self.inner.closed.swap(true, Ordering::AcqRel);
        if first {
            self.inner.ready.notify_one();
        }
        first
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SubscriptionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionQueue")
            .field("id", &self.inner.id)
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
