//! Message definitions for the broker
//!
//! A `Message` only lives while it travels from the manager through a
//! topic's dispatcher into connection queues. It is cloned once per
//! subscriber, so both fields are reference counted.

use std::sync::Arc;

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Arc<str>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<Arc<str>>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// The payload as text, replacing invalid UTF-8 sequences.
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
