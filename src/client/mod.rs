//! The `client` module defines how one external connection consumes topics.
//!
//! A connection holds a single `Subscription`: one queue registered under
//! every topic the connection asked for, plus the heartbeat topic for
//! ordinary clients.

pub mod subscription;
pub use subscription::{PING_TOPIC, Subscription, topic_names, wants_heartbeat};

#[cfg(test)]
mod tests;
