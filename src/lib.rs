//! # streamhub
//!
//! `streamhub` relays messages published on a Redis pub/sub server to many
//! long-lived HTTP clients, over Server-Sent Events or WebSockets. One
//! connection may follow several topics at once and ordinary connections
//! also receive a periodic `PING` heartbeat.
//!
//! ## Core Modules
//!
//! - `broker`: the broadcast engine. A manager actor owns the topic registry
//!   and serializes subscribe, unsubscribe, delete and publish requests.
//! - `client`: the per-connection `Subscription` multiplexing several topics
//!   into one queue.
//! - `heartbeat`: periodic `PING` publisher and counters reporter.
//! - `upstream`: the Redis bridge feeding the engine.
//! - `transport`: HTTP routes (SSE, WebSocket, status).
//! - `config`: settings loaded from files and environment.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod heartbeat;
pub mod transport;
pub mod upstream;
pub mod utils;
