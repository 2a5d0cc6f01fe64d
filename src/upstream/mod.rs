//! The `upstream` module connects the engine to the external Redis pub/sub
//! server: every message published there is fanned out locally, and the
//! heartbeat's counters report goes back out to Redis for other instances.

pub mod redis_source;

pub use redis_source::{ADMIN_CHANNEL, RedisSource, RedisStatsSink, SUBSCRIBE_PATTERN};
