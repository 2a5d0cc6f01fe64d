//! The `error` module defines the error type used across `streamhub`.
//!
//! Connection-level faults never surface here: they end the connection that
//! raised them. What does surface are startup failures (configuration, bind,
//! upstream connection) and the manager having stopped, which callers treat
//! as fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The manager actor is gone, so its mailboxes are closed.
    #[error("topic manager is not running")]
    ManagerStopped,
}

pub type Result<T> = std::result::Result<T, Error>;
