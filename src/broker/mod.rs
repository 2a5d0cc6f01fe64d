//! In-process broadcast engine: topics, the registry that owns them, the
//! manager actor serializing access to it, connection queues and counters.

pub mod counters;
pub mod engine;
pub mod message;
pub mod queue;
pub mod registry;
pub mod topic;

pub use counters::{ConnectionGuard, CounterSnapshot, Counters, TransportKind};
pub use engine::Manager;
pub use message::Message;
pub use queue::SubscriptionQueue;
