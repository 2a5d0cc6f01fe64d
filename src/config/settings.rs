use serde::Deserialize;

/// Top-level configuration settings for the service.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub redis: RedisSettings,
    pub broker: BrokerSettings,
}

/// Address the HTTP listener binds to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Connection details for the upstream Redis pub/sub server.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl RedisSettings {
    /// Connection URL in the form accepted by `redis::Client::open`.
    pub fn url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Capacities and timings of the in-process broadcast engine.
///
/// - `mailbox_capacity` bounds each of the manager's request mailboxes.
/// - `topic_capacity` bounds the per-topic delivery backlog.
/// - `queue_capacity` bounds each connection's queue; the oldest message is
///   dropped when a slow consumer lets it fill up.
/// - `heartbeat_secs` is the period of the PING publisher.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub mailbox_capacity: usize,
    pub topic_capacity: usize,
    pub queue_capacity: usize,
    pub heartbeat_secs: u64,
}

/// Partial configuration loaded from files or environment.
///
/// `port` at the top level is the listen port as older deployment files
/// spell it; `server.port` wins when both are present.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub port: Option<u16>,
    pub server: Option<PartialServerSettings>,
    pub redis: Option<PartialRedisSettings>,
    pub broker: Option<PartialBrokerSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRedisSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub db: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub mailbox_capacity: Option<usize>,
    pub topic_capacity: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub heartbeat_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            redis: RedisSettings {
                host: "127.0.0.1".to_string(),
                port: 6379,
                password: None,
                db: 0,
            },
            broker: BrokerSettings::default(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 100,
            topic_capacity: 1024,
            queue_capacity: 256,
            heartbeat_secs: 10,
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    pub fn merge_defaults(self) -> Settings {
        let default = Settings::default();
        let server = self.server.unwrap_or_default();
        let redis = self.redis.unwrap_or_default();
        let broker = self.broker.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server
                    .port
                    .or(self.port)
                    .unwrap_or(default.server.port),
            },
            redis: RedisSettings {
                host: redis.host.unwrap_or(default.redis.host),
                port: redis.port.unwrap_or(default.redis.port),
                password: redis.password.or(default.redis.password),
                db: redis.db.unwrap_or(default.redis.db),
            },
            broker: BrokerSettings {
                mailbox_capacity: broker
                    .mailbox_capacity
                    .unwrap_or(default.broker.mailbox_capacity)
                    .max(1),
                topic_capacity: broker
                    .topic_capacity
                    .unwrap_or(default.broker.topic_capacity)
                    .max(1),
                queue_capacity: broker
                    .queue_capacity
                    .unwrap_or(default.broker.queue_capacity)
                    .max(1),
                heartbeat_secs: broker
                    .heartbeat_secs
                    .unwrap_or(default.broker.heartbeat_secs)
                    .max(1),
            },
        }
    }
}
