use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Covers the ingestion server, its broker connection, consumer sessions and
/// the host name shown to users.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub consumer: ConsumerSettings,
    pub display: DisplaySettings,
}

/// Address the ingestion HTTP server binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Broker connection used by the ingestion service.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub keep_alive_secs: u64,
    pub reconnect_period_ms: u64,
    pub connect_timeout_ms: u64,
    pub publish_timeout_ms: u64,
    pub clean_session: bool,
}

/// Consumer sessions connect to the broker directly, usually through a
/// different listener than the ingestion service.
#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerSettings {
    pub broker_url: Option<String>,
    pub capacity: usize,
}

/// Externally visible names, used to build URLs shown to users.
#[derive(Debug, Deserialize, Clone)]
pub struct DisplaySettings {
    pub public_host: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub consumer: Option<PartialConsumerSettings>,
    pub display: Option<PartialDisplaySettings>,
}

/// Server section as read from a file or `RELAY_SERVER__*`; unset fields
/// fall back to the defaults.
#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Broker section with every field optional.
///
/// `keep_alive_secs = 0` is accepted and turns keep-alive off.
#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub url: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub reconnect_period_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub publish_timeout_ms: Option<u64>,
    pub clean_session: Option<bool>,
}

/// Consumer section with every field optional.
#[derive(Debug, Deserialize)]
pub struct PartialConsumerSettings {
    pub broker_url: Option<String>,
    pub capacity: Option<usize>,
}

/// Display section with every field optional.
#[derive(Debug, Deserialize)]
pub struct PartialDisplaySettings {
    pub public_host: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 4000,
            },
            broker: BrokerSettings {
                url: "ws://127.0.0.1:8080".to_string(),
                keep_alive_secs: 60,
                reconnect_period_ms: 1000,
                connect_timeout_ms: 30_000,
                publish_timeout_ms: 10_000,
                clean_session: true,
            },
            consumer: ConsumerSettings {
                broker_url: None,
                capacity: 50,
            },
            display: DisplaySettings {
                public_host: "localhost".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fill every missing value in `partial` from the defaults.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Self::default();
        let server = partial.server;
        let broker = partial.broker;
        let consumer = partial.consumer;
        let display = partial.display;

        Self {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                url: broker
                    .as_ref()
                    .and_then(|b| b.url.clone())
                    .unwrap_or(default.broker.url),
                keep_alive_secs: broker
                    .as_ref()
                    .and_then(|b| b.keep_alive_secs)
                    .unwrap_or(default.broker.keep_alive_secs),
                reconnect_period_ms: broker
                    .as_ref()
                    .and_then(|b| b.reconnect_period_ms)
                    .unwrap_or(default.broker.reconnect_period_ms),
                connect_timeout_ms: broker
                    .as_ref()
                    .and_then(|b| b.connect_timeout_ms)
                    .unwrap_or(default.broker.connect_timeout_ms),
                publish_timeout_ms: broker
                    .as_ref()
                    .and_then(|b| b.publish_timeout_ms)
                    .unwrap_or(default.broker.publish_timeout_ms),
                clean_session: broker
                    .as_ref()
                    .and_then(|b| b.clean_session)
                    .unwrap_or(default.broker.clean_session),
            },
            consumer: ConsumerSettings {
                broker_url: consumer
                    .as_ref()
                    .and_then(|c| c.broker_url.clone())
                    .or(default.consumer.broker_url),
                capacity: consumer
                    .as_ref()
                    .and_then(|c| c.capacity)
                    .unwrap_or(default.consumer.capacity),
            },
            display: DisplaySettings {
                public_host: display
                    .as_ref()
                    .and_then(|d| d.public_host.clone())
                    .unwrap_or(default.display.public_host),
            },
        }
    }

    /// `host:port` for the ingestion listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Broker URL for consumer sessions, falling back to the broker's
    /// WebSocket listener on the public host.
    pub fn consumer_broker_url(&self) -> String {
        self.consumer
            .broker_url
            .clone()
            .unwrap_or_else(|| format!("ws://{}:9001", self.display.public_host))
    }

    /// Where producers send messages.
    pub fn ingest_url(&self) -> String {
        format!(
            "http://{}:{}/update",
            self.display.public_host, self.server.port
        )
    }
}
