use std::time::Duration;

use crate::config::BrokerSettings;

/// Connection tuning for a `BrokerClient`.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Interval between WebSocket pings. Two intervals without inbound
    /// traffic count as a dropped connection. Zero turns keep-alive off.
    pub keep_alive: Duration,
    /// Delay before the next connect attempt after a failure or drop.
    pub reconnect_period: Duration,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Upper bound on how long `publish` waits for the frame to be written.
    pub publish_timeout: Duration,
    /// The broker keeps no subscription state between connections; live
    /// subscriptions are re-issued after every reconnect. When false the
    /// broker is trusted to remember what it was already sent.
    pub clean_session: bool,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(60),
            reconnect_period: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(30_000),
            publish_timeout: Duration::from_millis(10_000),
            clean_session: true,
        }
    }
}

impl From<&BrokerSettings> for BrokerOptions {
    fn from(settings: &BrokerSettings) -> Self {
        Self {
            keep_alive: Duration::from_secs(settings.keep_alive_secs),
            reconnect_period: Duration::from_millis(settings.reconnect_period_ms),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            publish_timeout: Duration::from_millis(settings.publish_timeout_ms),
            clean_session: settings.clean_session,
        }
    }
}
