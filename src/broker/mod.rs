//! Broker client adapter
//!
//! The broker itself is an external publish/subscribe server. This module
//! owns the single connection to it and exposes a narrow surface:
//!
//! - `BrokerClient::connect` starts a background connection task and returns
//!   a cloneable handle immediately
//! - `publish` hands one payload to the connection and fails fast with
//!   `BrokerUnavailable` while disconnected
//! - `subscribe` returns a `Subscription` stream of raw payloads for a topic
//!
//! Reconnection is automatic: on a failed attempt or a dropped socket the
//! task reports `Disconnected`, waits the reconnect period and tries again.

pub mod client;
pub mod message;
pub mod options;
pub mod publisher;
pub mod state;
pub mod subscription;

pub use client::BrokerClient;
pub use options::BrokerOptions;
pub use publisher::Publisher;
pub use state::{ConnectionState, ConnectionStatus};
pub use subscription::Subscription;
