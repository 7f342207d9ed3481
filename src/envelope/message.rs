//! Message envelope
//!
//! `Envelope` is the JSON payload published on the broker topic. Keys are
//! camelCase on the wire:
//! `{"body","sender","clientSentAt","serverReceivedAt","topic"}`.
//!
//! - `client_sent_at`: set by the producer before transmission
//! - `server_received_at`: set by the ingestion service when it accepts the
//!   request; never modified afterwards
//!
//! Receipt time and latency are not part of the envelope; each consumer
//! derives them on arrival.

use serde::{Deserialize, Serialize};

use crate::utils::RelayError;

/// The single topic every producer publishes to and every consumer reads.
pub const TOPIC: &str = "updates";

/// Label used when the producer does not name itself.
pub const ANONYMOUS_SENDER: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub body: String,
    #[serde(default = "anonymous")]
    pub sender: String,
    pub client_sent_at: i64,
    pub server_received_at: i64,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn anonymous() -> String {
    ANONYMOUS_SENDER.to_string()
}

fn default_topic() -> String {
    TOPIC.to_string()
}

impl Envelope {
    /// Encode as the UTF-8 JSON payload carried by the broker.
    pub fn to_payload(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a broker payload. Anything that is not a well-formed envelope
    /// is a `Deserialization` error.
    pub fn from_payload(payload: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(payload)?)
    }
}
