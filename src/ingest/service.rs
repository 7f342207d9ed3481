use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::broker::{ConnectionState, Publisher};
use crate::envelope::{ANONYMOUS_SENDER, Envelope, TOPIC, now_millis};
use crate::utils::RelayError;

/// Body of `POST /update`.
///
/// Producers may send their send time as `timestamp` or `sentAt`; when both
/// are present `timestamp` wins.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub sent_at: Option<i64>,
}

impl SubmitRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct IngestService {
    publisher: Arc<dyn Publisher>,
    topic: String,
    started_at: i64,
}

impl IngestService {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            topic: TOPIC.to_string(),
            started_at: now_millis(),
        }
    }

    /// When this service was created, in epoch milliseconds.
    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn broker_state(&self) -> ConnectionState {
        self.publisher.connection_state()
    }

    /// Validate, stamp and publish one message.
    ///
    /// Returns the envelope that was handed to the broker. Empty messages are
    /// rejected before anything is published; broker failures are returned
    /// as `BrokerUnavailable` and not retried.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Envelope, RelayError> {
        let server_received_at = now_millis();

        let body = request.message.as_deref().map(str::trim).unwrap_or_default();
        if body.is_empty() {
            return Err(RelayError::validation("message must be a non-empty string"));
        }

        let client_sent_at = match request.timestamp.or(request.sent_at) {
            Some(ts) => ts,
            None => {
                debug!("No client timestamp, using server receipt time");
                server_received_at
            }
        };

        let sender = request
            .sender
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ANONYMOUS_SENDER.to_string());

        let envelope = Envelope {
            body: body.to_string(),
            sender,
            client_sent_at,
            server_received_at,
            topic: self.topic.clone(),
        };

        info!(sender = %envelope.sender, message = %envelope.body, "Received message");

        self.publisher
            .publish(&self.topic, envelope.to_payload()?)
            .await?;

        Ok(envelope)
    }
}
