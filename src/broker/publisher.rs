use async_trait::async_trait;

use crate::broker::{BrokerClient, ConnectionState};
use crate::utils::RelayError;

/// The publishing half of the broker connection, as seen by the ingestion
/// service.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), RelayError>;

    fn connection_state(&self) -> ConnectionState;
}

#[async_trait]
impl Publisher for BrokerClient {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), RelayError> {
        BrokerClient::publish(self, topic, payload).await
    }

    fn connection_state(&self) -> ConnectionState {
        self.state()
    }
}
