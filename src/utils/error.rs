//! Error taxonomy for the relay.
//!
//! Ingestion-side errors are returned to the HTTP caller. Subscriber-side
//! errors (`Deserialization`) are logged and absorbed by the consumer session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The producer's payload was rejected before reaching the broker.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Connect, publish or subscribe could not be carried out against the broker.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// A payload received from the broker is not a valid envelope.
    #[error("malformed payload: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl RelayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BrokerUnavailable(msg.into())
    }
}
