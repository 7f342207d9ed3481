//! Broker wire protocol
//!
//! JSON text frames tagged by `type`. The adapter only ever sends
//! `subscribe`, `unsubscribe` and at-most-once `publish`; from the broker it
//! consumes `message` and `error` and ignores everything else.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },
    #[serde(rename = "publish")]
    Publish {
        topic: String,
        payload: String,
        qos: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        #[serde(default)]
        timestamp: i64,
    },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(other)]
    Other,
}
