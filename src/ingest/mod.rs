//! Ingestion service
//!
//! Accepts producer messages over HTTP, stamps them with the server receipt
//! time and publishes the resulting envelope on the relay topic. The HTTP
//! response only says the broker client accepted the publish; nothing here
//! waits for consumers.

pub mod http;
pub mod service;

pub use http::{build_router, serve};
pub use service::{IngestService, SubmitRequest};
