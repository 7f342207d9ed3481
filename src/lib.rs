//! # latency-relay
//!
//! `latency-relay` carries short text messages from producers to every
//! connected consumer through an external publish/subscribe broker, stamping
//! each message on the way so consumers can measure end-to-end latency.
//!
//! ## Core Modules
//!
//! - `broker`: the single connection to the broker, with publish, subscribe
//!   and automatic reconnection.
//! - `config`: loading settings from files and the environment.
//! - `envelope`: the timestamped message exchanged end-to-end, and latency
//!   formatting.
//! - `ingest`: the HTTP service producers post messages to.
//! - `session`: consumer sessions that subscribe, measure latency and keep
//!   a bounded history.
//! - `utils`: error type and logging.

pub mod broker;
pub mod config;
pub mod envelope;
pub mod ingest;
pub mod session;
pub mod utils;
