//! Consumer sessions
//!
//! A `ConsumerSession` is one connected consumer: it owns its own broker
//! connection, subscribes to the relay topic and keeps the most recent
//! envelopes, newest first, together with the latency it observed for each.
//!
//! Sessions never reconnect by themselves. They watch the broker client's
//! state and mirror it in a `connected` flag; the buffer only lives as long
//! as one connection and is emptied when that connection is lost.

pub mod buffer;
pub mod consumer;
pub mod state;

pub use buffer::{DEFAULT_CAPACITY, Received, ReceivedBuffer};
pub use consumer::{ConsumerSession, SessionEvent};
pub use state::SessionState;
