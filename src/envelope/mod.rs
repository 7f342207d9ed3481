//! The `envelope` module defines the unit exchanged end-to-end between the
//! ingestion service and consumer sessions, together with the clock and the
//! latency/time formatting used when displaying it.

pub mod latency;
pub mod message;

pub use latency::{Latency, format_date, format_time};
pub use message::{ANONYMOUS_SENDER, Envelope, TOPIC};

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests;
