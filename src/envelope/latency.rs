use std::fmt;

use chrono::{Local, TimeZone};

/// Consumer-observed delay between the producer's send time and local
/// receipt, in milliseconds.
///
/// Clock skew can make this negative; it is kept as observed and rendered as
/// `<1ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Latency(pub i64);

impl Latency {
    /// Saturates instead of overflowing; the send time is producer input.
    pub fn between(client_sent_at: i64, client_received_at: i64) -> Self {
        Self(client_received_at.saturating_sub(client_sent_at))
    }

    pub fn millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ms if ms < 1 => write!(f, "<1ms"),
            ms if ms < 1000 => write!(f, "{ms}ms"),
            ms => write!(f, "{:.2}s", ms as f64 / 1000.0),
        }
    }
}

/// `3:04:05.123 PM` in local time.
pub fn format_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%-I:%M:%S%.3f %p").to_string(),
        None => timestamp_ms.to_string(),
    }
}

/// `Oct 17` in local time.
pub fn format_date(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%b %-d").to_string(),
        None => timestamp_ms.to_string(),
    }
}
