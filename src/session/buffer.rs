use std::collections::VecDeque;

use crate::envelope::{Envelope, Latency};

/// How many envelopes a session keeps for display.
pub const DEFAULT_CAPACITY: usize = 50;

/// An envelope as observed by one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub envelope: Envelope,
    pub client_received_at: i64,
    pub latency: Latency,
}

impl Received {
    pub fn new(envelope: Envelope, client_received_at: i64) -> Self {
        let latency = Latency::between(envelope.client_sent_at, client_received_at);
        Self {
            envelope,
            client_received_at,
            latency,
        }
    }
}

/// Sliding window of received envelopes, newest first. Pushing past
/// capacity drops the oldest entry.
#[derive(Debug, Clone)]
pub struct ReceivedBuffer {
    entries: VecDeque<Received>,
    capacity: usize,
}

impl Default for ReceivedBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ReceivedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: Received) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Received> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Received> {
        self.entries.iter().cloned().collect()
    }
}
