use crate::broker::{ConnectionState, ConnectionStatus};
use crate::envelope::Envelope;
use crate::session::{Received, ReceivedBuffer, SessionEvent};
use crate::utils::RelayError;

/// Everything a session knows: its buffer and whether its broker
/// connection is currently up.
#[derive(Debug, Clone)]
pub struct SessionState {
    buffer: ReceivedBuffer,
    connected: bool,
    epoch: u64,
}

impl SessionState {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: ReceivedBuffer::new(capacity),
            connected: false,
            epoch: 0,
        }
    }

    pub fn buffer(&self) -> &ReceivedBuffer {
        &self.buffer
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Decode `payload` and record it as received at `received_at`.
    ///
    /// A malformed payload leaves the buffer untouched.
    pub fn receive(&mut self, payload: &str, received_at: i64) -> Result<Received, RelayError> {
        let envelope = Envelope::from_payload(payload)?;
        let entry = Received::new(envelope, received_at);
        self.buffer.push(entry.clone());
        Ok(entry)
    }

    /// Follow the broker connection. A `Connected` status from a newer
    /// connection than the one already seen counts as a disconnect followed
    /// by a connect, even if the states in between were never observed.
    pub fn observe(&mut self, status: ConnectionStatus) -> Vec<SessionEvent> {
        let connected = status.state == ConnectionState::Connected;
        let mut events = Vec::new();
        if connected && status.epoch != self.epoch {
            self.epoch = status.epoch;
            events.extend(self.set_connected(false));
        }
        events.extend(self.set_connected(connected));
        events
    }

    /// Record the connection status. Returns the event to announce when the
    /// status actually changed. Losing the connection discards the buffer.
    pub fn set_connected(&mut self, connected: bool) -> Option<SessionEvent> {
        if self.connected == connected {
            return None;
        }
        self.connected = connected;
        if connected {
            Some(SessionEvent::Connected)
        } else {
            self.buffer.clear();
            Some(SessionEvent::Disconnected)
        }
    }
}
