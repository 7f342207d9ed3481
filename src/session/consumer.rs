use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::{BrokerClient, BrokerOptions, ConnectionState, ConnectionStatus, Subscription};
use crate::envelope::{TOPIC, now_millis};
use crate::session::{Received, SessionState};
use crate::utils::RelayError;

const EVENT_CAPACITY: usize = 256;

/// Notifications published by a session as things happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Received(Received),
}

/// One consumer's subscription to the relay topic.
///
/// Dropping the session stops it; `close` does the same and waits until the
/// subscription is removed and the broker connection is closed.
#[derive(Debug)]
pub struct ConsumerSession {
    id: Uuid,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ConsumerSession {
    /// Open a dedicated broker connection to `url` and subscribe to the
    /// relay topic.
    pub fn connect(
        url: impl Into<String>,
        options: BrokerOptions,
        capacity: usize,
    ) -> Result<Self, RelayError> {
        let client = BrokerClient::connect(url, options);
        Self::start(client, TOPIC, capacity)
    }

    /// Run a session on an existing client. The session takes ownership of
    /// the connection and shuts it down when it stops.
    pub fn start(client: BrokerClient, topic: &str, capacity: usize) -> Result<Self, RelayError> {
        let id = Uuid::new_v4();
        let subscription = client.subscribe(topic)?;
        let state = Arc::new(Mutex::new(SessionState::new(capacity)));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            id,
            status: client.watch_status(),
            client,
            state: state.clone(),
            events: events.clone(),
        };
        let task = tokio::spawn(worker.run(subscription, shutdown_rx));

        info!(session = %id, %topic, "Consumer session started");

        Ok(Self {
            id,
            state,
            events,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).is_connected()
    }

    /// Copy of the buffer, newest first.
    pub fn snapshot(&self) -> Vec<Received> {
        lock(&self.state).buffer().to_vec()
    }

    /// Subscribe to this session's events. Only events that happen after
    /// the call are delivered.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the session, unsubscribe and close its broker connection.
    pub async fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ConsumerSession {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Worker {
    id: Uuid,
    client: BrokerClient,
    status: watch::Receiver<ConnectionStatus>,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Worker {
    async fn run(mut self, mut subscription: Subscription, mut shutdown: oneshot::Receiver<()>) {
        let initial = *self.status.borrow_and_update();
        self.observe(initial);

        loop {
            // Status changes first: a payload is only routed after the
            // connection that carried it was announced.
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                changed = self.status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *self.status.borrow_and_update();
                    self.observe(current);
                }
                payload = subscription.recv() => match payload {
                    Some(payload) => self.deliver(&payload),
                    None => break,
                },
            }
        }

        drop(subscription);
        self.client.shutdown().await;
        let epoch = self.status.borrow().epoch;
        self.observe(ConnectionStatus {
            state: ConnectionState::Closed,
            epoch,
        });
        info!(session = %self.id, "Consumer session closed");
    }

    fn observe(&self, current: ConnectionStatus) {
        let events = lock(&self.state).observe(current);
        for event in events {
            if event == SessionEvent::Connected {
                info!(session = %self.id, epoch = current.epoch, "Session connected");
            } else {
                warn!(session = %self.id, state = %current.state, "Session disconnected");
            }
            let _ = self.events.send(event);
        }
    }

    fn deliver(&self, payload: &str) {
        let received_at = now_millis();
        let result = lock(&self.state).receive(payload, received_at);
        match result {
            Ok(entry) => {
                debug!(
                    session = %self.id,
                    sender = %entry.envelope.sender,
                    latency = %entry.latency,
                    "Envelope received"
                );
                let _ = self.events.send(SessionEvent::Received(entry));
            }
            Err(e) => warn!(
                session = %self.id,
                error = %e,
                payload = %payload.chars().take(100).collect::<String>(),
                "Dropping malformed payload"
            ),
        }
    }
}
