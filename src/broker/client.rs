//! Broker connection task
//!
//! `BrokerClient` is a cheap, cloneable handle. All socket I/O happens in a
//! single background task that owns the WebSocket; handles talk to it over
//! an unbounded command queue, so concurrent publishers never touch the
//! socket directly and frames are written one at a time.
//!
//! Connection loop:
//! 1. `Connecting`: one attempt bounded by `connect_timeout`
//! 2. `Connected`: bring the broker's subscriptions in line with the local
//!    ones, then pump commands, inbound frames and keep-alive pings
//! 3. on failure or drop: `Disconnected`, wait `reconnect_period`, go to 1
//!
//! While not connected, publish commands are answered with
//! `BrokerUnavailable` and subscription changes are only recorded locally.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Interval, interval, sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::broker::message::{ClientFrame, ServerFrame};
use crate::broker::{BrokerOptions, ConnectionState, ConnectionStatus, Subscription};
use crate::utils::RelayError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

#[derive(Debug)]
pub(crate) enum Command {
    Publish {
        topic: String,
        payload: String,
        ack: oneshot::Sender<Result<(), RelayError>>,
    },
    Subscribe {
        topic: String,
        id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    },
    Unsubscribe {
        topic: String,
        id: Uuid,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone)]
pub struct BrokerClient {
    url: String,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    publish_timeout: Duration,
}

impl BrokerClient {
    /// Start connecting to `url` in the background and return a handle.
    ///
    /// Must be called from within a tokio runtime. The returned handle starts
    /// out `Disconnected`; watch `state()` to learn when it is usable.
    pub fn connect(url: impl Into<String>, options: BrokerOptions) -> Self {
        let url = url.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        let publish_timeout = options.publish_timeout;
        let connection = Connection::new(url.clone(), options, rx, status_tx);
        tokio::spawn(connection.run());

        Self {
            url,
            commands: tx,
            status: status_rx,
            publish_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// A receiver notified on every state transition. Watchers may miss
    /// intermediate states; compare `epoch` to spot a reconnect.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Wait until the connection reaches `target`. Returns `false` if it did
    /// not happen within `within`.
    pub async fn wait_for_state(&self, target: ConnectionState, within: Duration) -> bool {
        let mut rx = self.status.clone();
        matches!(
            timeout(within, rx.wait_for(|s| s.state == target)).await,
            Ok(Ok(_))
        )
    }

    /// Publish one payload on `topic` (at-most-once).
    ///
    /// Resolves once the frame has been written to the broker socket. There
    /// is no delivery acknowledgement and no retry.
    pub async fn publish(&self, topic: &str, payload: String) -> Result<(), RelayError> {
        if !self.is_connected() {
            return Err(RelayError::unavailable(format!(
                "not connected to {} ({})",
                self.url,
                self.state()
            )));
        }

        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Publish {
                topic: topic.to_string(),
                payload,
                ack,
            })
            .map_err(|_| RelayError::unavailable("broker client is shut down"))?;

        match timeout(self.publish_timeout, done).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RelayError::unavailable(
                "connection closed before the publish completed",
            )),
            Err(_) => Err(RelayError::unavailable(format!(
                "publish timed out after {}ms",
                self.publish_timeout.as_millis()
            ))),
        }
    }

    /// Subscribe to `topic`.
    ///
    /// Works in any state: while disconnected the subscription is recorded
    /// and sent to the broker once a connection is established.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription, RelayError> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.commands
            .send(Command::Subscribe {
                topic: topic.to_string(),
                id,
                sender: tx,
            })
            .map_err(|_| RelayError::unavailable("broker client is shut down"))?;
        Ok(Subscription::new(
            topic.to_string(),
            id,
            rx,
            self.commands.clone(),
        ))
    }

    /// Close the connection for good. Subscriptions end and the state
    /// becomes `Closed`.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done: done_tx }).is_ok() {
            let _ = done_rx.await;
        }
    }
}

enum Exit {
    Dropped(String),
    Shutdown(Option<oneshot::Sender<()>>),
}

pub(super) struct Connection {
    url: String,
    options: BrokerOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ConnectionStatus>,
    routes: HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<String>>>,
    /// Topics the broker currently holds for this client.
    subscribed: HashSet<String>,
}

impl Connection {
    pub(super) fn new(
        url: String,
        options: BrokerOptions,
        commands: mpsc::UnboundedReceiver<Command>,
        status: watch::Sender<ConnectionStatus>,
    ) -> Self {
        Self {
            url,
            options,
            commands,
            status,
            routes: HashMap::new(),
            subscribed: HashSet::new(),
        }
    }

    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);

            let exit = match self.establish().await {
                Ok(ws) => {
                    self.set_state(ConnectionState::Connected);
                    self.serve(ws).await
                }
                Err(exit) => exit,
            };

            match exit {
                Exit::Shutdown(done) => {
                    self.close(done);
                    return;
                }
                Exit::Dropped(reason) => {
                    warn!(url = %self.url, %reason, "Broker connection lost");
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            if let Some(Exit::Shutdown(done)) = self.backoff().await {
                self.close(done);
                return;
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let mut previous = state;
        self.status.send_modify(|status| {
            previous = status.state;
            if state == ConnectionState::Connected {
                status.epoch += 1;
            }
            status.state = state;
        });
        if previous != state {
            info!(url = %self.url, from = %previous, to = %state, "Broker connection state changed");
        }
    }

    fn close(&mut self, done: Option<oneshot::Sender<()>>) {
        self.commands.close();
        self.routes.clear();
        self.subscribed.clear();
        self.set_state(ConnectionState::Closed);
        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    /// One connect attempt, still answering commands while it is pending.
    async fn establish(&mut self) -> Result<WsStream, Exit> {
        let connect_timeout = self.options.connect_timeout;
        let attempt = timeout(connect_timeout, connect_async(self.url.clone()));
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                res = &mut attempt => {
                    return match res {
                        Ok(Ok((ws, _response))) => Ok(ws),
                        Ok(Err(e)) => Err(Exit::Dropped(format!("connect failed: {e}"))),
                        Err(_) => Err(Exit::Dropped(format!(
                            "connect timed out after {}ms",
                            connect_timeout.as_millis()
                        ))),
                    };
                }
                cmd = self.commands.recv() => {
                    if let Some(exit) = self.handle_offline(cmd) {
                        return Err(exit);
                    }
                }
            }
        }
    }

    /// Sleep out the reconnect period, still answering commands.
    async fn backoff(&mut self) -> Option<Exit> {
        let delay = sleep(self.options.reconnect_period);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                () = &mut delay => return None,
                cmd = self.commands.recv() => {
                    if let Some(exit) = self.handle_offline(cmd) {
                        return Some(exit);
                    }
                }
            }
        }
    }

    fn handle_offline(&mut self, cmd: Option<Command>) -> Option<Exit> {
        match cmd {
            None => Some(Exit::Shutdown(None)),
            Some(Command::Shutdown { done }) => Some(Exit::Shutdown(Some(done))),
            Some(Command::Publish { ack, .. }) => {
                let _ = ack.send(Err(RelayError::unavailable(format!(
                    "not connected to {}",
                    self.url
                ))));
                None
            }
            Some(Command::Subscribe { topic, id, sender }) => {
                self.add_route(topic, id, sender);
                None
            }
            Some(Command::Unsubscribe { topic, id }) => {
                self.remove_route(&topic, id);
                None
            }
        }
    }

    async fn serve(&mut self, ws: WsStream) -> Exit {
        let (mut sink, mut stream) = ws.split();

        if self.options.clean_session {
            self.subscribed.clear();
        }
        if let Err(e) = self.sync_subscriptions(&mut sink).await {
            return Exit::Dropped(format!("resubscribe failed: {e}"));
        }

        // Zero disables keep-alive
        let mut keep_alive = (!self.options.keep_alive.is_zero())
            .then(|| interval(self.options.keep_alive));
        if let Some(ticker) = keep_alive.as_mut() {
            ticker.tick().await; // first tick is immediate
        }
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    None => {
                        let _ = sink.close().await;
                        return Exit::Shutdown(None);
                    }
                    Some(Command::Shutdown { done }) => {
                        let _ = sink.close().await;
                        return Exit::Shutdown(Some(done));
                    }
                    Some(Command::Publish { topic, payload, ack }) => {
                        let frame = ClientFrame::Publish { topic, payload, qos: 0 };
                        match send_frame(&mut sink, &frame).await {
                            Ok(()) => {
                                let _ = ack.send(Ok(()));
                            }
                            Err(e) => {
                                let _ = ack.send(Err(RelayError::unavailable(e.to_string())));
                                return Exit::Dropped(format!("publish failed: {e}"));
                            }
                        }
                    }
                    Some(Command::Subscribe { topic, id, sender }) => {
                        self.add_route(topic, id, sender);
                        if let Err(e) = self.sync_subscriptions(&mut sink).await {
                            return Exit::Dropped(format!("subscribe failed: {e}"));
                        }
                    }
                    Some(Command::Unsubscribe { topic, id }) => {
                        self.remove_route(&topic, id);
                        if let Err(e) = self.sync_subscriptions(&mut sink).await {
                            return Exit::Dropped(format!("unsubscribe failed: {e}"));
                        }
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(msg)) => {
                        last_seen = Instant::now();
                        self.handle_frame(msg);
                    }
                    Some(Err(e)) => return Exit::Dropped(format!("read failed: {e}")),
                    None => return Exit::Dropped("connection closed by broker".to_string()),
                },
                () = next_tick(&mut keep_alive) => {
                    if last_seen.elapsed() > self.options.keep_alive * 2 {
                        return Exit::Dropped("keep-alive timed out".to_string());
                    }
                    if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                        return Exit::Dropped(format!("ping failed: {e}"));
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, msg: WsMessage) {
        let WsMessage::Text(text) = msg else {
            return;
        };

        match serde_json::from_str::<ServerFrame>(text.as_str()) {
            Ok(ServerFrame::Message { topic, payload, .. }) => self.dispatch(&topic, payload),
            Ok(ServerFrame::Error { message }) => warn!(%message, "Broker reported an error"),
            Ok(ServerFrame::Other) => debug!("Ignoring broker frame"),
            Err(e) => warn!(
                error = %e,
                frame = %text.as_str().chars().take(100).collect::<String>(),
                "Unrecognised broker frame"
            ),
        }
    }

    /// Routes stay until their `Unsubscribe` arrives, even when the
    /// receiving end is already gone.
    pub(super) fn dispatch(&self, topic: &str, payload: String) {
        let Some(subscribers) = self.routes.get(topic) else {
            debug!(%topic, "No local subscribers");
            return;
        };
        for tx in subscribers.values() {
            let _ = tx.send(payload.clone());
        }
    }

    /// Send `subscribe` for local topics the broker lacks and `unsubscribe`
    /// for broker topics with no local subscriber left. A clean session
    /// starts every connection with nothing held by the broker.
    async fn sync_subscriptions(&mut self, sink: &mut WsSink) -> Result<(), RelayError> {
        let stale: Vec<String> = self
            .subscribed
            .iter()
            .filter(|topic| !self.routes.contains_key(*topic))
            .cloned()
            .collect();
        for topic in stale {
            send_frame(sink, &ClientFrame::Unsubscribe { topic: topic.clone() }).await?;
            debug!(%topic, "Unsubscribed");
            self.subscribed.remove(&topic);
        }

        let missing: Vec<String> = self
            .routes
            .keys()
            .filter(|topic| !self.subscribed.contains(*topic))
            .cloned()
            .collect();
        for topic in missing {
            send_frame(sink, &ClientFrame::Subscribe { topic: topic.clone() }).await?;
            debug!(%topic, "Subscribed");
            self.subscribed.insert(topic);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn routes(&self) -> &HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<String>>> {
        &self.routes
    }

    /// Returns true when this is the first local subscriber to `topic`.
    pub(super) fn add_route(
        &mut self,
        topic: String,
        id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    ) -> bool {
        let subscribers = self.routes.entry(topic).or_default();
        subscribers.insert(id, sender);
        subscribers.len() == 1
    }

    /// Returns true when the last local subscriber to `topic` went away.
    pub(super) fn remove_route(&mut self, topic: &str, id: Uuid) -> bool {
        let Some(subscribers) = self.routes.get_mut(topic) else {
            return false;
        };
        if subscribers.remove(&id).is_none() {
            return false;
        }
        if subscribers.is_empty() {
            self.routes.remove(topic);
            return true;
        }
        false
    }
}

async fn next_tick(keep_alive: &mut Option<Interval>) {
    match keep_alive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn send_frame(sink: &mut WsSink, frame: &ClientFrame) -> Result<(), RelayError> {
    let text = serde_json::to_string(frame)?;
    sink.send(WsMessage::text(text))
        .await
        .map_err(|e| RelayError::unavailable(e.to_string()))
}
