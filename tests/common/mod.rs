//! In-process stand-in for the external broker.
//!
//! Speaks the same JSON-over-WebSocket protocol as the real broker: clients
//! send `subscribe`/`unsubscribe`/`publish`, subscribers get `message`
//! frames. It keeps no state across connections, so it behaves like a broker
//! running with clean sessions. `stop` drops every socket at once, which
//! looks like a broker crash to connected clients.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use latency_relay::broker::BrokerOptions;
use latency_relay::broker::message::{ClientFrame, ServerFrame};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

type ClientId = Uuid;

#[derive(Default)]
struct Registry {
    topics: HashMap<String, HashSet<ClientId>>,
    clients: HashMap<ClientId, mpsc::UnboundedSender<WsMessage>>,
}

impl Registry {
    fn publish(&self, topic: &str, payload: &str) {
        let Some(subscribers) = self.topics.get(topic) else {
            return;
        };
        let frame = ServerFrame::Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        let text = serde_json::to_string(&frame).unwrap();
        for id in subscribers {
            if let Some(tx) = self.clients.get(id) {
                let _ = tx.send(WsMessage::text(text.clone()));
            }
        }
    }

    fn cleanup_client(&mut self, id: &ClientId) {
        self.clients.remove(id);
        for subscribers in self.topics.values_mut() {
            subscribers.remove(id);
        }
    }
}

pub struct TestBroker {
    addr: SocketAddr,
    registry: Arc<Mutex<Registry>>,
    accept: JoinHandle<()>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TestBroker {
    pub async fn start() -> Self {
        Self::bind("127.0.0.1:0".parse().unwrap()).await
    }

    /// Listen on `addr`; used to bring a stopped broker back on its old port.
    pub async fn bind(addr: SocketAddr) -> Self {
        let socket = TcpSocket::new_v4().unwrap();
        socket.set_reuseaddr(true).unwrap();
        socket.bind(addr).unwrap();
        let listener = socket.listen(64).unwrap();
        let addr = listener.local_addr().unwrap();

        let registry = Arc::new(Mutex::new(Registry::default()));
        let connections = Arc::new(Mutex::new(Vec::new()));

        let accept = {
            let registry = registry.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let handle = tokio::spawn(handle_connection(stream, registry.clone()));
                    connections.lock().unwrap().push(handle);
                }
            })
        };

        Self {
            addr,
            registry,
            accept,
            connections,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .lock()
            .unwrap()
            .topics
            .get(topic)
            .map_or(0, HashSet::len)
    }

    /// Wait until exactly `n` clients are subscribed to `topic`.
    pub async fn wait_for_subscribers(&self, topic: &str, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.subscriber_count(topic) != n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {n} subscribers on {topic}, have {}",
                self.subscriber_count(topic)
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Deliver a raw payload to every subscriber, as if some other client
    /// had published it.
    pub fn inject(&self, topic: &str, payload: &str) {
        self.registry.lock().unwrap().publish(topic, payload);
    }

    /// Drop the listener and every open connection.
    pub async fn stop(self) {
        self.accept.abort();
        let _ = self.accept.await;
        let handles: Vec<_> = self.connections.lock().unwrap().drain(..).collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
    }
}

async fn handle_connection(stream: TcpStream, registry: Arc<Mutex<Registry>>) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client_id = Uuid::new_v4();
    registry.lock().unwrap().clients.insert(client_id, tx);

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(msg) => {
                    if ws_sender.send(msg).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let mut registry = registry.lock().unwrap();
                    match serde_json::from_str::<ClientFrame>(text.as_str()) {
                        Ok(ClientFrame::Subscribe { topic }) => {
                            registry.topics.entry(topic).or_default().insert(client_id);
                        }
                        Ok(ClientFrame::Unsubscribe { topic }) => {
                            if let Some(subscribers) = registry.topics.get_mut(&topic) {
                                subscribers.remove(&client_id);
                            }
                        }
                        Ok(ClientFrame::Publish { topic, payload, .. }) => {
                            registry.publish(&topic, &payload);
                        }
                        Err(_) => {}
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }

    registry.lock().unwrap().cleanup_client(&client_id);
}

/// A broker that completes the WebSocket handshake and then goes quiet: it
/// never reads, so pings stay unanswered, and never sends anything.
pub struct SilentBroker {
    addr: SocketAddr,
    accept: JoinHandle<()>,
    held: Arc<Mutex<Vec<WebSocketStream<TcpStream>>>>,
}

impl SilentBroker {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let held = Arc::new(Mutex::new(Vec::new()));

        let accept = {
            let held = held.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    if let Ok(ws) = accept_async(stream).await {
                        held.lock().unwrap().push(ws);
                    }
                }
            })
        };

        Self { addr, accept, held }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Handshakes completed so far.
    pub fn accepted(&self) -> usize {
        self.held.lock().unwrap().len()
    }
}

impl Drop for SilentBroker {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

/// Options tuned so reconnect tests finish quickly.
pub fn fast_options() -> BrokerOptions {
    BrokerOptions {
        reconnect_period: Duration::from_millis(50),
        connect_timeout: Duration::from_secs(2),
        publish_timeout: Duration::from_secs(2),
        ..BrokerOptions::default()
    }
}
