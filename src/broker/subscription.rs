use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::broker::client::Command;

/// A live subscription to one topic.
///
/// Yields raw payloads in delivery order. The stream stays open across
/// reconnects and ends only when the client shuts down. Dropping it removes
/// the subscription; the broker is told to unsubscribe once no local
/// subscription to the topic is left.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    id: Uuid,
    rx: mpsc::UnboundedReceiver<String>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub(crate) fn new(
        topic: String,
        id: Uuid,
        rx: mpsc::UnboundedReceiver<String>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            topic,
            id,
            rx,
            commands,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next payload. `None` once the client has shut down.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unsubscribe {
            topic: std::mem::take(&mut self.topic),
            id: self.id,
        });
    }
}
