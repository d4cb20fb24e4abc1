//! In-process change feed. Every insert the app makes is published once on the
//! channel of its parent row; each websocket subscriber only forwards the
//! events of the channel it asked for.

use std::sync::Arc;

use axum::{extract::ws::{Message, WebSocket, WebSocketUpgrade}, response::Response};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Direct messages of a user, with their reactions and replies.
    Inbox(String),
    /// Messages of a room, with their reactions and replies.
    Room(String),
    Invitations(String),
}

/// DOM update sent to subscribers. `target` is an element id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    Prepend { target: String, html: String },
    Append { target: String, html: String },
    Replace { target: String, html: String },
}

#[derive(Debug)]
struct ChangeEvent {
    channel: Channel,
    patch: Patch,
}

#[derive(Clone)]
pub struct Feed {
    tx: broadcast::Sender<Arc<ChangeEvent>>,
}

impl Feed {
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Returns how many subscribers (of any channel) saw the event.
    pub fn publish(&self, channel: Channel, patch: Patch) -> usize {
        tracing::trace!(?channel, ?patch, "publish");
        self.tx
            .send(Arc::new(ChangeEvent { channel, patch }))
            .unwrap_or(0)
    }

    /// Open subscriptions across every channel.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn subscribe(&self, channel: Channel) -> Subscription {
        Subscription {
            channel,
            rx: self.tx.subscribe(),
        }
    }

    /// Upgrades to a websocket that streams the patches of `channel` as JSON
    /// until either side goes away.
    pub fn serve(&self, ws: WebSocketUpgrade, channel: Channel) -> Response {
        let subscription = self.subscribe(channel);
        ws.on_upgrade(move |socket| forward(socket, subscription))
    }
}

pub struct Subscription {
    channel: Channel,
    rx: broadcast::Receiver<Arc<ChangeEvent>>,
}

impl Subscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Next patch for this channel, `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<Patch> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.channel == self.channel => return Some(event.patch.clone()),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = ?self.channel, skipped, "feed subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

async fn forward(socket: WebSocket, mut subscription: Subscription) {
    tracing::debug!(channel = ?subscription.channel(), "feed subscribed");
    let (mut sender, mut receiver) = socket.split();

    let mut push_task = tokio::spawn(async move {
        while let Some(patch) = subscription.recv().await {
            let text = match serde_json::to_string(&patch) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("couldn't encode patch: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // subscribers don't talk back; this only notices the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut push_task => recv_task.abort(),
        _ = &mut recv_task => push_task.abort(),
    };
    tracing::debug!("feed unsubscribed");
}
