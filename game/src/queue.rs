//! Inbound mailbox between the transport's thread and the game tick.
//!
//! The transport callback only copies the event into a [`InboundMessage`] and
//! pushes it; payloads are parsed later on the tick thread. The tracked host
//! id lives inside the same lock so host-loss detection on the callback
//! thread never touches game state.

use crate::transport::{EventCallback, TransportEvent, EVENT_GAME, EVENT_JOINED, EVENT_LEAVED, EVENT_LEFT};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    PlayerJoined,
    PlayerLeft,
    /// A `left` from the peer tracked as host, seen by a non-host
    HostDisconnected,
    GameData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub peer_id: String,
    pub payload: Option<String>,
    pub message_id: i64,
}

#[derive(Debug, Default)]
struct Inner {
    messages: VecDeque<InboundMessage>,
    host_peer: Option<String>,
}

/// Mutex-guarded FIFO; clones share the same queue
#[derive(Debug, Clone, Default)]
pub struct MessageQueue {
    inner: Arc<Mutex<Inner>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, message: InboundMessage) {
        self.lock().messages.push_back(message);
    }

    /// Takes every queued message in arrival order
    pub fn drain(&self) -> Vec<InboundMessage> {
        self.lock().messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.messages.clear();
        inner.host_peer = None;
    }

    /// Sets the peer whose departure counts as host loss; None as host
    pub fn track_host(&self, host_peer: Option<String>) {
        self.lock().host_peer = host_peer;
    }

    pub fn tracked_host(&self) -> Option<String> {
        self.lock().host_peer.clone()
    }

    /// Classifies a raw transport event and queues it
    pub fn ingest(&self, event: TransportEvent) {
        let Some(peer_id) = event.peer_id.filter(|id| !id.is_empty()) else {
            debug!("Dropping {} event without a peer id", event.event);
            return;
        };

        let mut inner = self.lock();
        let kind = match event.event.as_str() {
            EVENT_JOINED => MessageKind::PlayerJoined,
            EVENT_LEFT | EVENT_LEAVED => {
                if inner.host_peer.as_deref() == Some(peer_id.as_str()) {
                    MessageKind::HostDisconnected
                } else {
                    MessageKind::PlayerLeft
                }
            }
            EVENT_GAME => {
                if event.payload.is_none() {
                    debug!("Dropping game event from {} without payload", peer_id);
                    return;
                }
                MessageKind::GameData
            }
            other => {
                warn!("Unknown transport event '{}'", other);
                return;
            }
        };

        inner.messages.push_back(InboundMessage {
            kind,
            peer_id,
            payload: event.payload,
            message_id: event.message_id,
        });
    }

    /// Callback for [`crate::transport::Transport::listen`] feeding this queue
    pub fn callback(&self) -> EventCallback {
        let queue = self.clone();
        Box::new(move |event| queue.ingest(event))
    }
}
