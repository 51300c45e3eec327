//! In-process relay for tests and local play without a relay process.
//!
//! Routing matches the `relay` crate: the host's departure closes the
//! session, joins are rejected for unknown or full sessions and game
//! payloads go to every other member. Events are delivered synchronously on
//! the sender's thread, after the hub lock is released.

use crate::transport::{
    Connector, EventCallback, SessionInfo, Transport, TransportError, TransportEvent, EVENT_GAME,
    EVENT_JOINED, EVENT_LEFT,
};
use log::{debug, info};
use shared::config::MAX_PLAYERS;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct PeerEntry {
    session: Option<String>,
    callback: Option<Arc<EventCallback>>,
}

#[derive(Default)]
struct HubState {
    next_peer: u64,
    next_session: u64,
    next_message: i64,
    peers: HashMap<String, PeerEntry>,
    /// Session id to members, host first
    sessions: HashMap<String, Vec<String>>,
}

struct Delivery {
    callback: Arc<EventCallback>,
    event: TransportEvent,
}

impl HubState {
    fn events_to(
        &mut self,
        recipients: &[String],
        event: &str,
        from: &str,
        payload: Option<&str>,
    ) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for recipient in recipients {
            let Some(callback) = self.peers.get(recipient).and_then(|p| p.callback.clone()) else {
                continue;
            };
            self.next_message += 1;
            deliveries.push(Delivery {
                callback,
                event: TransportEvent {
                    event: event.to_string(),
                    message_id: self.next_message,
                    peer_id: Some(from.to_string()),
                    payload: payload.map(str::to_string),
                },
            });
        }
        deliveries
    }

    fn others(&self, session_id: &str, except: &str) -> Vec<String> {
        self.sessions
            .get(session_id)
            .map(|members| members.iter().filter(|m| *m != except).cloned().collect())
            .unwrap_or_default()
    }

    fn leave(&mut self, peer_id: &str) -> Vec<Delivery> {
        let Some(session_id) = self.peers.get_mut(peer_id).and_then(|p| p.session.take()) else {
            return Vec::new();
        };
        let Some(members) = self.sessions.get_mut(&session_id) else {
            return Vec::new();
        };

        let closed = members.first().map(String::as_str) == Some(peer_id);
        members.retain(|m| m != peer_id);
        let remaining = members.clone();

        if closed || remaining.is_empty() {
            info!("Loopback session {} closed", session_id);
            self.sessions.remove(&session_id);
            for member in &remaining {
                if let Some(peer) = self.peers.get_mut(member) {
                    peer.session = None;
                }
            }
        }

        self.events_to(&remaining, EVENT_LEFT, peer_id, None)
    }
}

fn deliver(deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        (delivery.callback)(delivery.event);
    }
}

/// Shared routing state; clone freely
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn open(&self) -> LoopbackTransport {
        let mut state = self.lock();
        state.next_peer += 1;
        let peer_id = format!("peer-{}", state.next_peer);
        state.peers.insert(peer_id.clone(), PeerEntry::default());
        debug!("Loopback peer {} opened", peer_id);

        LoopbackTransport {
            hub: self.clone(),
            peer_id,
            closed: false,
        }
    }

    pub fn connector(&self) -> LoopbackConnector {
        LoopbackConnector { hub: self.clone() }
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn members(&self, session_id: &str) -> Vec<String> {
        self.lock()
            .sessions
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

pub struct LoopbackTransport {
    hub: LoopbackHub,
    peer_id: String,
    closed: bool,
}

impl LoopbackTransport {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Transport for LoopbackTransport {
    fn host(&mut self) -> Result<SessionInfo, TransportError> {
        self.ensure_open()?;

        let (deliveries, session_id) = {
            let mut state = self.hub.lock();
            let deliveries = state.leave(&self.peer_id);

            state.next_session += 1;
            let session_id = format!("LOOP{:02}", state.next_session);
            state
                .sessions
                .insert(session_id.clone(), vec![self.peer_id.clone()]);
            if let Some(peer) = state.peers.get_mut(&self.peer_id) {
                peer.session = Some(session_id.clone());
            }
            (deliveries, session_id)
        };
        deliver(deliveries);

        Ok(SessionInfo {
            session_id,
            peer_id: self.peer_id.clone(),
            host_peer_id: self.peer_id.clone(),
        })
    }

    fn list(&mut self) -> Result<Vec<String>, TransportError> {
        self.ensure_open()?;
        let mut ids: Vec<String> = self.hub.lock().sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn join(&mut self, session_id: &str, payload: &str) -> Result<SessionInfo, TransportError> {
        self.ensure_open()?;

        let (deliveries, host_peer_id) = {
            let mut state = self.hub.lock();
            let members = state
                .sessions
                .get(session_id)
                .ok_or_else(|| TransportError::Rejected("unknown session".to_string()))?;
            let host_peer_id = members.first().cloned().unwrap_or_default();

            if !members.iter().any(|m| *m == self.peer_id) {
                if members.len() >= MAX_PLAYERS {
                    return Err(TransportError::Rejected("session full".to_string()));
                }
                let mut deliveries = state.leave(&self.peer_id);
                if let Some(members) = state.sessions.get_mut(session_id) {
                    members.push(self.peer_id.clone());
                }
                if let Some(peer) = state.peers.get_mut(&self.peer_id) {
                    peer.session = Some(session_id.to_string());
                }
                let others = state.others(session_id, &self.peer_id);
                deliveries.extend(state.events_to(
                    &others,
                    EVENT_JOINED,
                    &self.peer_id,
                    Some(payload),
                ));
                (deliveries, host_peer_id)
            } else {
                (Vec::new(), host_peer_id)
            }
        };
        deliver(deliveries);

        Ok(SessionInfo {
            session_id: session_id.to_string(),
            peer_id: self.peer_id.clone(),
            host_peer_id,
        })
    }

    fn send_game_message(&mut self, payload: &str) -> Result<(), TransportError> {
        self.ensure_open()?;

        let deliveries = {
            let mut state = self.hub.lock();
            let Some(session_id) = state.peers.get(&self.peer_id).and_then(|p| p.session.clone())
            else {
                debug!("Dropping game payload from {} outside a session", self.peer_id);
                return Ok(());
            };
            let others = state.others(&session_id, &self.peer_id);
            state.events_to(&others, EVENT_GAME, &self.peer_id, Some(payload))
        };
        deliver(deliveries);
        Ok(())
    }

    fn listen(&mut self, callback: EventCallback) {
        let mut state = self.hub.lock();
        if let Some(peer) = state.peers.get_mut(&self.peer_id) {
            peer.callback = Some(Arc::new(callback));
        }
    }

    fn destroy(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let deliveries = {
            let mut state = self.hub.lock();
            let deliveries = state.leave(&self.peer_id);
            state.peers.remove(&self.peer_id);
            deliveries
        };
        deliver(deliveries);
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Opens [`LoopbackTransport`]s on a shared hub, ignoring host and port
#[derive(Clone)]
pub struct LoopbackConnector {
    hub: LoopbackHub,
}

impl Connector for LoopbackConnector {
    fn connect(&self, _host: &str, _port: u16) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(self.hub.open()))
    }
}
