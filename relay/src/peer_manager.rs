//! Peer bookkeeping for the relay
//!
//! This module tracks every game process talking to the relay:
//! - Peer identity assignment keyed by datagram source address
//! - Session membership per peer
//! - Liveness tracking and timeout detection
//! - Capacity enforcement

use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const PEER_ID_LEN: usize = 8;

/// A game process known to the relay
#[derive(Debug)]
pub struct Peer {
    /// Identifier handed to the game process and used in events
    pub id: String,
    /// Source address replies and events are sent to
    pub addr: SocketAddr,
    /// Last time any datagram arrived from this peer
    pub last_seen: Instant,
    /// Session the peer currently belongs to
    pub session: Option<String>,
}

impl Peer {
    pub fn new(id: String, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            session: None,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// All peers currently known to the relay
pub struct PeerManager {
    peers: HashMap<String, Peer>,
    max_peers: usize,
}

impl PeerManager {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_peers,
        }
    }

    /// Returns the id of the peer at `addr`, registering it first if unknown.
    ///
    /// Refreshes the peer's liveness. Returns None when a new peer would
    /// exceed the relay's capacity.
    pub fn register(&mut self, addr: SocketAddr) -> Option<String> {
        if let Some(peer) = self.peers.values_mut().find(|peer| peer.addr == addr) {
            peer.last_seen = Instant::now();
            return Some(peer.id.clone());
        }

        if self.peers.len() >= self.max_peers {
            return None;
        }

        let mut id = random_id(PEER_ID_LEN);
        while self.peers.contains_key(&id) {
            id = random_id(PEER_ID_LEN);
        }

        info!("Peer {} registered from {}", id, addr);
        self.peers.insert(id.clone(), Peer::new(id.clone(), addr));
        Some(id)
    }

    /// Returns true if the peer was known
    pub fn remove(&mut self, peer_id: &str) -> bool {
        if let Some(peer) = self.peers.remove(peer_id) {
            info!("Peer {} removed", peer.id);
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<String> {
        self.peers
            .values()
            .find(|peer| peer.addr == addr)
            .map(|peer| peer.id.clone())
    }

    pub fn addr_of(&self, peer_id: &str) -> Option<SocketAddr> {
        self.peers.get(peer_id).map(|peer| peer.addr)
    }

    pub fn session_of(&self, peer_id: &str) -> Option<String> {
        self.peers.get(peer_id).and_then(|peer| peer.session.clone())
    }

    pub fn set_session(&mut self, peer_id: &str, session: Option<String>) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.session = session;
        }
    }

    /// Removes peers silent for longer than `timeout`
    ///
    /// Returns each removed peer with the session it was in so the caller
    /// can notify the remaining members.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<(String, Option<String>)> {
        let timed_out: Vec<String> = self
            .peers
            .values()
            .filter(|peer| peer.is_timed_out(timeout))
            .map(|peer| peer.id.clone())
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| {
                let peer = self.peers.remove(&id)?;
                info!("Peer {} timed out", id);
                Some((id, peer.session))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_register_is_idempotent_per_addr() {
        let mut manager = PeerManager::new(4);
        let first = manager.register(test_addr()).unwrap();
        let again = manager.register(test_addr()).unwrap();

        assert_eq!(first, again);
        assert_eq!(first.len(), PEER_ID_LEN);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_register_distinct_addrs() {
        let mut manager = PeerManager::new(4);
        let first = manager.register(test_addr()).unwrap();
        let second = manager.register(test_addr2()).unwrap();

        assert_ne!(first, second);
        assert_eq!(manager.find_by_addr(test_addr2()), Some(second.clone()));
        assert_eq!(manager.addr_of(&second), Some(test_addr2()));
    }

    #[test]
    fn test_register_capacity() {
        let mut manager = PeerManager::new(1);
        assert!(manager.register(test_addr()).is_some());
        assert!(manager.register(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_peer() {
        let mut manager = PeerManager::new(2);
        let id = manager.register(test_addr()).unwrap();

        assert!(manager.remove(&id));
        assert!(!manager.remove(&id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_session_membership() {
        let mut manager = PeerManager::new(2);
        let id = manager.register(test_addr()).unwrap();
        assert_eq!(manager.session_of(&id), None);

        manager.set_session(&id, Some("ABC123".to_string()));
        assert_eq!(manager.session_of(&id).as_deref(), Some("ABC123"));
    }

    #[test]
    fn test_peer_timeout() {
        let mut manager = PeerManager::new(2);
        let id = manager.register(test_addr()).unwrap();
        manager.set_session(&id, Some("S".to_string()));

        assert!(manager.check_timeouts(Duration::from_secs(1)).is_empty());

        if let Some(peer) = manager.peers.get_mut(&id) {
            peer.last_seen = Instant::now() - Duration::from_secs(2);
        }

        let removed = manager.check_timeouts(Duration::from_secs(1));
        assert_eq!(removed, vec![(id, Some("S".to_string()))]);
        assert!(manager.is_empty());
    }
}
