//! Session directory: which peers belong to which hosted session.

use crate::peer_manager::random_id;
use log::info;
use shared::config::MAX_PLAYERS;
use std::collections::HashMap;

const SESSION_ID_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRejection {
    UnknownSession,
    SessionFull,
}

impl JoinRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            JoinRejection::UnknownSession => "unknown session",
            JoinRejection::SessionFull => "session full",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelaySession {
    pub id: String,
    pub host: String,
    /// Host first, then joiners in arrival order
    pub members: Vec<String>,
}

/// Result of a peer leaving a session
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Departure {
    /// Members still to be told about the departure
    pub remaining: Vec<String>,
    /// The host left, so the session no longer exists
    pub closed: bool,
}

#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: HashMap<String, RelaySession>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session hosted by `host` and returns its id
    pub fn create(&mut self, host: &str) -> String {
        let mut id = random_id(SESSION_ID_LEN).to_uppercase();
        while self.sessions.contains_key(&id) {
            id = random_id(SESSION_ID_LEN).to_uppercase();
        }

        info!("Session {} hosted by {}", id, host);
        self.sessions.insert(
            id.clone(),
            RelaySession {
                id: id.clone(),
                host: host.to_string(),
                members: vec![host.to_string()],
            },
        );
        id
    }

    pub fn join(&mut self, session_id: &str, peer_id: &str) -> Result<(), JoinRejection> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or(JoinRejection::UnknownSession)?;

        if session.members.iter().any(|m| m == peer_id) {
            return Ok(());
        }
        if session.members.len() >= MAX_PLAYERS {
            return Err(JoinRejection::SessionFull);
        }

        info!("Peer {} joined session {}", peer_id, session_id);
        session.members.push(peer_id.to_string());
        Ok(())
    }

    pub fn leave(&mut self, session_id: &str, peer_id: &str) -> Departure {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return Departure::default();
        };

        session.members.retain(|m| m != peer_id);
        let remaining = session.members.clone();
        let closed = session.host == peer_id || remaining.is_empty();

        if closed {
            info!("Session {} closed", session_id);
            self.sessions.remove(session_id);
        }

        Departure { remaining, closed }
    }

    /// Members of `session_id` other than `except`
    pub fn others(&self, session_id: &str, except: &str) -> Vec<String> {
        self.sessions
            .get(session_id)
            .map(|session| {
                session
                    .members
                    .iter()
                    .filter(|m| *m != except)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get(&self, session_id: &str) -> Option<&RelaySession> {
        self.sessions.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list() {
        let mut directory = SessionDirectory::new();
        let a = directory.create("host-a");
        let b = directory.create("host-b");

        assert_eq!(a.len(), SESSION_ID_LEN);
        assert_ne!(a, b);
        let listed = directory.list();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&a) && listed.contains(&b));
        assert_eq!(directory.get(&a).unwrap().members, vec!["host-a".to_string()]);
    }

    #[test]
    fn test_join_rejections() {
        let mut directory = SessionDirectory::new();
        assert_eq!(
            directory.join("NOPE", "p1"),
            Err(JoinRejection::UnknownSession)
        );

        let id = directory.create("host");
        for i in 1..MAX_PLAYERS {
            assert!(directory.join(&id, &format!("p{}", i)).is_ok());
        }
        assert_eq!(directory.join(&id, "late"), Err(JoinRejection::SessionFull));
        // Rejoining is not a second seat
        assert!(directory.join(&id, "p1").is_ok());
    }

    #[test]
    fn test_others_excludes_sender() {
        let mut directory = SessionDirectory::new();
        let id = directory.create("host");
        directory.join(&id, "p1").unwrap();
        directory.join(&id, "p2").unwrap();

        assert_eq!(directory.others(&id, "p1"), vec!["host".to_string(), "p2".to_string()]);
        assert!(directory.others("missing", "p1").is_empty());
    }

    #[test]
    fn test_client_leave_keeps_session() {
        let mut directory = SessionDirectory::new();
        let id = directory.create("host");
        directory.join(&id, "p1").unwrap();

        let departure = directory.leave(&id, "p1");
        assert!(!departure.closed);
        assert_eq!(departure.remaining, vec!["host".to_string()]);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_host_leave_closes_session() {
        let mut directory = SessionDirectory::new();
        let id = directory.create("host");
        directory.join(&id, "p1").unwrap();

        let departure = directory.leave(&id, "host");
        assert!(departure.closed);
        assert_eq!(departure.remaining, vec!["p1".to_string()]);
        assert!(directory.is_empty());
    }
}
