//! Network session lifecycle: connect, host/list/join, shutdown and
//! connection-health tracking.
//!
//! ```text
//! Uninitialized --initialize--> Initialized --host--> Hosting
//!                                          \--join--> Joined
//! any --shutdown--> Uninitialized
//! ```

use crate::queue::{InboundMessage, MessageQueue};
use crate::transport::{Connector, SessionInfo, Transport, TransportError};
use log::{debug, error, info, warn};
use shared::config::{
    CLIENT_IDENTIFIER, CONNECTION_TIMEOUT_DISCONNECT_MS, CONNECTION_TIMEOUT_WARNING_MS,
    PROTOCOL_VERSION,
};
use shared::{GameMessage, ProtocolError};
use thiserror::Error;

/// Successful sends between two progress log lines
const SEND_LOG_EVERY: u64 = 100;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("network already initialized")]
    AlreadyInitialized,
    #[error("network not initialized")]
    NotInitialized,
    #[error("already in session {0}")]
    AlreadyInSession(String),
    #[error("not in a session")]
    NotInSession,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initialized,
    Hosting,
    Joined,
}

/// Result of one connection-health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    /// Silent past the warning threshold; emitted once per silence
    Warning,
    /// Silent past the disconnect threshold; emitted once
    Lost,
}

pub struct NetworkSession {
    connector: Box<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    queue: MessageQueue,
    phase: SessionPhase,

    session_id: Option<String>,
    my_peer_id: Option<String>,
    host_peer_id: Option<String>,
    available_sessions: Vec<String>,

    last_message_received: u64,
    connection_warning_at: Option<u64>,
    connection_lost: bool,
    sends: u64,
}

impl NetworkSession {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            transport: None,
            queue: MessageQueue::new(),
            phase: SessionPhase::Uninitialized,
            session_id: None,
            my_peer_id: None,
            host_peer_id: None,
            available_sessions: Vec::new(),
            last_message_received: 0,
            connection_warning_at: None,
            connection_lost: false,
            sends: 0,
        }
    }

    pub fn initialize(&mut self, host: &str, port: u16, now: u64) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Uninitialized {
            return Err(SessionError::AlreadyInitialized);
        }

        let mut transport = self.connector.connect(host, port)?;
        transport.listen(self.queue.callback());

        info!("Network initialized against {}:{}", host, port);
        self.transport = Some(transport);
        self.phase = SessionPhase::Initialized;
        self.last_message_received = now;
        self.connection_warning_at = None;
        self.connection_lost = false;
        Ok(())
    }

    fn ready_transport(&mut self) -> Result<&mut Box<dyn Transport>, SessionError> {
        match self.phase {
            SessionPhase::Uninitialized => return Err(SessionError::NotInitialized),
            SessionPhase::Hosting | SessionPhase::Joined => {
                let id = self.session_id.clone().unwrap_or_default();
                return Err(SessionError::AlreadyInSession(id));
            }
            SessionPhase::Initialized => {}
        }
        self.transport.as_mut().ok_or(SessionError::NotInitialized)
    }

    /// Opens a session with this peer as host and time authority
    pub fn host_session(&mut self, now: u64) -> Result<SessionInfo, SessionError> {
        let info = self.ready_transport()?.host()?;

        info!(
            "Hosting session {} as {}",
            info.session_id, info.peer_id
        );
        self.session_id = Some(info.session_id.clone());
        self.my_peer_id = Some(info.peer_id.clone());
        self.host_peer_id = Some(info.peer_id.clone());
        self.queue.track_host(None);
        self.phase = SessionPhase::Hosting;
        self.last_message_received = now;
        Ok(info)
    }

    /// Refreshes the cached session directory
    pub fn list_sessions(&mut self) -> Result<&[String], SessionError> {
        let transport = self.transport.as_mut().ok_or(SessionError::NotInitialized)?;
        let sessions = transport.list()?;

        if sessions.is_empty() {
            info!("No public sessions available");
        } else {
            info!("{} session(s) available", sessions.len());
        }
        self.available_sessions = sessions;
        Ok(&self.available_sessions)
    }

    /// Joins as a client. The own slot is assigned later by the host's roster.
    pub fn join_session(
        &mut self,
        session_id: &str,
        name: &str,
        now: u64,
    ) -> Result<SessionInfo, SessionError> {
        let payload = serde_json::json!({
            "name": name,
            "client": CLIENT_IDENTIFIER,
            "version": PROTOCOL_VERSION,
        })
        .to_string();

        let info = self.ready_transport()?.join(session_id, &payload)?;
        if info.host_peer_id.is_empty() || info.host_peer_id == info.peer_id {
            return Err(TransportError::UnexpectedReply("join").into());
        }

        // Only the relay names the host; game messages never change it
        info!(
            "Joined session {} as {}, hosted by {}",
            info.session_id, info.peer_id, info.host_peer_id
        );
        self.session_id = Some(info.session_id.clone());
        self.my_peer_id = Some(info.peer_id.clone());
        self.host_peer_id = Some(info.host_peer_id.clone());
        self.queue.track_host(Some(info.host_peer_id.clone()));
        self.phase = SessionPhase::Joined;
        self.last_message_received = now;
        self.connection_warning_at = None;
        self.connection_lost = false;
        Ok(info)
    }

    /// Tears down the transport and forgets all session state. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.destroy();
            info!("Network shut down");
        }

        self.queue.clear();
        self.phase = SessionPhase::Uninitialized;
        self.session_id = None;
        self.my_peer_id = None;
        self.host_peer_id = None;
        self.available_sessions.clear();
        self.connection_warning_at = None;
        self.connection_lost = false;
        self.sends = 0;
    }

    /// Sends a typed message to every other member of the session
    pub fn send(&mut self, message: &GameMessage) -> Result<(), SessionError> {
        if !self.is_in_session() {
            return Err(SessionError::NotInSession);
        }
        let payload = message.encode()?;
        let transport = self.transport.as_mut().ok_or(SessionError::NotInitialized)?;
        transport.send_game_message(&payload)?;

        self.sends += 1;
        if self.sends % SEND_LOG_EVERY == 0 {
            debug!("Sent {} game messages", self.sends);
        }
        Ok(())
    }

    /// Sends and logs failures; for fire-and-forget broadcasts
    pub fn broadcast(&mut self, message: &GameMessage) {
        if let Err(e) = self.send(message) {
            warn!("Failed to send {}: {}", message.kind(), e);
        }
    }

    pub fn drain(&self) -> Vec<InboundMessage> {
        self.queue.drain()
    }

    pub fn record_activity(&mut self, now: u64) {
        self.last_message_received = now;
        if self.connection_warning_at.take().is_some() {
            info!("Connection recovered");
        }
    }

    /// Checks time since the last inbound message. Only members are
    /// monitored; a host waiting alone is never timed out.
    pub fn check_health(&mut self, now: u64) -> Health {
        if self.phase != SessionPhase::Joined || self.connection_lost {
            return Health::Ok;
        }

        let silent = now.saturating_sub(self.last_message_received);
        if silent >= CONNECTION_TIMEOUT_DISCONNECT_MS {
            error!("No messages for {} ms, connection lost", silent);
            self.connection_lost = true;
            return Health::Lost;
        }

        if silent >= CONNECTION_TIMEOUT_WARNING_MS && self.connection_warning_at.is_none() {
            warn!("No messages for {} ms", silent);
            self.connection_warning_at = Some(now);
            return Health::Warning;
        }

        Health::Ok
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != SessionPhase::Uninitialized
    }

    pub fn is_host(&self) -> bool {
        self.phase == SessionPhase::Hosting
    }

    pub fn is_client(&self) -> bool {
        self.phase == SessionPhase::Joined
    }

    pub fn is_in_session(&self) -> bool {
        matches!(self.phase, SessionPhase::Hosting | SessionPhase::Joined)
    }

    pub fn is_connection_lost(&self) -> bool {
        self.connection_lost
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn my_peer_id(&self) -> Option<&str> {
        self.my_peer_id.as_deref()
    }

    pub fn host_peer_id(&self) -> Option<&str> {
        self.host_peer_id.as_deref()
    }

    pub fn available_sessions(&self) -> &[String] {
        &self.available_sessions
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }
}

impl Drop for NetworkSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackHub;
    use crate::queue::MessageKind;

    fn session(hub: &LoopbackHub) -> NetworkSession {
        NetworkSession::new(Box::new(hub.connector()))
    }

    #[test]
    fn test_initialize_twice_fails() {
        let hub = LoopbackHub::new();
        let mut net = session(&hub);
        net.initialize("127.0.0.1", 9001, 0).unwrap();
        assert!(matches!(
            net.initialize("127.0.0.1", 9001, 0),
            Err(SessionError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_host_requires_initialize() {
        let hub = LoopbackHub::new();
        let mut net = session(&hub);
        assert!(matches!(net.host_session(0), Err(SessionError::NotInitialized)));
        assert_eq!(net.phase(), SessionPhase::Uninitialized);
    }

    #[test]
    fn test_host_and_join() {
        let hub = LoopbackHub::new();
        let mut host = session(&hub);
        let mut client = session(&hub);
        host.initialize("h", 1, 0).unwrap();
        client.initialize("h", 1, 0).unwrap();

        let hosted = host.host_session(0).unwrap();
        assert!(host.is_host());
        assert_eq!(host.host_peer_id(), Some(hosted.peer_id.as_str()));

        let listed = client.list_sessions().unwrap().to_vec();
        assert_eq!(listed, vec![hosted.session_id.clone()]);

        client.join_session(&hosted.session_id, "tester", 0).unwrap();
        assert!(client.is_client());
        assert_eq!(client.host_peer_id(), Some(hosted.peer_id.as_str()));
        assert!(matches!(
            client.host_session(0),
            Err(SessionError::AlreadyInSession(_))
        ));

        let joined = host.drain();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].kind, MessageKind::PlayerJoined);
        let payload: serde_json::Value =
            serde_json::from_str(joined[0].payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["name"], "tester");
        assert_eq!(payload["client"], CLIENT_IDENTIFIER);
        assert_eq!(payload["version"], PROTOCOL_VERSION);
    }

    #[test]
    fn test_join_rejected_keeps_state() {
        let hub = LoopbackHub::new();
        let mut client = session(&hub);
        client.initialize("h", 1, 0).unwrap();

        assert!(client.join_session("NOPE", "x", 0).is_err());
        assert_eq!(client.phase(), SessionPhase::Initialized);
        assert_eq!(client.session_id(), None);
    }

    #[test]
    fn test_shutdown_idempotent() {
        let hub = LoopbackHub::new();
        let mut host = session(&hub);
        host.initialize("h", 1, 0).unwrap();
        host.host_session(0).unwrap();

        host.shutdown();
        host.shutdown();
        assert_eq!(host.phase(), SessionPhase::Uninitialized);
        assert_eq!(host.session_id(), None);
        assert_eq!(hub.session_count(), 0);
        assert!(matches!(
            host.send(&GameMessage::PlayerInput {
                direction: shared::Direction::Up
            }),
            Err(SessionError::NotInSession)
        ));
    }

    #[test]
    fn test_health_warning_then_lost() {
        let hub = LoopbackHub::new();
        let mut host = session(&hub);
        let mut client = session(&hub);
        host.initialize("h", 1, 0).unwrap();
        client.initialize("h", 1, 0).unwrap();
        let id = host.host_session(0).unwrap().session_id;
        client.join_session(&id, "c", 1_000).unwrap();

        assert_eq!(client.check_health(2_000), Health::Ok);
        let warn_at = 1_000 + CONNECTION_TIMEOUT_WARNING_MS;
        assert_eq!(client.check_health(warn_at), Health::Warning);
        assert_eq!(client.check_health(warn_at + 1), Health::Ok);

        client.record_activity(warn_at + 2);
        assert_eq!(client.check_health(warn_at + 3), Health::Ok);

        let lost_at = warn_at + 2 + CONNECTION_TIMEOUT_DISCONNECT_MS;
        assert_eq!(client.check_health(lost_at), Health::Lost);
        assert!(client.is_connection_lost());
        assert_eq!(client.check_health(lost_at + 1), Health::Ok);

        // Hosts are not monitored
        assert_eq!(host.check_health(lost_at * 2), Health::Ok);
    }

    #[test]
    fn test_host_tracking_marks_host_departure() {
        let hub = LoopbackHub::new();
        let mut host = session(&hub);
        let mut client = session(&hub);
        host.initialize("h", 1, 0).unwrap();
        client.initialize("h", 1, 0).unwrap();
        let hosted = host.host_session(0).unwrap();
        client.join_session(&hosted.session_id, "c", 0).unwrap();
        assert_eq!(client.queue().tracked_host(), Some(hosted.peer_id.clone()));

        host.shutdown();

        let messages = client.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::HostDisconnected);
    }
}
