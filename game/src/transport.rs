//! The session/messaging seam the network layer talks through.
//!
//! A [`Transport`] exposes the relay's primitive operations: host a session,
//! list sessions, join one, send an opaque game payload to the other members,
//! and register a callback for asynchronous events. Implementations invoke
//! the callback from a thread they own; see [`crate::queue`] for how those
//! events reach the game tick.

use thiserror::Error;

pub use shared::relay::{EVENT_GAME, EVENT_JOINED, EVENT_LEFT};

/// Alternate spelling of [`EVENT_LEFT`] some relays send
pub const EVENT_LEAVED: &str = "leaved";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode relay packet: {0}")]
    Codec(#[from] bincode::Error),
    #[error("no reply from relay to {0}")]
    Timeout(&'static str),
    #[error("relay rejected request: {0}")]
    Rejected(String),
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
    #[error("transport is closed")]
    Closed,
}

/// Identity handed out by the relay on host or join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub peer_id: String,
    /// The session's host as the relay knows it; `peer_id` when hosting
    pub host_peer_id: String,
}

/// One asynchronous delivery from the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub event: String,
    pub message_id: i64,
    pub peer_id: Option<String>,
    pub payload: Option<String>,
}

/// Event sink invoked on the transport's own thread
pub type EventCallback = Box<dyn Fn(TransportEvent) + Send + Sync>;

pub trait Transport: Send {
    fn host(&mut self) -> Result<SessionInfo, TransportError>;

    fn list(&mut self) -> Result<Vec<String>, TransportError>;

    fn join(&mut self, session_id: &str, payload: &str) -> Result<SessionInfo, TransportError>;

    fn send_game_message(&mut self, payload: &str) -> Result<(), TransportError>;

    /// Replaces any previously registered callback
    fn listen(&mut self, callback: EventCallback);

    /// Leaves the current session and stops event delivery. Idempotent.
    fn destroy(&mut self);
}

/// Opens transports; lets the session manager stay agnostic of UDP vs loopback
pub trait Connector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Transport>, TransportError>;
}
