//! Datagram protocol between a game process and the session relay.
//!
//! Frames are bincode-encoded [`RelayPacket`]s. Game payloads ride inside
//! as opaque JSON strings; the relay never looks at them.

use serde::{Deserialize, Serialize};

/// Event name for a peer entering the session
pub const EVENT_JOINED: &str = "joined";
/// Event name for a peer leaving or timing out
pub const EVENT_LEFT: &str = "left";
/// Event name for a game payload from another peer
pub const EVENT_GAME: &str = "game";

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum RelayPacket {
    // Requests from a game process
    Host,
    List,
    Join {
        session_id: String,
        payload: String,
    },
    Game {
        payload: String,
    },
    Heartbeat,
    Leave,

    // Replies and events from the relay
    Hosted {
        session_id: String,
        peer_id: String,
    },
    Sessions {
        session_ids: Vec<String>,
    },
    Joined {
        session_id: String,
        peer_id: String,
        /// Peer that hosts the session
        host_id: String,
    },
    Rejected {
        reason: String,
    },
    Event {
        event: String,
        message_id: i64,
        peer_id: Option<String>,
        payload: Option<String>,
    },
}

impl RelayPacket {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
