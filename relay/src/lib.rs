//! # Session Relay Library
//!
//! The relay is the only process every peer can reach. It owns no game state:
//! it hands out session and peer identifiers, keeps track of who belongs to
//! which session and forwards opaque game payloads between members.
//!
//! ## Responsibilities
//!
//! ### Session Directory (`directory`)
//! - Session creation on behalf of a hosting peer
//! - Capacity checks and rejection of unknown sessions
//! - Closing a session once its host leaves
//!
//! ### Peer Bookkeeping (`peer_manager`)
//! - Peer identifiers keyed by datagram source address
//! - Liveness tracking and timeout detection
//!
//! ### Network (`network`)
//! - Receiver, sender and timeout-checker tasks around a UDP socket
//! - `joined`, `left` and `game` events fanned out to the other members
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use relay::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:9001", 64, Duration::from_secs(10)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod directory;
pub mod network;
pub mod peer_manager;
