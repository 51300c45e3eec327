//! # Snake Game Library
//!
//! Host-authoritative multiplayer snake on top of a relay that only
//! groups peers into sessions and forwards opaque payloads.
//!
//! ## Authority
//! The host (or the single local player) owns the simulation: movement,
//! collisions, food, score and the match timer. Clients send steering
//! requests, optionally predict their own snake, and overwrite their
//! view with every snapshot the host broadcasts.
//!
//! ## Module Organization
//!
//! - `transport`, `udp_transport`, `loopback`: the relay seam and its
//!   UDP and in-process implementations
//! - `queue`: FIFO handoff from transport callbacks to the game tick
//! - `session`: session lifecycle, host tracking, connection health
//! - `roster`, `match_state`, `context`: per-match data
//! - `sync`: building and applying protocol messages
//! - `state`, `game`, `input`: the state machine, the tick and commands
//! - `snapshot`: read-only view for a renderer

pub mod config;
pub mod context;
pub mod game;
pub mod input;
pub mod loopback;
pub mod match_state;
pub mod queue;
pub mod roster;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod sync;
pub mod transport;
pub mod udp_transport;
pub mod utils;
