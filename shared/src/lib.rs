//! Types shared by every peer and the relay: the grid and its occupancy
//! map, the snake and the food, the typed game protocol and the relay
//! datagram protocol.

pub mod config;
pub mod food;
pub mod grid;
pub mod protocol;
pub mod relay;
pub mod snake;

pub use config::Color;
pub use food::Food;
pub use grid::{Direction, OccupancyMap, Position, Spawn};
pub use protocol::{
    ActorSnapshot, GameMessage, MatchPhase, PlayerUpdate, ProtocolError, StateSync, WorldSnapshot,
};
pub use relay::RelayPacket;
pub use snake::Snake;
