//! Game-wide constants shared by host, clients and the relay.

use serde::{Deserialize, Serialize};

pub const GRID_WIDTH: i32 = 40;
pub const GRID_HEIGHT: i32 = 30;

/// Authoritative tick interval at match start.
pub const INITIAL_SPEED_MS: u64 = 100;
/// Floor for the tick interval after repeated speed-ups.
pub const MIN_SPEED_MS: u64 = 50;
/// Tick interval reduction applied each time food is eaten.
pub const SPEED_UP_STEP_MS: u64 = 2;

pub const MATCH_DURATION_SECONDS: u64 = 120;
pub const MAX_FOOD_SPAWN_ATTEMPTS: usize = 1000;
pub const FOOD_SCORE_VALUE: i32 = 10;
pub const DEATH_SCORE_PENALTY: i32 = 10;
pub const MAX_PLAYERS: usize = 4;
pub const INITIAL_SNAKE_LENGTH: usize = 3;

/// Host broadcasts a full resynchronization at this cadence.
pub const STATE_SYNC_INTERVAL_MS: u64 = 5000;
/// Host broadcasts the match timer at this cadence.
pub const TIMER_SYNC_INTERVAL_MS: u64 = 1000;
/// Minimum spacing between two direction messages from one slot.
pub const DIRECTION_CHANGE_THROTTLE_MS: u64 = 16;
/// Minimum spacing between two per-actor echoes from one slot.
pub const PLAYER_UPDATE_THROTTLE_MS: u64 = 100;
pub const CONNECTION_TIMEOUT_WARNING_MS: u64 = 15_000;
pub const CONNECTION_TIMEOUT_DISCONNECT_MS: u64 = 30_000;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9001;

pub const PROTOCOL_VERSION: &str = "1.0.0";
pub const CLIENT_IDENTIFIER: &str = "HardcoreSnakeClient";

/// Sanity ceiling for bodies received from peers: one snake filling the grid.
pub const MAX_SNAKE_LENGTH: usize = (GRID_WIDTH * GRID_HEIGHT) as usize;
/// Sanity ceiling for scores received from peers.
pub const MAX_SCORE: i32 = 10_000;
/// Sanity ceiling for peer identifiers received from peers.
pub const MAX_PEER_ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Green, blue, yellow, magenta.
pub const PLAYER_COLORS: [Color; MAX_PLAYERS] = [
    Color::rgb(0, 255, 0),
    Color::rgb(0, 0, 255),
    Color::rgb(255, 255, 0),
    Color::rgb(255, 0, 255),
];

pub const FOOD_COLOR: Color = Color::rgb(255, 0, 0);

/// Head spawn cell per slot: top-left, top-right, bottom-left, bottom-right.
pub const PLAYER_SPAWN: [(i32, i32); MAX_PLAYERS] = [
    (GRID_WIDTH / 4, GRID_HEIGHT / 4),
    (3 * GRID_WIDTH / 4, GRID_HEIGHT / 4),
    (GRID_WIDTH / 4, 3 * GRID_HEIGHT / 4),
    (3 * GRID_WIDTH / 4, 3 * GRID_HEIGHT / 4),
];
