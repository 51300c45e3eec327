//! Runtime settings of one game process

use shared::config::{DEFAULT_HOST, DEFAULT_PORT, INITIAL_SPEED_MS, MATCH_DURATION_SECONDS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Relay address
    pub host: String,
    pub port: u16,
    /// Name sent to the host when joining
    pub player_name: String,
    /// Movement interval at the start of a match
    pub tick_interval_ms: u64,
    pub match_duration_secs: u64,
    /// Clients move their own snake between host snapshots
    pub prediction: bool,
    /// Peers publish their own snake as `player_update` and accept others'
    pub peer_echo: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            player_name: "Player".to_string(),
            tick_interval_ms: INITIAL_SPEED_MS,
            match_duration_secs: MATCH_DURATION_SECONDS,
            prediction: true,
            peer_echo: false,
        }
    }
}
