use crate::config::GameConfig;
use crate::match_state::MatchState;
use crate::roster::PlayerRoster;
use crate::session::NetworkSession;
use crate::transport::Connector;
use rand::rngs::StdRng;
use shared::config::{MIN_SPEED_MS, SPEED_UP_STEP_MS};
use shared::{Direction, Food, OccupancyMap};

/// Peer id the local player uses outside a session
pub const LOCAL_PEER: &str = "local";

/// Everything the tick and the protocol handlers operate on
pub struct GameContext {
    pub network: NetworkSession,
    pub match_state: MatchState,
    pub roster: PlayerRoster,
    pub food: Food,
    pub occupancy: OccupancyMap,
    pub rng: StdRng,
    pub config: GameConfig,

    pub singleplayer: bool,
    /// Current movement interval; shrinks as food is eaten
    pub tick_interval_ms: u64,
    pub last_tick: u64,
    pub last_timer_sync: u64,
    pub last_full_sync: u64,

    /// Direction held back by the input throttle
    pub pending_input: Option<Direction>,
    pub last_input_sent: Option<u64>,
}

impl GameContext {
    pub fn new(config: GameConfig, connector: Box<dyn Connector>, rng: StdRng) -> Self {
        Self {
            network: NetworkSession::new(connector),
            match_state: MatchState::new(config.match_duration_secs),
            roster: PlayerRoster::new(),
            food: Food::new(),
            occupancy: OccupancyMap::new(),
            rng,
            tick_interval_ms: config.tick_interval_ms,
            config,
            singleplayer: false,
            last_tick: 0,
            last_timer_sync: 0,
            last_full_sync: 0,
            pending_input: None,
            last_input_sent: None,
        }
    }

    /// Runs the simulation for every actor: singleplayer or hosting
    pub fn is_authoritative(&self) -> bool {
        self.singleplayer || self.network.is_host()
    }

    pub fn local_peer_id(&self) -> &str {
        self.network.my_peer_id().unwrap_or(LOCAL_PEER)
    }

    /// Match time as this process knows it: computed by the authority,
    /// mirrored from broadcasts on clients
    pub fn elapsed(&self, now: u64) -> u64 {
        if self.is_authoritative() {
            self.match_state.elapsed(now)
        } else {
            self.match_state.synced_elapsed()
        }
    }

    /// One food eaten: shortens the movement interval down to the floor
    pub fn speed_up(&mut self) {
        let floor = MIN_SPEED_MS.min(self.config.tick_interval_ms);
        self.tick_interval_ms = self
            .tick_interval_ms
            .saturating_sub(SPEED_UP_STEP_MS)
            .max(floor);
    }

    /// Rebuilds the occupancy map from every active, alive snake
    pub fn rebuild_occupancy(&mut self) {
        let roster = &self.roster;
        self.occupancy.rebuild(
            roster
                .slots()
                .iter()
                .filter(|slot| slot.active && !slot.is_vacant())
                .filter_map(|slot| slot.snake.as_ref())
                .filter(|snake| snake.is_alive())
                .flat_map(|snake| snake.body().iter()),
        );
    }
}
