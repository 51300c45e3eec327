//! The game tick and the state machine driving it
//!
//! One [`Game::update`] per frame:
//! 1. finish a session teardown requested during the previous tick
//! 2. drain the network queue in arrival order and dispatch each message
//! 3. advance the simulation when the movement interval has elapsed
//!    (authority: every actor; client: its own predicted actor)
//! 4. host broadcasts: per-tick snapshot, timer and periodic full resync
//! 5. end the match when the authority's timer runs out

use crate::config::GameConfig;
use crate::context::{GameContext, LOCAL_PEER};
use crate::input::{handler_for, Command};
use crate::match_state::{resolve_winner, MatchState};
use crate::queue::MessageKind;
use crate::session::{Health, SessionError};
use crate::snapshot::RenderSnapshot;
use crate::state::{AppState, TransitionError};
use crate::sync;
use crate::transport::Connector;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::config::{
    DIRECTION_CHANGE_THROTTLE_MS, MAX_FOOD_SPAWN_ATTEMPTS, PLAYER_UPDATE_THROTTLE_MS,
    STATE_SYNC_INTERVAL_MS, TIMER_SYNC_INTERVAL_MS,
};
use shared::grid::spawn_free_for_snake;
use shared::{Direction, GameMessage, MatchPhase, StateSync};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("only the host can {0}")]
    HostOnly(&'static str),
    #[error("no listed session #{0}")]
    UnknownSession(usize),
}

pub struct Game {
    ctx: GameContext,
    state: AppState,
    pending_teardown: bool,
}

impl Game {
    pub fn new(config: GameConfig, connector: Box<dyn Connector>) -> Self {
        Self::with_rng(config, connector, StdRng::from_entropy())
    }

    /// Deterministic food and spawn placement
    pub fn with_seed(config: GameConfig, connector: Box<dyn Connector>, seed: u64) -> Self {
        Self::with_rng(config, connector, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, connector: Box<dyn Connector>, rng: StdRng) -> Self {
        Self {
            ctx: GameContext::new(config, connector, rng),
            state: AppState::Menu,
            pending_teardown: false,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    pub fn is_teardown_pending(&self) -> bool {
        self.pending_teardown
    }

    pub fn snapshot(&self, now: u64) -> RenderSnapshot {
        RenderSnapshot::capture(&self.ctx, self.state, now)
    }

    pub fn handle_command(&mut self, command: Command, now: u64) -> Result<(), GameError> {
        handler_for(self.state).handle(self, command, now)
    }

    /// Moves to `to`, running the old state's exit and the new state's
    /// enter actions. `from_network` suppresses re-broadcasting a change
    /// that arrived from a peer.
    pub fn change_state(
        &mut self,
        to: AppState,
        from_network: bool,
        now: u64,
    ) -> Result<(), TransitionError> {
        if let Err(e) = self.state.check_transition(to) {
            error!("{}", e);
            return Err(e);
        }

        let from = self.state;
        self.exit_state(from, from_network, now);
        self.state = to;
        info!("State {} -> {}", from, to);
        self.enter_state(from, to, from_network, now);
        Ok(())
    }

    fn exit_state(&mut self, from: AppState, from_network: bool, now: u64) {
        if from == AppState::Paused && self.ctx.match_state.resume(now) && !from_network {
            let unpause = sync::pause_sync(&self.ctx);
            self.broadcast_sync(unpause);
        }
    }

    fn enter_state(&mut self, from: AppState, to: AppState, from_network: bool, now: u64) {
        match to {
            AppState::Menu => {
                self.ctx.singleplayer = false;
                self.ctx.roster.clear();
                self.ctx.pending_input = None;
                if self.ctx.network.is_initialized() {
                    self.pending_teardown = true;
                }
            }
            AppState::Singleplayer => {
                self.ctx.singleplayer = true;
                self.ctx.roster.clear();
                let index = self.ctx.roster.add(LOCAL_PEER);
                self.ctx.roster.set_my_index(index);
            }
            AppState::Multiplayer => {}
            AppState::Lobby => {
                if from == AppState::MatchEnd && self.ctx.network.is_host() {
                    let lobby = sync::full_sync(&self.ctx, self.state, now);
                    self.broadcast_sync(lobby);
                }
            }
            AppState::Playing => {
                if matches!(from, AppState::Lobby | AppState::Singleplayer) {
                    if self.ctx.is_authoritative() {
                        self.prepare_match(now);
                    } else {
                        self.ctx.tick_interval_ms = self.ctx.config.tick_interval_ms;
                    }
                }
            }
            AppState::Paused => {
                if !self.ctx.match_state.is_paused() {
                    let by = self.ctx.local_peer_id().to_string();
                    self.ctx.match_state.pause(&by, now);
                }
                if !from_network {
                    let pause = sync::pause_sync(&self.ctx);
                    self.broadcast_sync(pause);
                }
            }
            AppState::MatchEnd => {
                if self.ctx.is_authoritative() {
                    let winner = resolve_winner(self.ctx.roster.slots());
                    self.ctx.match_state.set_winner(winner);
                    match winner {
                        Some(index) => info!("Match over, slot {} wins", index),
                        None => info!("Match over, no winner"),
                    }
                    if self.ctx.network.is_host() {
                        let end = sync::full_sync(&self.ctx, self.state, now);
                        self.broadcast_sync(end);
                    }
                }
            }
        }
    }

    /// Authority only: fresh timer, snakes at their spawns, food placed
    fn prepare_match(&mut self, now: u64) {
        let ctx = &mut self.ctx;
        ctx.match_state.start(now);
        ctx.tick_interval_ms = ctx.config.tick_interval_ms;
        ctx.roster.reset_for_new_match();
        ctx.rebuild_occupancy();
        ctx.food.spawn(&ctx.occupancy, &mut ctx.rng);
        ctx.last_tick = now;
        ctx.last_timer_sync = now;
        ctx.last_full_sync = now;

        if ctx.network.is_host() {
            let start = sync::full_sync(&self.ctx, self.state, now);
            self.broadcast_sync(start);
        }
    }

    fn broadcast_sync(&mut self, sync: StateSync) {
        if self.ctx.network.is_in_session() {
            self.ctx.network.broadcast(&GameMessage::StateSync(sync));
        }
    }

    fn teardown(&mut self) {
        self.pending_teardown = false;
        self.ctx.network.shutdown();
        self.ctx.roster.clear();
        self.ctx.singleplayer = false;
        self.ctx.pending_input = None;
        self.ctx.last_input_sent = None;
        self.ctx.match_state = MatchState::new(self.ctx.config.match_duration_secs);
        info!("Session torn down");
    }

    /// Back to the menu after host loss or timeout; teardown waits for the
    /// next tick
    fn lose_session(&mut self, now: u64) {
        if self.state != AppState::Menu {
            if let Err(e) = self.change_state(AppState::Menu, true, now) {
                error!("Failed to leave lost session: {}", e);
            }
        }
        self.pending_teardown = true;
    }

    pub fn start_singleplayer(&mut self, now: u64) -> Result<(), GameError> {
        self.change_state(AppState::Singleplayer, false, now)?;
        self.change_state(AppState::Playing, false, now)?;
        Ok(())
    }

    /// Connects to the relay and starts browsing
    pub fn open_multiplayer(&mut self, now: u64) -> Result<(), GameError> {
        self.state.check_transition(AppState::Multiplayer)?;
        if self.pending_teardown {
            self.teardown();
        }

        if !self.ctx.network.is_initialized() {
            let host = self.ctx.config.host.clone();
            let port = self.ctx.config.port;
            self.ctx.network.initialize(&host, port, now)?;
        }
        self.change_state(AppState::Multiplayer, false, now)?;
        Ok(())
    }

    pub fn host_session(&mut self, now: u64) -> Result<(), GameError> {
        self.state.check_transition(AppState::Lobby)?;
        if self.state != AppState::Multiplayer {
            return Err(TransitionError {
                from: self.state,
                to: AppState::Lobby,
            }
            .into());
        }

        let info = self.ctx.network.host_session(now)?;
        self.ctx.roster.clear();
        let index = self.ctx.roster.add(&info.peer_id);
        self.ctx.roster.set_my_index(index);
        self.ctx.match_state.start(now);
        self.ctx.last_full_sync = now;
        self.ctx.last_timer_sync = now;

        self.change_state(AppState::Lobby, false, now)?;
        let lobby = sync::full_sync(&self.ctx, self.state, now);
        self.broadcast_sync(lobby);
        Ok(())
    }

    pub fn refresh_sessions(&mut self) -> Result<Vec<String>, GameError> {
        Ok(self.ctx.network.list_sessions()?.to_vec())
    }

    pub fn join_session(&mut self, session_id: &str, now: u64) -> Result<(), GameError> {
        if self.state != AppState::Multiplayer {
            return Err(TransitionError {
                from: self.state,
                to: AppState::Lobby,
            }
            .into());
        }

        let name = self.ctx.config.player_name.clone();
        self.ctx.network.join_session(session_id, &name, now)?;
        self.ctx.roster.clear();
        self.ctx.match_state = MatchState::new(self.ctx.config.match_duration_secs);
        self.change_state(AppState::Lobby, false, now)?;
        Ok(())
    }

    /// Joins the `index`-th session from the last listing
    pub fn join_listed(&mut self, index: usize, now: u64) -> Result<(), GameError> {
        let session_id = self
            .ctx
            .network
            .available_sessions()
            .get(index)
            .cloned()
            .ok_or(GameError::UnknownSession(index + 1))?;
        self.join_session(&session_id, now)
    }

    pub fn start_match(&mut self, now: u64) -> Result<(), GameError> {
        if !self.ctx.network.is_host() {
            return Err(GameError::HostOnly("start a match"));
        }
        if self.state == AppState::MatchEnd {
            self.change_state(AppState::Lobby, false, now)?;
        }
        self.change_state(AppState::Playing, false, now)?;
        Ok(())
    }

    pub fn toggle_pause(&mut self, now: u64) -> Result<(), GameError> {
        let to = if self.state == AppState::Paused {
            AppState::Playing
        } else {
            AppState::Paused
        };
        self.change_state(to, false, now)?;
        Ok(())
    }

    pub fn back_to_menu(&mut self, now: u64) -> Result<(), GameError> {
        if self.state != AppState::Menu {
            self.change_state(AppState::Menu, false, now)?;
        }
        Ok(())
    }

    /// Steers the own snake. Clients predict locally and ask the host.
    pub fn steer(&mut self, direction: Direction, now: u64) {
        if self.state != AppState::Playing || direction == Direction::None {
            return;
        }

        if self.ctx.is_authoritative() {
            if let Some(snake) = self.ctx.roster.my_snake_mut() {
                snake.set_direction(direction);
            }
            return;
        }

        if self.ctx.config.prediction {
            if let Some(snake) = self.ctx.roster.my_snake_mut() {
                snake.set_direction(direction);
            }
        }
        self.ctx.pending_input = Some(direction);
        self.flush_input(now);
    }

    fn flush_input(&mut self, now: u64) {
        let Some(direction) = self.ctx.pending_input else {
            return;
        };
        if let Some(last) = self.ctx.last_input_sent {
            if now.saturating_sub(last) < DIRECTION_CHANGE_THROTTLE_MS {
                return;
            }
        }

        self.ctx.pending_input = None;
        self.ctx.last_input_sent = Some(now);
        self.ctx
            .network
            .broadcast(&GameMessage::PlayerInput { direction });
    }

    pub fn update(&mut self, now: u64) {
        if self.pending_teardown {
            self.teardown();
        }

        self.process_messages(now);
        if self.pending_teardown {
            return;
        }

        if self.state == AppState::Playing {
            self.flush_input(now);
            if now.saturating_sub(self.ctx.last_tick) >= self.ctx.tick_interval_ms {
                self.ctx.last_tick = now;
                if self.ctx.is_authoritative() {
                    self.simulate_authoritative(now);
                } else {
                    self.predict();
                }
            }
            self.echo_own_snake(now);
        }

        self.host_broadcasts(now);

        if self.state == AppState::Playing && self.ctx.is_authoritative() {
            let elapsed = self.ctx.elapsed(now);
            if self.ctx.match_state.is_expired(elapsed) {
                if let Err(e) = self.change_state(AppState::MatchEnd, false, now) {
                    error!("Failed to end match: {}", e);
                }
            }
        }
    }

    /// Drains the inbound queue in FIFO order
    pub fn process_messages(&mut self, now: u64) {
        if self.ctx.network.check_health(now) == Health::Lost {
            warn!("Connection to host lost");
            self.lose_session(now);
            return;
        }

        for message in self.ctx.network.drain() {
            if self.pending_teardown {
                debug!("Discarding messages queued before teardown");
                break;
            }
            self.ctx.network.record_activity(now);

            match message.kind {
                MessageKind::PlayerJoined => self.on_player_joined(&message.peer_id, now),
                MessageKind::PlayerLeft => self.on_player_left(&message.peer_id, now),
                MessageKind::HostDisconnected => {
                    warn!("Host {} disconnected", message.peer_id);
                    self.lose_session(now);
                }
                MessageKind::GameData => {
                    let Some(payload) = message.payload.as_deref() else {
                        continue;
                    };
                    match GameMessage::decode(payload) {
                        Ok(decoded) => self.dispatch(&message.peer_id, decoded, now),
                        Err(e) => warn!("Dropping malformed payload from {}: {}", message.peer_id, e),
                    }
                }
            }
        }
    }

    fn on_player_joined(&mut self, peer_id: &str, now: u64) {
        if !self.ctx.network.is_host() {
            debug!("Peer {} joined; waiting for host roster", peer_id);
            return;
        }

        let Some(index) = self.ctx.roster.add(peer_id) else {
            warn!("Session full, {} not seated", peer_id);
            return;
        };

        // Mid-match seats need a cell clear of the other snakes
        if matches!(self.state, AppState::Playing | AppState::Paused) {
            self.ctx.rebuild_occupancy();
            let spawn =
                spawn_free_for_snake(&self.ctx.occupancy, &mut self.ctx.rng, MAX_FOOD_SPAWN_ATTEMPTS);
            if !spawn.is_free() {
                warn!("No clear spawn cell for {}", peer_id);
            }
            if let Some(snake) = self
                .ctx
                .roster
                .slot_mut(index)
                .and_then(|slot| slot.snake.as_mut())
            {
                snake.reset_for_new_match(spawn.position());
            }
        }

        let roster = sync::full_sync(&self.ctx, self.state, now);
        self.broadcast_sync(roster);
        self.ctx.last_full_sync = now;
    }

    fn on_player_left(&mut self, peer_id: &str, now: u64) {
        if self.ctx.roster.remove(peer_id).is_none() {
            return;
        }
        if self.ctx.network.is_host() {
            let roster = sync::full_sync(&self.ctx, self.state, now);
            self.broadcast_sync(roster);
            self.ctx.last_full_sync = now;
        }
    }

    fn dispatch(&mut self, sender: &str, message: GameMessage, now: u64) {
        match message {
            GameMessage::StateSync(state_sync) => {
                if let Some(phase) = sync::apply_state_sync(&mut self.ctx, sender, state_sync, now) {
                    self.follow_phase(phase, now);
                }
                self.reconcile_pause(now);
            }
            GameMessage::GameState(snapshot) => {
                sync::apply_world_snapshot(&mut self.ctx, sender, snapshot);
            }
            GameMessage::PlayerInput { direction } => {
                sync::apply_player_input(&mut self.ctx, sender, direction);
            }
            GameMessage::PlayerUpdate(update) => {
                sync::apply_player_update(&mut self.ctx, sender, update);
            }
        }
    }

    /// Follows the host's phase through legal transitions only
    fn follow_phase(&mut self, phase: MatchPhase, now: u64) {
        let target = match phase {
            MatchPhase::Lobby => AppState::Lobby,
            MatchPhase::Playing if self.state == AppState::Paused => return,
            MatchPhase::Playing => AppState::Playing,
            MatchPhase::MatchEnd => AppState::MatchEnd,
        };
        if self.state == target {
            return;
        }

        sync::log_phase(self.state, phase);
        let Some(route) = self.state.route_to(target) else {
            warn!("Cannot follow host from {} to {}", self.state, target);
            return;
        };
        for step in route {
            if self.change_state(step, true, now).is_err() {
                break;
            }
        }
    }

    /// Aligns PLAYING/PAUSED with the match's pause flag
    fn reconcile_pause(&mut self, now: u64) {
        let paused = self.ctx.match_state.is_paused();
        let result = match self.state {
            AppState::Playing if paused => self.change_state(AppState::Paused, true, now),
            AppState::Paused if !paused => self.change_state(AppState::Playing, true, now),
            _ => Ok(()),
        };
        if let Err(e) = result {
            error!("Failed to apply pause state: {}", e);
        }
    }

    /// One authoritative movement step for every active actor
    fn simulate_authoritative(&mut self, now: u64) {
        let ctx = &mut self.ctx;
        let active = ctx.roster.active_indices();
        ctx.rebuild_occupancy();

        // Advance, keeping the occupancy map in step with heads and tails
        for &index in &active {
            let Some(snake) = ctx.roster.slot_mut(index).and_then(|s| s.snake.as_mut()) else {
                continue;
            };
            if !snake.is_alive() {
                continue;
            }
            let old_head = snake.head();
            let old_tail = snake.tail();
            snake.update();
            if snake.head() != old_head {
                if !snake.collides_with(old_tail) {
                    ctx.occupancy.clear(old_tail);
                }
                ctx.occupancy.mark(snake.head());
            }
        }

        let mut dead = Vec::new();
        for &index in &active {
            let Some(snake) = ctx.roster.slot(index).and_then(|s| s.snake.as_ref()) else {
                continue;
            };
            if !snake.is_alive() {
                continue;
            }
            let head = snake.head();
            let hit_other = active
                .iter()
                .filter(|&&other| other != index)
                .filter_map(|&other| ctx.roster.slot(other).and_then(|s| s.snake.as_ref()))
                .filter(|other| other.is_alive())
                .any(|other| other.collides_with(head));

            if snake.boundary_collision() || snake.self_collision() || hit_other {
                dead.push(index);
            }
        }

        for &index in &dead {
            info!("Slot {} crashed", index);
            if let Some(snake) = ctx.roster.slot_mut(index).and_then(|s| s.snake.as_mut()) {
                snake.set_alive(false);
            }
            ctx.rebuild_occupancy();
            let spawn = spawn_free_for_snake(&ctx.occupancy, &mut ctx.rng, MAX_FOOD_SPAWN_ATTEMPTS);
            if !spawn.is_free() {
                warn!("No clear respawn cell for slot {}", index);
            }
            if let Some(snake) = ctx.roster.slot_mut(index).and_then(|s| s.snake.as_mut()) {
                snake.reset_after_death(spawn.position());
            }
        }
        if !dead.is_empty() {
            ctx.rebuild_occupancy();
        }

        let food = ctx.food.position();
        let eater = active.iter().copied().find(|&index| {
            ctx.roster
                .slot(index)
                .and_then(|s| s.snake.as_ref())
                .map(|snake| snake.is_alive() && snake.head() == food)
                .unwrap_or(false)
        });

        if let Some(index) = eater {
            if let Some(snake) = ctx.roster.slot_mut(index).and_then(|s| s.snake.as_mut()) {
                snake.grow();
                debug!("Slot {} ate, score {}", index, snake.score());
            }
            ctx.food.spawn(&ctx.occupancy, &mut ctx.rng);
            ctx.speed_up();
        }

        if ctx.network.is_host() {
            if eater.is_some() {
                let food = sync::food_sync(&self.ctx);
                self.broadcast_sync(food);
            }
            let snapshot = sync::world_snapshot(&self.ctx, now);
            self.ctx.network.broadcast(&GameMessage::GameState(snapshot));
        }
    }

    /// Client-side prediction of the own snake between host snapshots
    fn predict(&mut self) {
        if !self.ctx.config.prediction {
            return;
        }
        if let Some(snake) = self.ctx.roster.my_snake_mut() {
            snake.update();
        }
    }

    /// Peer echo: publishes the own snake, throttled per slot
    fn echo_own_snake(&mut self, now: u64) {
        if !self.ctx.config.peer_echo || !self.ctx.network.is_in_session() {
            return;
        }
        let Some(slot) = self.ctx.roster.my_slot_mut() else {
            return;
        };
        if slot.last_sent_ms != 0 && now.saturating_sub(slot.last_sent_ms) < PLAYER_UPDATE_THROTTLE_MS {
            return;
        }
        slot.last_sent_ms = now;

        if let Some(update) = sync::own_update(&self.ctx) {
            self.ctx.network.broadcast(&GameMessage::PlayerUpdate(update));
        }
    }

    fn host_broadcasts(&mut self, now: u64) {
        if !self.ctx.network.is_host() || !self.state.is_in_match() {
            return;
        }

        if matches!(self.state, AppState::Playing | AppState::Paused)
            && now.saturating_sub(self.ctx.last_timer_sync) >= TIMER_SYNC_INTERVAL_MS
        {
            self.ctx.last_timer_sync = now;
            let timer = sync::timer_sync(&self.ctx, now);
            self.broadcast_sync(timer);
        }

        if now.saturating_sub(self.ctx.last_full_sync) >= STATE_SYNC_INTERVAL_MS {
            self.ctx.last_full_sync = now;
            let full = sync::full_sync(&self.ctx, self.state, now);
            self.broadcast_sync(full);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackHub;
    use crate::roster::spawn_for;
    use shared::config::{
        INITIAL_SNAKE_LENGTH, INITIAL_SPEED_MS, MATCH_DURATION_SECONDS, SPEED_UP_STEP_MS,
    };
    use shared::Position;

    fn offline_game() -> Game {
        let hub = LoopbackHub::new();
        Game::with_seed(GameConfig::default(), Box::new(hub.connector()), 3)
    }

    #[test]
    fn test_singleplayer_starts_playing() {
        let mut game = offline_game();
        game.start_singleplayer(1_000).unwrap();

        assert_eq!(game.state(), AppState::Playing);
        assert!(game.context().is_authoritative());
        let snake = game.context().roster.my_snake().unwrap();
        assert_eq!(snake.head(), spawn_for(0));
        assert_eq!(snake.len(), INITIAL_SNAKE_LENGTH);
        assert!(!game.context().network.is_initialized());
    }

    #[test]
    fn test_illegal_transition_keeps_state() {
        let mut game = offline_game();
        assert!(game.change_state(AppState::Paused, false, 0).is_err());
        assert_eq!(game.state(), AppState::Menu);
        assert!(matches!(
            game.toggle_pause(0),
            Err(GameError::Transition(_))
        ));
    }

    #[test]
    fn test_tick_rate_limits_movement() {
        let mut game = offline_game();
        game.start_singleplayer(1_000).unwrap();
        game.steer(Direction::Down, 1_000);
        let start = game.context().roster.my_snake().unwrap().head();

        game.update(1_050);
        assert_eq!(game.context().roster.my_snake().unwrap().head(), start);

        game.update(1_000 + INITIAL_SPEED_MS);
        assert_eq!(
            game.context().roster.my_snake().unwrap().head(),
            Position::new(start.x, start.y + 1)
        );
    }

    #[test]
    fn test_eating_food_grows_and_speeds_up() {
        let mut game = offline_game();
        game.start_singleplayer(1_000).unwrap();
        let head = game.context().roster.my_snake().unwrap().head();
        game.context_mut()
            .food
            .set_position(Position::new(head.x + 1, head.y));
        game.steer(Direction::Right, 1_000);

        game.update(1_000 + INITIAL_SPEED_MS);

        let ctx = game.context();
        let snake = ctx.roster.my_snake().unwrap();
        assert_eq!(snake.score(), shared::config::FOOD_SCORE_VALUE);
        assert_eq!(ctx.tick_interval_ms, INITIAL_SPEED_MS - SPEED_UP_STEP_MS);
        assert_ne!(ctx.food.position(), snake.head());

        // The duplicated tail survives the next move
        game.context_mut().food.set_position(Position::new(39, 29));
        game.update(1_000 + 2 * INITIAL_SPEED_MS);
        assert_eq!(
            game.context().roster.my_snake().unwrap().len(),
            INITIAL_SNAKE_LENGTH + 1
        );
    }

    #[test]
    fn test_wall_crash_respawns_with_penalty() {
        let mut game = offline_game();
        game.start_singleplayer(0).unwrap();
        if let Some(snake) = game.context_mut().roster.my_snake_mut() {
            snake.set_score(25);
            let wall = std::collections::VecDeque::from(vec![
                Position::new(0, 5),
                Position::new(1, 5),
                Position::new(2, 5),
            ]);
            snake.set_body(wall);
            snake.set_direction(Direction::Left);
        }
        game.context_mut().food.set_position(Position::new(39, 29));

        game.update(INITIAL_SPEED_MS);

        let snake = game.context().roster.my_snake().unwrap();
        assert!(snake.is_alive());
        assert!(snake.head().in_bounds());
        assert_eq!(snake.len(), INITIAL_SNAKE_LENGTH);
        assert_eq!(snake.score(), 15);
        assert_eq!(snake.direction(), Direction::None);
    }

    #[test]
    fn test_pause_freezes_timer_and_movement() {
        let mut game = offline_game();
        game.start_singleplayer(0).unwrap();
        game.steer(Direction::Down, 0);
        game.update(10_000);
        let head = game.context().roster.my_snake().unwrap().head();

        game.toggle_pause(10_000).unwrap();
        assert_eq!(game.state(), AppState::Paused);
        game.update(14_000);
        assert_eq!(game.context().roster.my_snake().unwrap().head(), head);

        game.toggle_pause(15_000).unwrap();
        assert_eq!(game.context().match_state.total_paused(), 5_000);
        assert_eq!(game.context().elapsed(20_000), 15_000);
    }

    #[test]
    fn test_match_timer_ends_singleplayer() {
        let mut game = offline_game();
        game.start_singleplayer(0).unwrap();

        game.update(MATCH_DURATION_SECONDS * 1000 - 1);
        assert_eq!(game.state(), AppState::Playing);

        game.update(MATCH_DURATION_SECONDS * 1000);
        assert_eq!(game.state(), AppState::MatchEnd);
        assert_eq!(game.context().match_state.winner(), Some(0));

        game.back_to_menu(MATCH_DURATION_SECONDS * 1000).unwrap();
        assert_eq!(game.state(), AppState::Menu);
        assert!(game.context().roster.my_snake().is_none());
    }

    #[test]
    fn test_start_match_requires_host() {
        let mut game = offline_game();
        assert!(matches!(game.start_match(0), Err(GameError::HostOnly(_))));
    }

    #[test]
    fn test_host_lobby_and_menu_teardown_is_deferred() {
        let hub = LoopbackHub::new();
        let mut game = Game::with_seed(GameConfig::default(), Box::new(hub.connector()), 1);
        game.open_multiplayer(0).unwrap();
        game.host_session(0).unwrap();
        assert_eq!(game.state(), AppState::Lobby);
        assert_eq!(hub.session_count(), 1);

        game.back_to_menu(10).unwrap();
        assert!(game.is_teardown_pending());
        assert_eq!(hub.session_count(), 1);

        game.update(20);
        assert!(!game.is_teardown_pending());
        assert_eq!(hub.session_count(), 0);
        assert!(!game.context().network.is_initialized());
    }
}
