//! Host/client reconciliation: building outbound sync messages and
//! applying inbound ones to the [`GameContext`].
//!
//! The host is the only source of truth for food, timing, roster, phase
//! and actor bodies. Pause state is the exception: any peer may pause or
//! resume, and every peer applies it the same way. All appliers are
//! idempotent so duplicated or re-sent messages are harmless.

use crate::context::GameContext;
use crate::roster::snake_for;
use crate::state::AppState;
use log::{debug, info, warn};
use shared::{
    ActorSnapshot, Direction, MatchPhase, PlayerUpdate, Position, StateSync, WorldSnapshot,
};

/// Wire phase for an application state
pub fn phase_of(state: AppState) -> MatchPhase {
    match state {
        AppState::Playing | AppState::Paused => MatchPhase::Playing,
        AppState::MatchEnd => MatchPhase::MatchEnd,
        _ => MatchPhase::Lobby,
    }
}

/// Complete state for the periodic self-healing resync and match start/end
pub fn full_sync(ctx: &GameContext, state: AppState, now: u64) -> StateSync {
    let match_state = &ctx.match_state;
    StateSync {
        food: Some(ctx.food.position()),
        match_start_time: Some(match_state.start_time()),
        elapsed_ms: Some(ctx.elapsed(now)),
        total_paused_time: Some(match_state.total_paused()),
        pause_start_time: match_state.pause_start(),
        phase: Some(phase_of(state)),
        global_paused: Some(match_state.is_paused()),
        paused_by: match_state.paused_by().map(str::to_string),
        players: Some(ctx.roster.peer_ids()),
        winner: Some(match_state.winner()),
    }
}

pub fn timer_sync(ctx: &GameContext, now: u64) -> StateSync {
    StateSync {
        match_start_time: Some(ctx.match_state.start_time()),
        elapsed_ms: Some(ctx.elapsed(now)),
        total_paused_time: Some(ctx.match_state.total_paused()),
        ..StateSync::default()
    }
}

pub fn pause_sync(ctx: &GameContext) -> StateSync {
    let match_state = &ctx.match_state;
    StateSync {
        total_paused_time: Some(match_state.total_paused()),
        pause_start_time: match_state.pause_start(),
        global_paused: Some(match_state.is_paused()),
        paused_by: match_state.paused_by().map(str::to_string),
        ..StateSync::default()
    }
}

pub fn food_sync(ctx: &GameContext) -> StateSync {
    StateSync {
        food: Some(ctx.food.position()),
        ..StateSync::default()
    }
}

/// Per-tick snapshot of every active actor
pub fn world_snapshot(ctx: &GameContext, now: u64) -> WorldSnapshot {
    let players = ctx
        .roster
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.active && !slot.is_vacant())
        .filter_map(|(index, slot)| {
            let snake = slot.snake.as_ref()?;
            Some(ActorSnapshot {
                index,
                alive: Some(snake.is_alive()),
                body: Some(snake.body().clone()),
                score: Some(snake.score()),
            })
        })
        .collect();

    WorldSnapshot {
        food: Some(ctx.food.position()),
        players,
        match_start_time: Some(ctx.match_state.start_time()),
        elapsed_ms: Some(ctx.elapsed(now)),
    }
}

/// The own snake's state for peer echo
pub fn own_update(ctx: &GameContext) -> Option<PlayerUpdate> {
    let slot = ctx.roster.my_slot()?;
    let snake = slot.snake.as_ref()?;
    Some(PlayerUpdate {
        head: Some(snake.head()),
        score: Some(snake.score()),
        alive: Some(snake.is_alive()),
        paused: Some(slot.paused),
        body: Some(snake.body().clone()),
    })
}

fn sent_by_host(ctx: &GameContext, sender: &str) -> bool {
    ctx.network.is_client() && ctx.network.host_peer_id() == Some(sender)
}

/// Applies a `state_sync`. Returns the phase the host reports, which the
/// caller follows; pause fields are applied to the match state directly.
pub fn apply_state_sync(
    ctx: &mut GameContext,
    sender: &str,
    sync: StateSync,
    now: u64,
) -> Option<MatchPhase> {
    let from_host = sent_by_host(ctx, sender);
    let mut phase = None;

    if from_host {
        if let Some(food) = sync.food {
            place_food(ctx, food);
        }
        if let Some(start) = sync.match_start_time {
            ctx.match_state.set_start_time(start);
        }
        if let Some(elapsed) = sync.elapsed_ms {
            ctx.match_state.set_synced_elapsed(elapsed);
        }
        if let Some(players) = sync.players.as_deref() {
            let my_peer = ctx.network.my_peer_id().map(str::to_string);
            let change = ctx.roster.merge_roster(players, my_peer.as_deref());
            if !change.added.is_empty() || !change.removed.is_empty() {
                debug!(
                    "Roster updated: added slots {:?}, removed {:?}",
                    change.added, change.removed
                );
            }
        }
        if let Some(winner) = sync.winner {
            ctx.match_state.set_winner(winner);
        }
        phase = sync.phase;
    } else if ctx.network.is_client() && sync_has_host_fields(&sync) {
        warn!("Ignoring authoritative fields from non-host {}", sender);
    }

    match sync.global_paused {
        Some(true) if from_host => {
            let by = sync.paused_by.as_deref().unwrap_or(sender);
            ctx.match_state
                .adopt_pause(by, sync.pause_start_time.unwrap_or(now));
        }
        Some(true) => {
            let by = sync.paused_by.as_deref().unwrap_or(sender);
            // The host stamps pauses on its own clock
            let started = if ctx.is_authoritative() {
                now
            } else {
                sync.pause_start_time.unwrap_or(now)
            };
            ctx.match_state.pause(by, started);
        }
        Some(false) => {
            ctx.match_state.resume(now);
        }
        None => {}
    }

    if from_host {
        if let Some(total) = sync.total_paused_time {
            ctx.match_state.set_total_paused(total);
        }
    }

    phase
}

/// Moves the food to the host's cell. Food only respawns when eaten, so a
/// client mirrors the host's speed-up on every move.
fn place_food(ctx: &mut GameContext, food: Position) {
    if ctx.food.position() != food && !ctx.is_authoritative() {
        ctx.speed_up();
    }
    ctx.food.set_position(food);
}

fn sync_has_host_fields(sync: &StateSync) -> bool {
    sync.food.is_some()
        || sync.players.is_some()
        || sync.phase.is_some()
        || sync.winner.is_some()
        || sync.elapsed_ms.is_some()
}

/// Applies the host's per-tick snapshot on a client. Overrides the own
/// predicted snake too. Returns false when the snapshot was not accepted.
pub fn apply_world_snapshot(ctx: &mut GameContext, sender: &str, snapshot: WorldSnapshot) -> bool {
    if !sent_by_host(ctx, sender) {
        debug!("Ignoring game_state from {}", sender);
        return false;
    }

    if let Some(food) = snapshot.food {
        place_food(ctx, food);
    }
    if let Some(start) = snapshot.match_start_time {
        ctx.match_state.set_start_time(start);
    }
    if let Some(elapsed) = snapshot.elapsed_ms {
        ctx.match_state.set_synced_elapsed(elapsed);
    }

    for actor in snapshot.players {
        let Some(slot) = ctx.roster.slot_mut(actor.index) else {
            continue;
        };
        if slot.is_vacant() {
            debug!("Snapshot for vacant slot {}", actor.index);
            continue;
        }

        if let Some(body) = actor.body {
            let snake = slot.snake.get_or_insert_with(|| snake_for(actor.index));
            snake.set_body(body);
        }
        if let Some(snake) = slot.snake.as_mut() {
            if let Some(alive) = actor.alive {
                snake.set_alive(alive);
            }
            if let Some(score) = actor.score {
                snake.set_score(score);
            }
        }
    }
    true
}

/// Host side: steers the sender's own snake, never another slot
pub fn apply_player_input(ctx: &mut GameContext, sender: &str, direction: Direction) -> bool {
    if !ctx.network.is_host() {
        debug!("Ignoring player_input from {} as non-host", sender);
        return false;
    }

    let Some(index) = ctx.roster.find(sender) else {
        warn!("player_input from unknown peer {}", sender);
        return false;
    };

    match ctx.roster.slot_mut(index).and_then(|slot| slot.snake.as_mut()) {
        Some(snake) => {
            snake.set_direction(direction);
            true
        }
        None => false,
    }
}

/// Peer echo: mirrors another peer's self-reported snake into its slot.
/// The authority never accepts it.
pub fn apply_player_update(ctx: &mut GameContext, sender: &str, update: PlayerUpdate) -> bool {
    if !ctx.config.peer_echo || ctx.is_authoritative() {
        debug!("Ignoring player_update from {}", sender);
        return false;
    }
    if ctx.network.my_peer_id() == Some(sender) {
        return false;
    }

    let Some(index) = ctx.roster.find(sender) else {
        debug!("player_update from unseated peer {}", sender);
        return false;
    };
    let Some(slot) = ctx.roster.slot_mut(index) else {
        return false;
    };

    if let Some(paused) = update.paused {
        slot.paused = paused;
    }
    let snake = slot.snake.get_or_insert_with(|| snake_for(index));
    if let Some(body) = update.body {
        snake.set_body(body);
    }
    if let Some(alive) = update.alive {
        snake.set_alive(alive);
    }
    if let Some(score) = update.score {
        snake.set_score(score);
    }
    true
}

/// Logs a phase change the caller is about to follow
pub fn log_phase(from: AppState, phase: MatchPhase) {
    if phase_of(from) != phase {
        info!("Host moved match to {}", phase.as_wire());
    }
}
