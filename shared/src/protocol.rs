//! Game messages exchanged between peers inside a session.
//!
//! Payloads travel as JSON objects tagged by a `type` field. Decoding goes
//! through private wire structs first and then validates into the typed
//! form below, so nothing downstream ever sees an unchecked coordinate,
//! an oversized body or an out-of-range score. Fields that fail validation
//! are dropped with a warning; the rest of the message still applies. A body
//! with a single bad segment is dropped as a whole.

use crate::config::{MAX_PEER_ID_LEN, MAX_PLAYERS, MAX_SCORE, MAX_SNAKE_LENGTH};
use crate::grid::{Direction, Position};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed game message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Match phase as carried in `state_sync.gameState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Lobby,
    Playing,
    MatchEnd,
}

impl MatchPhase {
    pub fn as_wire(&self) -> &'static str {
        match self {
            MatchPhase::Lobby => "LOBBY",
            MatchPhase::Playing => "PLAYING",
            MatchPhase::MatchEnd => "MATCH_END",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "LOBBY" => Some(MatchPhase::Lobby),
            "PLAYING" => Some(MatchPhase::Playing),
            "MATCH_END" => Some(MatchPhase::MatchEnd),
            _ => None,
        }
    }
}

/// Incremental or full authoritative state. Absent fields leave the
/// receiver's value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSync {
    pub food: Option<Position>,
    pub match_start_time: Option<u64>,
    pub elapsed_ms: Option<u64>,
    pub total_paused_time: Option<u64>,
    /// 0 when no pause is in progress
    pub pause_start_time: Option<u64>,
    pub phase: Option<MatchPhase>,
    pub global_paused: Option<bool>,
    /// Peer that initiated the current pause, `None` when not paused or absent
    pub paused_by: Option<String>,
    /// Roster indexed by slot, empty string for a vacant slot
    pub players: Option<Vec<String>>,
    /// `Some(None)` announces that the match ended without a winner
    pub winner: Option<Option<usize>>,
}

/// One actor inside a `game_state` snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub index: usize,
    pub alive: Option<bool>,
    pub body: Option<VecDeque<Position>>,
    pub score: Option<i32>,
}

/// Full per-tick snapshot broadcast by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub food: Option<Position>,
    pub players: Vec<ActorSnapshot>,
    pub match_start_time: Option<u64>,
    pub elapsed_ms: Option<u64>,
}

/// A single actor's visible state, echoed by its owner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    pub head: Option<Position>,
    pub score: Option<i32>,
    pub alive: Option<bool>,
    pub paused: Option<bool>,
    pub body: Option<VecDeque<Position>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    StateSync(StateSync),
    GameState(WorldSnapshot),
    PlayerInput { direction: Direction },
    PlayerUpdate(PlayerUpdate),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WirePoint {
    x: i64,
    y: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStateSync {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    food_x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    food_y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    match_start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_paused_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pause_start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    game_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    global_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paused_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    players: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    winner: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireActor {
    index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Vec<WirePoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGameState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    food_x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    food_y: Option<i64>,
    #[serde(default)]
    players: Vec<WireActor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    match_start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePlayerInput {
    direction: Direction,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WirePlayerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Vec<WirePoint>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    StateSync(WireStateSync),
    GameState(WireGameState),
    PlayerInput(WirePlayerInput),
    PlayerUpdate(WirePlayerUpdate),
}

fn validate_position(x: i64, y: i64) -> Option<Position> {
    let x = i32::try_from(x).ok()?;
    let y = i32::try_from(y).ok()?;
    let pos = Position::new(x, y);
    pos.in_bounds().then_some(pos)
}

fn validate_pair(field: &str, x: Option<i64>, y: Option<i64>) -> Option<Position> {
    match (x, y) {
        (Some(x), Some(y)) => {
            let pos = validate_position(x, y);
            if pos.is_none() {
                warn!("Dropping out-of-bounds {} ({}, {})", field, x, y);
            }
            pos
        }
        (None, None) => None,
        _ => {
            warn!("Dropping {} with a missing coordinate", field);
            None
        }
    }
}

/// All-or-nothing: one bad segment rejects the whole body.
fn validate_body(points: &[WirePoint]) -> Option<VecDeque<Position>> {
    if points.is_empty() {
        warn!("Dropping empty body");
        return None;
    }
    if points.len() > MAX_SNAKE_LENGTH {
        warn!(
            "Dropping body with {} segments (limit {})",
            points.len(),
            MAX_SNAKE_LENGTH
        );
        return None;
    }

    let mut body = VecDeque::with_capacity(points.len());
    for point in points {
        match validate_position(point.x, point.y) {
            Some(pos) => body.push_back(pos),
            None => {
                warn!(
                    "Dropping body with out-of-bounds segment ({}, {})",
                    point.x, point.y
                );
                return None;
            }
        }
    }
    Some(body)
}

fn validate_score(score: i64) -> Option<i32> {
    if (0..=MAX_SCORE as i64).contains(&score) {
        Some(score as i32)
    } else {
        warn!("Dropping out-of-range score {}", score);
        None
    }
}

fn validate_millis(field: &str, value: Option<i64>) -> Option<u64> {
    let value = value?;
    match u64::try_from(value) {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!("Dropping negative {} {}", field, value);
            None
        }
    }
}

fn validate_peer_id(id: String) -> Option<String> {
    if id.len() > MAX_PEER_ID_LEN {
        warn!("Dropping peer id of {} bytes", id.len());
        return None;
    }
    Some(id)
}

fn validate_slot_index(index: i64) -> Option<usize> {
    usize::try_from(index).ok().filter(|i| *i < MAX_PLAYERS)
}

fn wire_body(body: &VecDeque<Position>) -> Vec<WirePoint> {
    body.iter()
        .map(|p| WirePoint {
            x: p.x as i64,
            y: p.y as i64,
        })
        .collect()
}

impl From<WireStateSync> for StateSync {
    fn from(wire: WireStateSync) -> Self {
        let players = wire.players.map(|mut ids| {
            if ids.len() > MAX_PLAYERS {
                warn!("Truncating roster of {} entries", ids.len());
                ids.truncate(MAX_PLAYERS);
            }
            ids.into_iter()
                .map(|id| validate_peer_id(id).unwrap_or_default())
                .collect()
        });

        let phase = wire.game_state.and_then(|value| {
            let phase = MatchPhase::from_wire(&value);
            if phase.is_none() {
                warn!("Dropping unknown game state {:?}", value);
            }
            phase
        });

        let winner = wire.winner.and_then(|index| {
            if index < 0 {
                Some(None)
            } else if let Some(slot) = validate_slot_index(index) {
                Some(Some(slot))
            } else {
                warn!("Dropping out-of-range winner {}", index);
                None
            }
        });

        StateSync {
            food: validate_pair("food", wire.food_x, wire.food_y),
            match_start_time: validate_millis("matchStartTime", wire.match_start_time),
            elapsed_ms: validate_millis("elapsedMs", wire.elapsed_ms),
            total_paused_time: validate_millis("totalPausedTime", wire.total_paused_time),
            pause_start_time: validate_millis("pauseStartTime", wire.pause_start_time),
            phase,
            global_paused: wire.global_paused,
            paused_by: wire
                .paused_by
                .and_then(validate_peer_id)
                .filter(|id| !id.is_empty()),
            players,
            winner,
        }
    }
}

impl From<&StateSync> for WireStateSync {
    fn from(sync: &StateSync) -> Self {
        WireStateSync {
            food_x: sync.food.map(|p| p.x as i64),
            food_y: sync.food.map(|p| p.y as i64),
            match_start_time: sync.match_start_time.map(|v| v as i64),
            elapsed_ms: sync.elapsed_ms.map(|v| v as i64),
            total_paused_time: sync.total_paused_time.map(|v| v as i64),
            pause_start_time: sync.pause_start_time.map(|v| v as i64),
            game_state: sync.phase.map(|phase| phase.as_wire().to_string()),
            global_paused: sync.global_paused,
            // The wire always carries the field alongside the pause flag
            paused_by: match (&sync.paused_by, sync.global_paused) {
                (Some(id), _) => Some(id.clone()),
                (None, Some(_)) => Some(String::new()),
                (None, None) => None,
            },
            players: sync.players.clone(),
            winner: sync
                .winner
                .map(|winner| winner.map_or(-1, |slot| slot as i64)),
        }
    }
}

impl From<WireGameState> for WorldSnapshot {
    fn from(wire: WireGameState) -> Self {
        let mut players = Vec::with_capacity(wire.players.len().min(MAX_PLAYERS));
        for actor in wire.players {
            let Some(index) = validate_slot_index(actor.index) else {
                warn!("Dropping actor with slot index {}", actor.index);
                continue;
            };
            if players.len() >= MAX_PLAYERS {
                warn!("Dropping actors beyond {}", MAX_PLAYERS);
                break;
            }
            players.push(ActorSnapshot {
                index,
                alive: actor.alive,
                body: actor.body.as_deref().and_then(validate_body),
                score: actor.score.and_then(validate_score),
            });
        }

        WorldSnapshot {
            food: validate_pair("food", wire.food_x, wire.food_y),
            players,
            match_start_time: validate_millis("matchStartTime", wire.match_start_time),
            elapsed_ms: validate_millis("elapsedMs", wire.elapsed_ms),
        }
    }
}

impl From<&WorldSnapshot> for WireGameState {
    fn from(snapshot: &WorldSnapshot) -> Self {
        WireGameState {
            food_x: snapshot.food.map(|p| p.x as i64),
            food_y: snapshot.food.map(|p| p.y as i64),
            players: snapshot
                .players
                .iter()
                .map(|actor| WireActor {
                    index: actor.index as i64,
                    alive: actor.alive,
                    body: actor.body.as_ref().map(wire_body),
                    score: actor.score.map(|s| s as i64),
                })
                .collect(),
            match_start_time: snapshot.match_start_time.map(|v| v as i64),
            elapsed_ms: snapshot.elapsed_ms.map(|v| v as i64),
        }
    }
}

impl From<WirePlayerUpdate> for PlayerUpdate {
    fn from(wire: WirePlayerUpdate) -> Self {
        PlayerUpdate {
            head: validate_pair("head", wire.x, wire.y),
            score: wire.score.and_then(validate_score),
            alive: wire.alive,
            paused: wire.paused,
            body: wire.body.as_deref().and_then(validate_body),
        }
    }
}

impl From<&PlayerUpdate> for WirePlayerUpdate {
    fn from(update: &PlayerUpdate) -> Self {
        WirePlayerUpdate {
            x: update.head.map(|p| p.x as i64),
            y: update.head.map(|p| p.y as i64),
            score: update.score.map(|s| s as i64),
            alive: update.alive,
            paused: update.paused,
            body: update.body.as_ref().map(wire_body),
        }
    }
}

impl GameMessage {
    /// Wire tag of the message
    pub fn kind(&self) -> &'static str {
        match self {
            GameMessage::StateSync(_) => "state_sync",
            GameMessage::GameState(_) => "game_state",
            GameMessage::PlayerInput { .. } => "player_input",
            GameMessage::PlayerUpdate(_) => "player_update",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let wire = match self {
            GameMessage::StateSync(sync) => WireMessage::StateSync(sync.into()),
            GameMessage::GameState(snapshot) => WireMessage::GameState(snapshot.into()),
            GameMessage::PlayerInput { direction } => WireMessage::PlayerInput(WirePlayerInput {
                direction: *direction,
            }),
            GameMessage::PlayerUpdate(update) => WireMessage::PlayerUpdate(update.into()),
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parses and validates a payload. Only structurally malformed JSON or
    /// an unknown `type` is an error; bad field values are dropped.
    pub fn decode(payload: &str) -> Result<GameMessage, ProtocolError> {
        let wire: WireMessage = serde_json::from_str(payload)?;
        Ok(match wire {
            WireMessage::StateSync(sync) => GameMessage::StateSync(sync.into()),
            WireMessage::GameState(state) => GameMessage::GameState(state.into()),
            WireMessage::PlayerInput(input) => GameMessage::PlayerInput {
                direction: input.direction,
            },
            WireMessage::PlayerUpdate(update) => GameMessage::PlayerUpdate(update.into()),
        })
    }
}
