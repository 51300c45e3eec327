//! Read-only view of the game for a renderer

use crate::context::GameContext;
use crate::state::AppState;
use shared::{Color, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct SlotView {
    pub index: usize,
    pub peer_id: String,
    pub body: Vec<Position>,
    pub color: Color,
    pub alive: bool,
    pub paused: bool,
    pub is_me: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    pub state: AppState,
    pub players: Vec<SlotView>,
    pub food: Position,
    pub food_color: Color,
    pub my_score: i32,
    pub remaining_seconds: u64,
    pub session_id: Option<String>,
    pub available_sessions: Vec<String>,
    pub winner: Option<usize>,
    pub paused_by: Option<String>,
    pub is_host: bool,
}

impl RenderSnapshot {
    pub fn capture(ctx: &GameContext, state: AppState, now: u64) -> Self {
        let my_index = ctx.roster.my_index();
        let players = ctx
            .roster
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active && !slot.is_vacant())
            .filter_map(|(index, slot)| {
                let snake = slot.snake.as_ref()?;
                Some(SlotView {
                    index,
                    peer_id: slot.peer_id.clone(),
                    body: snake.body().iter().copied().collect(),
                    color: snake.color(),
                    alive: snake.is_alive(),
                    paused: slot.paused,
                    is_me: my_index == Some(index),
                })
            })
            .collect();

        let elapsed = ctx.elapsed(now);
        Self {
            state,
            players,
            food: ctx.food.position(),
            food_color: ctx.food.color(),
            my_score: ctx.roster.my_snake().map(|s| s.score()).unwrap_or(0),
            remaining_seconds: ctx.match_state.remaining_seconds(elapsed),
            session_id: ctx.network.session_id().map(str::to_string),
            available_sessions: ctx.network.available_sessions().to_vec(),
            winner: ctx.match_state.winner(),
            paused_by: ctx.match_state.paused_by().map(str::to_string),
            is_host: ctx.network.is_host(),
        }
    }

    /// One-line summary for the headless shell
    pub fn summary(&self) -> String {
        let mut line = format!(
            "[{}] score {} | {}s left | food ({}, {}) | {} player(s)",
            self.state,
            self.my_score,
            self.remaining_seconds,
            self.food.x,
            self.food.y,
            self.players.len()
        );
        if let Some(session) = &self.session_id {
            line.push_str(&format!(
                " | session {}{}",
                session,
                if self.is_host { " (host)" } else { "" }
            ));
        }
        if let Some(by) = &self.paused_by {
            line.push_str(&format!(" | paused by {}", by));
        }
        if self.state == AppState::MatchEnd {
            match self.winner {
                Some(index) => line.push_str(&format!(" | winner: slot {}", index + 1)),
                None => line.push_str(" | draw"),
            }
        }
        line
    }
}
