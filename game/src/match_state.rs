//! Match timing, pause bookkeeping and winner resolution

use crate::roster::PlayerSlot;
use log::{debug, info};

/// All timestamps are milliseconds on the authority's clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    start_time: u64,
    /// Elapsed time as last broadcast by the host
    synced_elapsed_ms: u64,
    total_paused_ms: u64,
    pause_start: Option<u64>,
    winner: Option<usize>,
    paused_by: Option<String>,
    duration_ms: u64,
}

impl MatchState {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            start_time: 0,
            synced_elapsed_ms: 0,
            total_paused_ms: 0,
            pause_start: None,
            winner: None,
            paused_by: None,
            duration_ms: duration_secs * 1000,
        }
    }

    /// Starts a fresh match at `now`
    pub fn start(&mut self, now: u64) {
        self.start_time = now;
        self.synced_elapsed_ms = 0;
        self.total_paused_ms = 0;
        self.pause_start = None;
        self.winner = None;
        self.paused_by = None;
    }

    /// Returns false if already paused
    pub fn pause(&mut self, by: &str, now: u64) -> bool {
        if self.is_paused() {
            return false;
        }
        info!("Match paused by {}", by);
        self.paused_by = Some(by.to_string());
        self.pause_start = Some(now);
        true
    }

    /// Folds the finished pause into the paused total. Returns false if not
    /// paused.
    pub fn resume(&mut self, now: u64) -> bool {
        if !self.is_paused() {
            return false;
        }
        if let Some(start) = self.pause_start.take() {
            self.total_paused_ms += now.saturating_sub(start);
        }
        if let Some(by) = self.paused_by.take() {
            info!("Match resumed (paused by {})", by);
        }
        true
    }

    /// Takes over the host's pause, replacing any local one
    pub fn adopt_pause(&mut self, by: &str, start: u64) {
        if self.paused_by.as_deref() != Some(by) || self.pause_start != Some(start) {
            debug!("Adopting pause by {} from {}", by, start);
        }
        self.paused_by = Some(by.to_string());
        self.pause_start = Some(start);
    }

    pub fn is_paused(&self) -> bool {
        self.paused_by.is_some()
    }

    pub fn paused_by(&self) -> Option<&str> {
        self.paused_by.as_deref()
    }

    /// Elapsed match time on the local clock, excluding every pause
    pub fn elapsed(&self, now: u64) -> u64 {
        let wall = now.saturating_sub(self.start_time);
        let in_progress = self
            .pause_start
            .map(|start| now.saturating_sub(start))
            .unwrap_or(0);
        wall.saturating_sub(self.total_paused_ms + in_progress)
    }

    pub fn remaining_seconds(&self, elapsed_ms: u64) -> u64 {
        let remaining = self.duration_ms.saturating_sub(elapsed_ms);
        (remaining + 999) / 1000
    }

    pub fn is_expired(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.duration_ms
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn set_start_time(&mut self, start_time: u64) {
        self.start_time = start_time;
    }

    pub fn synced_elapsed(&self) -> u64 {
        self.synced_elapsed_ms
    }

    pub fn set_synced_elapsed(&mut self, elapsed_ms: u64) {
        self.synced_elapsed_ms = elapsed_ms;
    }

    pub fn total_paused(&self) -> u64 {
        self.total_paused_ms
    }

    pub fn set_total_paused(&mut self, total_paused_ms: u64) {
        self.total_paused_ms = total_paused_ms;
    }

    pub fn pause_start(&self) -> Option<u64> {
        self.pause_start
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn set_winner(&mut self, winner: Option<usize>) {
        self.winner = winner;
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// Longest active snake wins, ties broken by score. A tie on both, or no
/// active player at all, yields no winner.
pub fn resolve_winner(slots: &[PlayerSlot]) -> Option<usize> {
    let mut winner = None;
    let mut best = (0usize, i32::MIN);
    let mut tied = false;

    for (index, slot) in slots.iter().enumerate() {
        if !slot.active || slot.is_vacant() {
            continue;
        }
        let Some(snake) = slot.snake.as_ref() else {
            continue;
        };

        let candidate = (snake.len(), snake.score());
        if winner.is_none() || candidate > best {
            winner = Some(index);
            best = candidate;
            tied = false;
        } else if candidate == best {
            tied = true;
        }
    }

    if tied {
        None
    } else {
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::snake_for;
    use shared::Position;
    use std::collections::VecDeque;

    fn slot_with(len: usize, score: i32, index: usize) -> PlayerSlot {
        let mut snake = snake_for(index);
        let body: VecDeque<Position> = (0..len as i32).map(|x| Position::new(x, index as i32)).collect();
        snake.set_body(body);
        snake.set_score(score);
        PlayerSlot {
            snake: Some(snake),
            peer_id: format!("p{}", index),
            active: true,
            paused: false,
            last_sent_ms: 0,
        }
    }

    #[test]
    fn test_winner_tie_broken_by_score() {
        let slots = vec![slot_with(5, 10, 0), slot_with(5, 20, 1), slot_with(3, 5, 2)];
        assert_eq!(resolve_winner(&slots), Some(1));
    }

    #[test]
    fn test_full_tie_has_no_winner() {
        let slots = vec![slot_with(4, 10, 0), slot_with(4, 10, 1)];
        assert_eq!(resolve_winner(&slots), None);
    }

    #[test]
    fn test_tie_beaten_later_clears_tie() {
        let slots = vec![slot_with(4, 10, 0), slot_with(4, 10, 1), slot_with(6, 0, 2)];
        assert_eq!(resolve_winner(&slots), Some(2));
    }

    #[test]
    fn test_no_active_players_no_winner() {
        let mut slots = vec![slot_with(4, 10, 0)];
        slots[0].active = false;
        assert_eq!(resolve_winner(&slots), None);
        assert_eq!(resolve_winner(&[]), None);
    }

    #[test]
    fn test_pause_timing_excludes_paused_interval() {
        let mut state = MatchState::new(120);
        state.start(1_000);

        assert_eq!(state.elapsed(11_000), 10_000);
        assert!(state.pause("p1", 11_000));
        assert!(!state.pause("p2", 12_000));
        assert_eq!(state.paused_by(), Some("p1"));
        assert_eq!(state.elapsed(14_000), 10_000);

        assert!(state.resume(16_000));
        assert_eq!(state.total_paused(), 5_000);
        assert!(!state.is_paused());
        assert_eq!(state.pause_start(), None);
        assert_eq!(state.elapsed(20_000), 14_000);
        assert!(!state.resume(21_000));
    }

    #[test]
    fn test_adopt_pause_replaces_local_pause() {
        let mut state = MatchState::new(120);
        state.start(0);
        assert!(state.pause("local", 1_200));

        state.adopt_pause("host", 1_000);
        assert_eq!(state.paused_by(), Some("host"));
        assert_eq!(state.pause_start(), Some(1_000));

        assert!(state.resume(3_000));
        assert_eq!(state.total_paused(), 2_000);
    }

    #[test]
    fn test_remaining_seconds_and_expiry() {
        let state = MatchState::new(120);
        assert_eq!(state.remaining_seconds(0), 120);
        assert_eq!(state.remaining_seconds(119_001), 1);
        assert_eq!(state.remaining_seconds(200_000), 0);
        assert!(state.is_expired(120_000));
        assert!(!state.is_expired(119_999));
    }

    #[test]
    fn test_start_clears_previous_match() {
        let mut state = MatchState::new(120);
        state.start(0);
        state.pause("p", 10);
        state.set_winner(Some(2));

        state.start(500);
        assert_eq!(state.start_time(), 500);
        assert!(!state.is_paused());
        assert_eq!(state.winner(), None);
        assert_eq!(state.total_paused(), 0);
    }
}
