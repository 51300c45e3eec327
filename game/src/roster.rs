//! Fixed-capacity player slots indexed by slot id

use log::{info, warn};
use shared::config::{MAX_PLAYERS, PLAYER_COLORS, PLAYER_SPAWN};
use shared::{Position, Snake};

#[derive(Debug, Clone, Default)]
pub struct PlayerSlot {
    /// None until a body is known; clients learn it from the host's next sync
    pub snake: Option<Snake>,
    /// Empty when vacant
    pub peer_id: String,
    pub active: bool,
    pub paused: bool,
    /// Last outbound per-actor update, for throttling
    pub last_sent_ms: u64,
}

impl PlayerSlot {
    pub fn is_vacant(&self) -> bool {
        self.peer_id.is_empty()
    }
}

/// Deterministic head position for a fresh snake in `index`
pub fn spawn_for(index: usize) -> Position {
    let (x, y) = PLAYER_SPAWN[index % MAX_PLAYERS];
    Position::new(x, y)
}

pub fn snake_for(index: usize) -> Snake {
    Snake::new(PLAYER_COLORS[index % MAX_PLAYERS], spawn_for(index))
}

/// Peers entering or leaving through a roster merge
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RosterChange {
    pub added: Vec<usize>,
    pub removed: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PlayerRoster {
    slots: [PlayerSlot; MAX_PLAYERS],
    my_index: Option<usize>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats `peer_id` in the first free slot with a fresh snake. Returns
    /// the existing slot when already seated, None when full.
    pub fn add(&mut self, peer_id: &str) -> Option<usize> {
        if let Some(index) = self.find(peer_id) {
            return Some(index);
        }

        let index = self.slots.iter().position(PlayerSlot::is_vacant)?;
        self.slots[index] = PlayerSlot {
            snake: Some(snake_for(index)),
            peer_id: peer_id.to_string(),
            active: true,
            paused: false,
            last_sent_ms: 0,
        };
        info!("Player {} takes slot {}", peer_id, index);
        Some(index)
    }

    /// Seats `peer_id` in `index` without a body, evicting whoever held it
    pub fn add_at(&mut self, index: usize, peer_id: &str) -> bool {
        if index >= MAX_PLAYERS || peer_id.is_empty() {
            return false;
        }
        if self.slots[index].peer_id == peer_id {
            return true;
        }

        // At most one slot per peer
        if let Some(previous) = self.find(peer_id) {
            self.clear_slot(previous);
        }
        if !self.slots[index].is_vacant() {
            warn!(
                "Slot {} reassigned from {} to {}",
                index, self.slots[index].peer_id, peer_id
            );
            self.clear_slot(index);
        }

        self.slots[index] = PlayerSlot {
            snake: None,
            peer_id: peer_id.to_string(),
            active: true,
            paused: false,
            last_sent_ms: 0,
        };
        true
    }

    fn clear_slot(&mut self, index: usize) {
        self.slots[index] = PlayerSlot::default();
        if self.my_index == Some(index) {
            self.my_index = None;
        }
    }

    /// Frees the slot held by `peer_id`
    pub fn remove(&mut self, peer_id: &str) -> Option<usize> {
        let index = self.find(peer_id)?;
        self.clear_slot(index);
        info!("Player {} left slot {}", peer_id, index);
        Some(index)
    }

    pub fn find(&self, peer_id: &str) -> Option<usize> {
        if peer_id.is_empty() {
            return None;
        }
        self.slots.iter().position(|slot| slot.peer_id == peer_id)
    }

    /// Aligns the slots with the host's slot-indexed roster. Adopts the own
    /// slot when `my_peer_id` shows up and none is assigned yet.
    pub fn merge_roster(&mut self, roster: &[String], my_peer_id: Option<&str>) -> RosterChange {
        let mut change = RosterChange::default();

        for index in 0..MAX_PLAYERS {
            let wanted = roster.get(index).map(String::as_str).unwrap_or("");
            let current = self.slots[index].peer_id.clone();
            if current == wanted {
                continue;
            }

            if !current.is_empty() && !roster.iter().any(|id| *id == current) {
                change.removed.push(current);
            }
            if wanted.is_empty() {
                self.clear_slot(index);
            } else if self.add_at(index, wanted) {
                change.added.push(index);
            }
        }

        if self.my_index.is_none() {
            if let Some(me) = my_peer_id {
                if let Some(index) = self.find(me) {
                    info!("Assigned slot {}", index);
                    self.my_index = Some(index);
                }
            }
        }

        change
    }

    /// Slot-indexed peer ids with "" for vacant slots
    pub fn peer_ids(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.peer_id.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
        self.my_index = None;
    }

    /// Puts every seated player back at its deterministic spawn, zero score
    pub fn reset_for_new_match(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_vacant() {
                continue;
            }
            slot.paused = false;
            slot.last_sent_ms = 0;
            match slot.snake.as_mut() {
                Some(snake) => snake.reset_for_new_match(spawn_for(index)),
                None => slot.snake = Some(snake_for(index)),
            }
        }
    }

    pub fn slot(&self, index: usize) -> Option<&PlayerSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut PlayerSlot> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[PlayerSlot] {
        &self.slots
    }

    /// Indices of seated, active slots holding a snake
    pub fn active_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active && !slot.is_vacant() && slot.snake.is_some())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_vacant()).count()
    }

    pub fn my_index(&self) -> Option<usize> {
        self.my_index
    }

    pub fn set_my_index(&mut self, index: Option<usize>) {
        self.my_index = index.filter(|i| *i < MAX_PLAYERS);
    }

    pub fn my_slot(&self) -> Option<&PlayerSlot> {
        self.my_index.and_then(|i| self.slots.get(i))
    }

    pub fn my_slot_mut(&mut self) -> Option<&mut PlayerSlot> {
        self.my_index.and_then(|i| self.slots.get_mut(i))
    }

    pub fn my_snake(&self) -> Option<&Snake> {
        self.my_slot().and_then(|slot| slot.snake.as_ref())
    }

    pub fn my_snake_mut(&mut self) -> Option<&mut Snake> {
        self.my_slot_mut().and_then(|slot| slot.snake.as_mut())
    }
}
