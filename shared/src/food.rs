use crate::config::{Color, FOOD_COLOR, GRID_HEIGHT, GRID_WIDTH, MAX_FOOD_SPAWN_ATTEMPTS};
use crate::grid::{spawn_free, OccupancyMap, Position, Spawn};
use log::warn;
use rand::Rng;

/// The single food cell on the board. Respawned in place, never recreated.
#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    pos: Position,
    color: Color,
}

impl Default for Food {
    fn default() -> Self {
        Self::new()
    }
}

impl Food {
    pub fn new() -> Self {
        Self {
            pos: Position::new(GRID_WIDTH / 2, GRID_HEIGHT / 2),
            color: FOOD_COLOR,
        }
    }

    /// Moves the food to a random free cell.
    ///
    /// A nearly full grid is expected late in a match; when the attempt
    /// budget runs out the last draw is kept even if occupied.
    pub fn spawn<R: Rng + ?Sized>(&mut self, occupancy: &OccupancyMap, rng: &mut R) -> Position {
        let spawn = spawn_free(occupancy, rng, MAX_FOOD_SPAWN_ATTEMPTS);
        if let Spawn::Exhausted(pos) = spawn {
            warn!(
                "No free cell for food after {} attempts, placing at ({}, {})",
                MAX_FOOD_SPAWN_ATTEMPTS, pos.x, pos.y
            );
        }
        self.pos = spawn.position();
        self.pos
    }

    pub fn set_position(&mut self, pos: Position) {
        self.pos = pos;
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn color(&self) -> Color {
        self.color
    }
}
