//! Grid coordinates, headings and the sparse occupancy map every
//! placement and collision decision is built on.

use crate::config::{GRID_HEIGHT, GRID_WIDTH, INITIAL_SNAKE_LENGTH};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Integer grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        (0..GRID_WIDTH).contains(&self.x) && (0..GRID_HEIGHT).contains(&self.y)
    }

    /// Neighbouring cell one step in `direction`; `None` stays in place.
    pub fn step(&self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    /// Occupancy key of the cell, `y * GRID_WIDTH + x`.
    pub fn cell_key(&self) -> i32 {
        self.y * GRID_WIDTH + self.x
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    #[default]
    None,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::None => Direction::None,
        }
    }

    /// Grid delta, y grows downwards.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::None => (0, 0),
        }
    }
}

/// Sparse set of filled grid cells.
///
/// Rebuilt wholesale at the start of a simulation tick, then kept current
/// with `mark`/`clear` while heads advance and tails retract so lookups
/// stay O(1) without rebuilding per actor.
#[derive(Debug, Clone, Default)]
pub struct OccupancyMap {
    cells: HashSet<i32>,
}

/// 4 players with ~100 segments each
const OCCUPANCY_RESERVE: usize = 400;

impl OccupancyMap {
    pub fn new() -> Self {
        Self {
            cells: HashSet::with_capacity(OCCUPANCY_RESERVE),
        }
    }

    /// Replaces the contents with exactly the given segments.
    pub fn rebuild<'a, I>(&mut self, segments: I)
    where
        I: IntoIterator<Item = &'a Position>,
    {
        self.cells.clear();
        for segment in segments {
            self.mark(*segment);
        }
    }

    /// Marks a cell as filled. Out-of-bounds cells are never recorded.
    pub fn mark(&mut self, pos: Position) {
        if pos.in_bounds() {
            self.cells.insert(pos.cell_key());
        }
    }

    pub fn clear(&mut self, pos: Position) {
        if pos.in_bounds() {
            self.cells.remove(&pos.cell_key());
        }
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        pos.in_bounds() && self.cells.contains(&pos.cell_key())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.cells.len() >= (GRID_WIDTH * GRID_HEIGHT) as usize
    }
}

/// Outcome of a bounded random placement draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spawn {
    /// The draw found an unoccupied cell.
    Free(Position),
    /// The attempt budget ran out; carries the last sampled cell, which may
    /// be occupied.
    Exhausted(Position),
}

impl Spawn {
    pub fn position(&self) -> Position {
        match self {
            Spawn::Free(pos) | Spawn::Exhausted(pos) => *pos,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Spawn::Free(_))
    }
}

/// Draws uniform random cells until one is unoccupied or `max_attempts`
/// draws have been made.
pub fn spawn_free<R: Rng + ?Sized>(map: &OccupancyMap, rng: &mut R, max_attempts: usize) -> Spawn {
    let mut last = Position::new(0, 0);
    for _ in 0..max_attempts.max(1) {
        last = Position::new(rng.gen_range(0..GRID_WIDTH), rng.gen_range(0..GRID_HEIGHT));
        if !map.is_occupied(last) {
            return Spawn::Free(last);
        }
    }
    Spawn::Exhausted(last)
}

/// Like [`spawn_free`] for a fresh snake head: the cells the initial body
/// extends into (towards -x) must be free and inside the grid too.
pub fn spawn_free_for_snake<R: Rng + ?Sized>(
    map: &OccupancyMap,
    rng: &mut R,
    max_attempts: usize,
) -> Spawn {
    let tail_reach = INITIAL_SNAKE_LENGTH as i32 - 1;
    let mut last = Position::new(tail_reach, 0);
    for _ in 0..max_attempts.max(1) {
        last = Position::new(
            rng.gen_range(tail_reach..GRID_WIDTH),
            rng.gen_range(0..GRID_HEIGHT),
        );
        let body_free = (0..=tail_reach).all(|offset| {
            let cell = Position::new(last.x - offset, last.y);
            cell.in_bounds() && !map.is_occupied(cell)
        });
        if body_free {
            return Spawn::Free(last);
        }
    }
    Spawn::Exhausted(last)
}
