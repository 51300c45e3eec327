use crate::config::{
    Color, DEATH_SCORE_PENALTY, FOOD_SCORE_VALUE, INITIAL_SNAKE_LENGTH, MAX_SCORE,
};
use crate::grid::{Direction, Position};
use std::collections::VecDeque;

/// A player-controlled body of grid cells.
///
/// The head is the front of `body`. The body is never empty: every
/// constructor and reset produces [`INITIAL_SNAKE_LENGTH`] segments and
/// [`Snake::set_body`] refuses empty input.
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    body: VecDeque<Position>,
    direction: Direction,
    next_direction: Direction,
    color: Color,
    alive: bool,
    score: i32,
}

fn initial_body(head: Position) -> VecDeque<Position> {
    (0..INITIAL_SNAKE_LENGTH as i32)
        .map(|offset| Position::new(head.x - offset, head.y))
        .collect()
}

impl Snake {
    pub fn new(color: Color, start: Position) -> Self {
        Self {
            body: initial_body(start),
            direction: Direction::None,
            next_direction: Direction::None,
            color,
            alive: true,
            score: 0,
        }
    }

    /// Queues a heading for the next [`Snake::update`].
    ///
    /// While moving, the exact reverse of the current heading is ignored.
    /// Before the first move any heading is accepted; if it points back into
    /// the body the segment order is flipped so the snake leaves from the
    /// other end instead of biting itself.
    pub fn set_direction(&mut self, dir: Direction) {
        if dir == Direction::None {
            return;
        }

        if self.direction == Direction::None {
            if self.body.len() > 1 && self.head().step(dir) == self.body[1] {
                self.body.make_contiguous().reverse();
            }
            self.next_direction = dir;
            return;
        }

        if dir != self.direction.opposite() {
            self.next_direction = dir;
        }
    }

    /// Commits the pending heading and advances one cell. Length is kept.
    pub fn update(&mut self) {
        if !self.alive {
            return;
        }

        self.direction = self.next_direction;
        if self.direction == Direction::None {
            return;
        }

        let new_head = self.head().step(self.direction);
        self.body.push_front(new_head);
        self.body.pop_back();
    }

    /// Duplicates the tail so the next update's pop leaves the body one longer.
    pub fn grow(&mut self) {
        if let Some(&tail) = self.body.back() {
            self.body.push_back(tail);
        }
        self.score = (self.score + FOOD_SCORE_VALUE).min(MAX_SCORE);
    }

    fn reset(&mut self, spawn: Position) {
        self.body = initial_body(spawn);
        self.direction = Direction::None;
        self.next_direction = Direction::None;
        self.alive = true;
    }

    pub fn reset_for_new_match(&mut self, spawn: Position) {
        self.reset(spawn);
        self.score = 0;
    }

    /// Respawn after dying mid-match; the death penalty is charged, never
    /// below zero.
    pub fn reset_after_death(&mut self, spawn: Position) {
        self.reset(spawn);
        self.score = (self.score - DEATH_SCORE_PENALTY).max(0);
    }

    /// Overwrites the body with an authoritative snapshot. Returns false and
    /// leaves the body untouched when `body` is empty.
    pub fn set_body(&mut self, body: VecDeque<Position>) -> bool {
        if body.is_empty() {
            return false;
        }
        self.body = body;
        true
    }

    pub fn body(&self) -> &VecDeque<Position> {
        &self.body
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn tail(&self) -> Position {
        self.body[self.body.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn next_direction(&self) -> Direction {
        self.next_direction
    }

    pub fn is_moving(&self) -> bool {
        self.direction != Direction::None
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn set_score(&mut self, score: i32) {
        self.score = score.clamp(0, MAX_SCORE);
    }

    /// Head overlaps any later segment.
    pub fn self_collision(&self) -> bool {
        let head = self.head();
        self.body.iter().skip(1).any(|segment| *segment == head)
    }

    pub fn boundary_collision(&self) -> bool {
        !self.head().in_bounds()
    }

    /// `pos` lies on any segment of this body.
    pub fn collides_with(&self, pos: Position) -> bool {
        self.body.contains(&pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PLAYER_COLORS;

    fn snake_at(x: i32, y: i32) -> Snake {
        Snake::new(PLAYER_COLORS[0], Position::new(x, y))
    }

    #[test]
    fn test_snake_creation() {
        let snake = snake_at(10, 5);
        assert_eq!(snake.len(), INITIAL_SNAKE_LENGTH);
        assert_eq!(snake.head(), Position::new(10, 5));
        assert_eq!(snake.tail(), Position::new(8, 5));
        assert_eq!(snake.direction(), Direction::None);
        assert!(snake.is_alive());
        assert_eq!(snake.score(), 0);
    }

    #[test]
    fn test_idle_snake_does_not_move() {
        let mut snake = snake_at(10, 5);
        let before = snake.body().clone();
        snake.update();
        assert_eq!(snake.body(), &before);
    }

    #[test]
    fn test_move_one_cell_each_direction() {
        for dir in [Direction::Up, Direction::Down, Direction::Right] {
            let mut snake = snake_at(10, 10);
            snake.set_direction(dir);
            snake.update();
            let (dx, dy) = dir.delta();
            assert_eq!(snake.head(), Position::new(10 + dx, 10 + dy));
            assert_eq!(snake.len(), INITIAL_SNAKE_LENGTH);
        }
    }

    #[test]
    fn test_reverse_rejected_while_moving() {
        let mut snake = snake_at(10, 10);
        snake.set_direction(Direction::Right);
        snake.update();
        snake.set_direction(Direction::Left);
        snake.update();
        assert_eq!(snake.direction(), Direction::Right);
        assert_eq!(snake.head(), Position::new(12, 10));
    }

    #[test]
    fn test_initial_heading_into_body_flips_segments() {
        let mut snake = snake_at(10, 10);
        snake.set_direction(Direction::Left);
        assert_eq!(snake.head(), Position::new(8, 10));

        snake.update();
        assert_eq!(snake.head(), Position::new(7, 10));
        assert!(!snake.self_collision());
        assert_eq!(snake.len(), INITIAL_SNAKE_LENGTH);
    }

    #[test]
    fn test_none_direction_ignored() {
        let mut snake = snake_at(10, 10);
        snake.set_direction(Direction::Up);
        snake.set_direction(Direction::None);
        assert_eq!(snake.next_direction(), Direction::Up);
    }

    #[test]
    fn test_grow_extends_after_next_update() {
        let mut snake = snake_at(10, 10);
        snake.set_direction(Direction::Down);
        let before = snake.len();

        snake.grow();
        snake.update();

        assert_eq!(snake.len(), before + 1);
        assert_eq!(snake.score(), FOOD_SCORE_VALUE);
    }

    #[test]
    fn test_reset_score_rules() {
        let mut snake = snake_at(10, 10);
        snake.set_score(25);
        snake.reset_after_death(Position::new(20, 20));
        assert_eq!(snake.score(), 25 - DEATH_SCORE_PENALTY);
        assert_eq!(snake.head(), Position::new(20, 20));
        assert_eq!(snake.direction(), Direction::None);

        snake.set_score(5);
        snake.reset_after_death(Position::new(20, 20));
        assert_eq!(snake.score(), 0);

        snake.set_score(300);
        snake.reset_for_new_match(Position::new(5, 5));
        assert_eq!(snake.score(), 0);
        assert_eq!(snake.len(), INITIAL_SNAKE_LENGTH);
    }

    #[test]
    fn test_set_body_ignores_empty() {
        let mut snake = snake_at(10, 10);
        let before = snake.body().clone();
        assert!(!snake.set_body(VecDeque::new()));
        assert_eq!(snake.body(), &before);

        let body: VecDeque<Position> = [Position::new(1, 1), Position::new(1, 2)].into();
        assert!(snake.set_body(body.clone()));
        assert_eq!(snake.body(), &body);
    }

    #[test]
    fn test_collision_queries() {
        let mut snake = snake_at(1, 0);
        snake.set_direction(Direction::Up);
        snake.update();
        assert!(snake.boundary_collision());

        let coiled: VecDeque<Position> = [
            Position::new(5, 5),
            Position::new(6, 5),
            Position::new(6, 6),
            Position::new(5, 6),
            Position::new(5, 5),
        ]
        .into();
        let mut snake = snake_at(10, 10);
        snake.set_body(coiled);
        assert!(snake.self_collision());
        assert!(snake.collides_with(Position::new(6, 6)));
        assert!(!snake.collides_with(Position::new(7, 7)));
    }
}
