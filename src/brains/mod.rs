use std::collections::HashSet;
use std::sync::Arc;

use crate::constants::HUNTER_MIN_REMAINING_MS;
use crate::maze::Maze;
use crate::types::{Direction, GameMode, Pos};

mod defensive;
mod hunter;
mod tabular;

pub use defensive::DefensiveBrain;
pub use hunter::HunterBrain;
pub use tabular::{pack_position, pack_state, TabularPolicy};

/// The immutable view a brain receives of one ghost.
#[derive(Clone, Copy, Debug)]
pub struct GhostObservation {
    pub position: Pos,
    pub direction: Direction,
    pub frightened: bool,
}

/// Read-only slice of room state handed to a brain each tick.
#[derive(Clone, Copy)]
pub struct BrainContext<'a> {
    pub maze: &'a Maze,
    pub pacman: Pos,
    pub facing: Direction,
    pub ghosts: &'a [GhostObservation],
    pub dots: &'a HashSet<(i32, i32)>,
    pub pellets: &'a HashSet<(i32, i32)>,
    pub step_count: u64,
}

impl BrainContext<'_> {
    pub fn food_remaining(&self) -> usize {
        self.dots.len() + self.pellets.len()
    }

    pub fn min_threat_distance(&self) -> Option<i32> {
        self.ghosts
            .iter()
            .filter(|g| !g.frightened)
            .map(|g| self.maze.distance(self.pacman, g.position))
            .min()
    }

    pub fn nearest_food(&self) -> Option<Pos> {
        self.dots
            .iter()
            .chain(self.pellets.iter())
            .map(|&(x, y)| Pos::new(x, y))
            .min_by_key(|p| (self.maze.distance(self.pacman, *p), p.y, p.x))
    }
}

/// Wraps the three decision modules and emits one direction per tick.
pub struct PacmanController {
    defensive: DefensiveBrain,
    hunter: HunterBrain,
    policy: Option<Arc<TabularPolicy>>,
}

impl PacmanController {
    pub fn new(search_depth: u32, policy: Option<Arc<TabularPolicy>>) -> Self {
        Self {
            defensive: DefensiveBrain::new(search_depth),
            hunter: HunterBrain,
            policy,
        }
    }

    pub fn set_search_depth(&mut self, depth: u32) {
        self.defensive.set_search_depth(depth);
    }

    /// `None` means no decision; the room keeps Pac-Man's current facing.
    pub fn decide(
        &self,
        ctx: &BrainContext,
        mode: GameMode,
        frightened_remaining_ms: u64,
    ) -> Option<Direction> {
        if let Some(policy) = &self.policy {
            return policy.select_action(ctx);
        }
        if mode == GameMode::Frightened && frightened_remaining_ms > HUNTER_MIN_REMAINING_MS {
            return self.hunter.decide(ctx);
        }
        self.defensive.find_best_direction(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_sets() -> (HashSet<(i32, i32)>, HashSet<(i32, i32)>) {
        (HashSet::new(), HashSet::new())
    }

    #[test]
    fn controller_routes_to_hunter_during_frightened() {
        let maze = Maze::standard();
        let (dots, pellets) = empty_sets();
        let ghosts = [GhostObservation {
            position: Pos::new(16, 20),
            direction: Direction::Left,
            frightened: true,
        }];
        let ctx = BrainContext {
            maze,
            pacman: Pos::new(10, 20),
            facing: Direction::Right,
            ghosts: &ghosts,
            dots: &dots,
            pellets: &pellets,
            step_count: 0,
        };
        let controller = PacmanController::new(4, None);
        let toward = controller
            .decide(&ctx, GameMode::Frightened, 5_000)
            .expect("hunter decides");
        // The frightened ghost sits to the right along an open row.
        assert_eq!(toward, Direction::Right);
    }

    #[test]
    fn controller_falls_back_to_defensive_when_frightened_nearly_over() {
        let maze = Maze::standard();
        let mut dots = HashSet::new();
        dots.insert((12, 20));
        let pellets = HashSet::new();
        let ghosts = [GhostObservation {
            position: Pos::new(16, 20),
            direction: Direction::Left,
            frightened: true,
        }];
        let ctx = BrainContext {
            maze,
            pacman: Pos::new(10, 20),
            facing: Direction::Right,
            ghosts: &ghosts,
            dots: &dots,
            pellets: &pellets,
            step_count: 0,
        };
        let controller = PacmanController::new(4, None);
        // 500ms left: the hunter must not be consulted any more.
        let decision = controller.decide(&ctx, GameMode::Frightened, 500);
        assert!(decision.is_some());
    }
}
