use crate::constants::HUNTER_KEEP_FACING_DISTANCE;
use crate::pathfinding::{a_star, first_step};
use crate::types::{Direction, Pos};

use super::BrainContext;

/// Power-pellet phase: chase the closest frightened ghost down with
/// shortest paths, and camp the ghost house once every target is gone.
pub struct HunterBrain;

impl HunterBrain {
    pub fn decide(&self, ctx: &BrainContext) -> Option<Direction> {
        let target = ctx
            .ghosts
            .iter()
            .filter(|g| g.frightened)
            .min_by_key(|g| ctx.maze.distance(ctx.pacman, g.position))
            .map(|g| g.position);

        match target {
            Some(target) => self.chase(ctx, target),
            None => self.camp_ghost_house(ctx),
        }
    }

    fn chase(&self, ctx: &BrainContext, target: Pos) -> Option<Direction> {
        let distance = ctx.maze.distance(ctx.pacman, target);
        if distance > HUNTER_KEEP_FACING_DISTANCE {
            if let Some(dir) = self.keep_facing(ctx, target) {
                return Some(dir);
            }
        }
        let path = a_star(ctx.maze, ctx.pacman, target);
        first_step(ctx.maze, &path)
    }

    /// On a long approach, stick with the current facing as long as it is
    /// within one tile of the best possible next cell.
    fn keep_facing(&self, ctx: &BrainContext, target: Pos) -> Option<Direction> {
        let raw = ctx.pacman.step(ctx.facing);
        if !ctx.maze.is_walkable(raw) {
            return None;
        }
        let ahead = ctx.maze.apply_teleport(raw);
        let best_next = Direction::ALL
            .iter()
            .filter_map(|dir| {
                let candidate = ctx.pacman.step(*dir);
                if ctx.maze.is_walkable(candidate) {
                    Some(ctx.maze.distance(ctx.maze.apply_teleport(candidate), target))
                } else {
                    None
                }
            })
            .min()?;
        if ctx.maze.distance(ahead, target) <= best_next + 1 {
            Some(ctx.facing)
        } else {
            None
        }
    }

    /// Every frightened ghost is respawning: head for the ghost house and
    /// loiter there until one comes back.
    fn camp_ghost_house(&self, ctx: &BrainContext) -> Option<Direction> {
        let house = ctx.maze.starts().ghost_house;
        if ctx.pacman == house {
            let ahead = ctx.pacman.step(ctx.facing);
            if ctx.maze.is_walkable(ahead) {
                return Some(ctx.facing);
            }
            return Direction::ALL
                .into_iter()
                .find(|dir| ctx.maze.is_walkable(ctx.pacman.step(*dir)));
        }
        let path = a_star(ctx.maze, ctx.pacman, house);
        first_step(ctx.maze, &path)
    }
}
