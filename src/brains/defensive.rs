use std::collections::HashSet;

use crate::constants::{
    AVOIDANCE_PENALTY, AVOIDANCE_RADIUS, CHOKE_WINDOW, DEATH_SENTINEL, DITHER_EXPLORE_BONUS,
    DITHER_EXPLORE_DANGER, DITHER_EXPLORE_FOOD, DITHER_STICKY_BONUS, EXPLORE_FOOD_RADIUS,
    EXPLORE_GHOST_RADIUS, FLOOD_DEPTH, FLOOD_SAFE_DISTANCE, GHOST_PROJECTION_SLACK,
    MAX_SEARCH_DEPTH, MIN_SEARCH_DEPTH, SAFE_EXPLORE_DISTANCE, URGENCY_GHOST_RADIUS, W_CHOKE,
    W_DANGER, W_DIST, W_EXPLORE, W_FRIGHT_BONUS, W_POSITION, W_PROGRESS, W_URGENCY,
};
use crate::maze::Maze;
use crate::pathfinding::{a_star_avoiding, first_step};
use crate::types::{Direction, Pos};

use super::BrainContext;

/// Bounded-depth predictive lookahead. Pac-Man branches on every walkable
/// move; each ghost is collapsed to a single deterministic projected move
/// per ply, so the alpha-beta cutoffs only ever fire on the Max layer.
pub struct DefensiveBrain {
    depth: u32,
}

#[derive(Clone, Copy, Debug)]
struct SearchGhost {
    pos: Pos,
    prev: Pos,
    dir: Direction,
    frightened: bool,
}

#[derive(Clone)]
struct SearchState<'a> {
    maze: &'a Maze,
    dots: &'a HashSet<(i32, i32)>,
    pellets: &'a HashSet<(i32, i32)>,
    /// Food consumed along the current search path; membership checks go
    /// through this ledger instead of cloning the sets per node.
    eaten: Vec<(i32, i32)>,
    pacman: Pos,
    prev_pacman: Pos,
    ghosts: Vec<SearchGhost>,
}

impl SearchState<'_> {
    fn food_remaining(&self) -> usize {
        self.dots.len() + self.pellets.len() - self.eaten.len()
    }

    fn consume(&mut self, p: Pos) {
        let key = p.key();
        if self.eaten.contains(&key) {
            return;
        }
        if self.dots.contains(&key) {
            self.eaten.push(key);
        } else if self.pellets.contains(&key) {
            self.eaten.push(key);
            for ghost in &mut self.ghosts {
                ghost.frightened = true;
            }
        }
    }

    fn min_threat_distance(&self) -> Option<i32> {
        self.ghosts
            .iter()
            .filter(|g| !g.frightened)
            .map(|g| self.maze.distance(self.pacman, g.pos))
            .min()
    }

    fn min_frightened_distance(&self) -> Option<i32> {
        self.ghosts
            .iter()
            .filter(|g| g.frightened)
            .map(|g| self.maze.distance(self.pacman, g.pos))
            .min()
    }

    fn nearest_food_distance(&self) -> Option<i32> {
        self.dots
            .iter()
            .chain(self.pellets.iter())
            .filter(|key| !self.eaten.contains(*key))
            .map(|&(x, y)| self.maze.distance(self.pacman, Pos::new(x, y)))
            .min()
    }

    fn threat_on_pacman(&self) -> bool {
        self.ghosts
            .iter()
            .any(|g| !g.frightened && g.pos == self.pacman)
    }

    /// Same-cell or same-ply swap with any non-frightened ghost.
    fn pacman_dead(&self) -> bool {
        self.ghosts.iter().any(|g| {
            !g.frightened
                && (g.pos == self.pacman
                    || (g.pos == self.prev_pacman && g.prev == self.pacman))
        })
    }

    /// Deterministic ghost projection: keep facing while that does not give
    /// up more than the slack toward Pac-Man, otherwise take the adjacent
    /// cell that closes the most distance.
    fn project_ghosts(&mut self) {
        let pacman = self.pacman;
        for ghost in &mut self.ghosts {
            ghost.prev = ghost.pos;
            let here = self.maze.distance(ghost.pos, pacman);
            let ahead_raw = ghost.pos.step(ghost.dir);
            if self.maze.is_walkable(ahead_raw) {
                let ahead = self.maze.apply_teleport(ahead_raw);
                if self.maze.distance(ahead, pacman) <= here + GHOST_PROJECTION_SLACK {
                    ghost.pos = ahead;
                    continue;
                }
            }
            let mut best: Option<(i32, Pos, Direction)> = None;
            for dir in Direction::ALL {
                let raw = ghost.pos.step(dir);
                if !self.maze.is_walkable(raw) {
                    continue;
                }
                let applied = self.maze.apply_teleport(raw);
                let d = self.maze.distance(applied, pacman);
                if best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, applied, dir));
                }
            }
            if let Some((_, pos, dir)) = best {
                ghost.pos = pos;
                ghost.dir = dir;
            }
        }
    }
}

impl DefensiveBrain {
    pub fn new(depth: u32) -> Self {
        Self {
            depth: depth.clamp(MIN_SEARCH_DEPTH, MAX_SEARCH_DEPTH),
        }
    }

    pub fn set_search_depth(&mut self, depth: u32) {
        self.depth = depth.clamp(MIN_SEARCH_DEPTH, MAX_SEARCH_DEPTH);
    }

    pub fn search_depth(&self) -> u32 {
        self.depth
    }

    pub fn find_best_direction(&self, ctx: &BrainContext) -> Option<Direction> {
        if let Some(dir) = self.safe_exploration(ctx) {
            return Some(dir);
        }

        let root = SearchState {
            maze: ctx.maze,
            dots: ctx.dots,
            pellets: ctx.pellets,
            eaten: Vec::new(),
            pacman: ctx.pacman,
            prev_pacman: ctx.pacman,
            ghosts: ctx
                .ghosts
                .iter()
                .map(|g| SearchGhost {
                    pos: g.position,
                    prev: g.position,
                    dir: g.direction,
                    frightened: g.frightened,
                })
                .collect(),
        };

        let threat_positions: Vec<Pos> = ctx
            .ghosts
            .iter()
            .filter(|g| !g.frightened)
            .map(|g| g.position)
            .collect();

        let mut scores: Vec<(Direction, f64)> = Vec::with_capacity(4);
        for dir in Direction::ALL {
            let raw = root.pacman.step(dir);
            if !root.maze.is_walkable(raw) {
                continue;
            }
            let mut child = root.clone();
            child.prev_pacman = child.pacman;
            child.pacman = child.maze.apply_teleport(raw);
            child.consume(child.pacman);
            child.project_ghosts();

            let mut value = if child.pacman_dead() {
                DEATH_SENTINEL
            } else {
                self.search(&child, self.depth.saturating_sub(1), f64::NEG_INFINITY, f64::INFINITY)
            };
            value += positional_advantage(ctx.maze, child.pacman, &threat_positions);
            value += choke_point_danger(ctx.maze, child.pacman, &threat_positions);
            scores.push((dir, value));
        }

        if scores.is_empty() {
            return None;
        }

        let best = scores
            .iter()
            .map(|(_, v)| *v)
            .fold(f64::NEG_INFINITY, f64::max);
        self.apply_anti_dither(ctx, &mut scores, best);

        scores
            .iter()
            .copied()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(dir, _)| dir)
    }

    /// Far from every threat with food on the board: skip the search and
    /// follow A* toward the nearest food. Deterministic and loop-free on
    /// nearly empty maps.
    fn safe_exploration(&self, ctx: &BrainContext) -> Option<Direction> {
        if ctx.food_remaining() == 0 {
            return None;
        }
        let far_enough = ctx
            .min_threat_distance()
            .map_or(true, |d| d > SAFE_EXPLORE_DISTANCE);
        if !far_enough {
            return None;
        }
        let target = ctx.nearest_food()?;
        let threats: Vec<Pos> = ctx
            .ghosts
            .iter()
            .filter(|g| !g.frightened)
            .map(|g| g.position)
            .collect();
        let path = a_star_avoiding(
            ctx.maze,
            ctx.pacman,
            target,
            &threats,
            AVOIDANCE_RADIUS,
            AVOIDANCE_PENALTY,
        );
        first_step(ctx.maze, &path)
    }

    fn search(&self, state: &SearchState, depth: u32, mut alpha: f64, beta: f64) -> f64 {
        if state.food_remaining() == 0 {
            return f64::INFINITY;
        }
        if state.threat_on_pacman() {
            return f64::NEG_INFINITY;
        }
        if depth == 0 {
            return evaluate(state);
        }

        let mut value = f64::NEG_INFINITY;
        let mut expanded = false;
        for dir in Direction::ALL {
            let raw = state.pacman.step(dir);
            if !state.maze.is_walkable(raw) {
                continue;
            }
            expanded = true;
            let mut child = state.clone();
            child.prev_pacman = child.pacman;
            child.pacman = child.maze.apply_teleport(raw);
            child.consume(child.pacman);
            child.project_ghosts();

            let v = if child.pacman_dead() {
                DEATH_SENTINEL
            } else {
                self.search(&child, depth - 1, alpha, beta)
            };
            value = value.max(v);
            alpha = alpha.max(value);
            if beta <= alpha {
                break;
            }
        }
        if !expanded {
            return evaluate(state);
        }
        value
    }

    fn apply_anti_dither(&self, ctx: &BrainContext, scores: &mut [(Direction, f64)], best: f64) {
        let Some(entry) = scores.iter_mut().find(|(dir, _)| *dir == ctx.facing) else {
            return;
        };
        let magnitude = best.abs();
        if !magnitude.is_finite() {
            return;
        }
        let exploring = ctx
            .min_threat_distance()
            .map_or(true, |d| d >= DITHER_EXPLORE_DANGER)
            && nearest_food_distance(ctx).map_or(true, |d| d >= DITHER_EXPLORE_FOOD);
        if exploring {
            entry.1 += DITHER_EXPLORE_BONUS * magnitude;
        } else if best - entry.1 < DITHER_STICKY_BONUS * magnitude {
            entry.1 += DITHER_STICKY_BONUS * magnitude;
        }
    }
}

fn nearest_food_distance(ctx: &BrainContext) -> Option<i32> {
    ctx.dots
        .iter()
        .chain(ctx.pellets.iter())
        .map(|&(x, y)| ctx.maze.distance(ctx.pacman, Pos::new(x, y)))
        .min()
}

/// Tier-1 evaluation used at leaves and cutoffs.
fn evaluate(state: &SearchState) -> f64 {
    if state.food_remaining() == 0 {
        return f64::INFINITY;
    }
    if state.threat_on_pacman() {
        return f64::NEG_INFINITY;
    }

    let mut score = 0.0;
    let threat = state.min_threat_distance();
    if let Some(d) = threat {
        score += W_DANGER / (d as f64 + 1.0);
    }
    score += state.eaten.len() as f64 * W_PROGRESS;
    let food = state.nearest_food_distance();
    if let Some(d) = food {
        score += d as f64 * W_DIST;
    }
    if let Some(d) = state.min_frightened_distance() {
        score += W_FRIGHT_BONUS / (d as f64 + 1.0);
    }
    if state.pellets.contains(&state.pacman.key()) {
        if let Some(d) = threat {
            if d <= URGENCY_GHOST_RADIUS {
                score += W_URGENCY / (d as f64 + 1.0);
            }
        }
    }
    let food_near = food.map_or(false, |d| d <= EXPLORE_FOOD_RADIUS);
    let danger_near = threat.map_or(false, |d| d <= EXPLORE_GHOST_RADIUS);
    if !food_near && !danger_near {
        score += W_EXPLORE;
    }
    score
}

/// Tier-2, root only: breadth-first flood to a bounded depth counting tiles
/// that stay clear of every threat.
fn positional_advantage(maze: &Maze, cell: Pos, threats: &[Pos]) -> f64 {
    let mut seen = HashSet::new();
    let mut frontier = vec![cell];
    seen.insert(cell.key());
    let mut safe_tiles = 0usize;
    for _ in 0..FLOOD_DEPTH {
        let mut next = Vec::new();
        for p in frontier {
            for n in maze.neighbors(p) {
                if seen.insert(n.key()) {
                    next.push(n);
                }
            }
        }
        frontier = next;
    }
    for &(x, y) in &seen {
        let p = Pos::new(x, y);
        let clear = threats
            .iter()
            .all(|ghost| maze.distance(p, *ghost) >= FLOOD_SAFE_DISTANCE);
        if clear {
            safe_tiles += 1;
        }
    }
    safe_tiles as f64 * W_POSITION
}

/// Tier-2, root only: intersections near the candidate cell that a threat
/// can reach quickly make the position worth less.
fn choke_point_danger(maze: &Maze, cell: Pos, threats: &[Pos]) -> f64 {
    if threats.is_empty() {
        return 0.0;
    }
    let mut danger = 0.0;
    for dy in -CHOKE_WINDOW..=CHOKE_WINDOW {
        for dx in -CHOKE_WINDOW..=CHOKE_WINDOW {
            let q = Pos::new(cell.x + dx, cell.y + dy);
            if !maze.is_walkable(q) || maze.walkable_degree(q) < 3 {
                continue;
            }
            for ghost in threats {
                danger += W_CHOKE / (maze.distance(*ghost, q) as f64 + 1.0);
            }
        }
    }
    danger
}
