use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::maze::Maze;
use crate::types::{Direction, Pos};

/// Shortest path from `src` to `dst`, inclusive of both. Returns `[src]`
/// when `dst` is unreachable. Ties on f are broken FIFO via a monotone
/// sequence number so equal-cost frontiers expand in insertion order.
pub fn a_star(maze: &Maze, src: Pos, dst: Pos) -> Vec<Pos> {
    a_star_with_cost(maze, src, dst, |_| 0)
}

/// A* variant that inflates the entry cost of cells near ghosts by
/// `(radius - d) * penalty`. Used by the fallback pathfinding mode only.
pub fn a_star_avoiding(
    maze: &Maze,
    src: Pos,
    dst: Pos,
    ghosts: &[Pos],
    radius: i32,
    penalty: i32,
) -> Vec<Pos> {
    a_star_with_cost(maze, src, dst, |cell| {
        ghosts
            .iter()
            .map(|ghost| maze.distance(cell, *ghost))
            .min()
            .map(|d| if d < radius { (radius - d) * penalty } else { 0 })
            .unwrap_or(0)
    })
}

fn a_star_with_cost<F>(maze: &Maze, src: Pos, dst: Pos, extra_cost: F) -> Vec<Pos>
where
    F: Fn(Pos) -> i32,
{
    let src = maze.apply_teleport(src);
    let dst = maze.apply_teleport(dst);
    if src == dst {
        return vec![src];
    }

    let mut open: BinaryHeap<Reverse<(i32, u64, (i32, i32))>> = BinaryHeap::new();
    let mut g_score: HashMap<(i32, i32), i32> = HashMap::new();
    let mut parent: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
    let mut seq = 0u64;

    g_score.insert(src.key(), 0);
    open.push(Reverse((maze.distance(src, dst), seq, src.key())));

    while let Some(Reverse((_, _, current_key))) = open.pop() {
        let current = Pos::new(current_key.0, current_key.1);
        if current == dst {
            return reconstruct(&parent, src, dst);
        }
        let current_g = g_score.get(&current_key).copied().unwrap_or(i32::MAX);

        for next in maze.neighbors(current) {
            let tentative = current_g + 1 + extra_cost(next);
            let known = g_score.get(&next.key()).copied().unwrap_or(i32::MAX);
            if tentative >= known {
                continue;
            }
            g_score.insert(next.key(), tentative);
            parent.insert(next.key(), current_key);
            seq += 1;
            open.push(Reverse((tentative + maze.distance(next, dst), seq, next.key())));
        }
    }

    vec![src]
}

fn reconstruct(parent: &HashMap<(i32, i32), (i32, i32)>, src: Pos, dst: Pos) -> Vec<Pos> {
    let mut path = vec![dst];
    let mut current = dst.key();
    while current != src.key() {
        let Some(prev) = parent.get(&current) else {
            return vec![src];
        };
        current = *prev;
        path.push(Pos::new(current.0, current.1));
    }
    path.reverse();
    path
}

/// Cardinal direction from `a` toward `b`: the axis with the larger
/// absolute delta wins, ties prefer horizontal. `None` when `a == b`.
pub fn direction_toward(a: Pos, b: Pos) -> Option<Direction> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx == 0 && dy == 0 {
        return None;
    }
    if dx.abs() >= dy.abs() {
        Some(if dx > 0 {
            Direction::Right
        } else {
            Direction::Left
        })
    } else {
        Some(if dy > 0 { Direction::Down } else { Direction::Up })
    }
}

/// Direction of the first move along `path`. A teleport jump in the path is
/// resolved back to the direction of the entry cell that produced it.
pub fn first_step(maze: &Maze, path: &[Pos]) -> Option<Direction> {
    if path.len() < 2 {
        return None;
    }
    let src = path[0];
    let next = path[1];
    if src.manhattan(next) == 1 {
        return direction_toward(src, next);
    }
    for dir in Direction::ALL {
        let raw = src.step(dir);
        if maze.is_walkable(raw) && maze.apply_teleport(raw) == next {
            return Some(dir);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_inclusive_and_stepwise() {
        let maze = Maze::standard();
        let src = Pos::new(1, 1);
        let dst = Pos::new(6, 1);
        let path = a_star(maze, src, dst);
        assert_eq!(path.first(), Some(&src));
        assert_eq!(path.last(), Some(&dst));
        assert_eq!(path.len() as i32 - 1, maze.distance(src, dst));
        for pair in path.windows(2) {
            assert!(maze.neighbors(pair[0]).contains(&pair[1]));
        }
    }

    #[test]
    fn trivial_path_is_just_src() {
        let maze = Maze::standard();
        let p = Pos::new(1, 1);
        assert_eq!(a_star(maze, p, p), vec![p]);
    }

    #[test]
    fn unreachable_target_returns_src() {
        let maze = Maze::standard();
        // (0,0) is a wall; nothing can reach it.
        let path = a_star(maze, Pos::new(1, 1), Pos::new(0, 0));
        assert_eq!(path, vec![Pos::new(1, 1)]);
    }

    #[test]
    fn path_uses_tunnel_when_shorter() {
        let maze = Maze::standard();
        let src = Pos::new(1, 15);
        let dst = Pos::new(26, 15);
        let path = a_star(maze, src, dst);
        // One step left onto the entry, resolved to the exit.
        assert_eq!(path.len(), 2);
        assert_eq!(first_step(maze, &path), Some(Direction::Left));
    }

    #[test]
    fn avoidance_detours_around_a_ghost() {
        let maze = Maze::standard();
        let src = Pos::new(1, 19);
        let dst = Pos::new(12, 19);
        let plain = a_star(maze, src, dst);
        // A ghost sitting mid-corridor makes the straight row expensive.
        let ghost = vec![Pos::new(6, 19)];
        let avoiding = a_star_avoiding(maze, src, dst, &ghost, 4, 10);
        assert_eq!(avoiding.first(), Some(&src));
        assert_eq!(avoiding.last(), Some(&dst));
        assert!(avoiding.len() >= plain.len());
        assert!(!avoiding.contains(&Pos::new(6, 19)));
    }

    #[test]
    fn direction_toward_prefers_horizontal_on_tie() {
        let a = Pos::new(5, 5);
        assert_eq!(direction_toward(a, Pos::new(7, 7)), Some(Direction::Right));
        assert_eq!(direction_toward(a, Pos::new(3, 3)), Some(Direction::Left));
        assert_eq!(direction_toward(a, Pos::new(5, 9)), Some(Direction::Down));
        assert_eq!(direction_toward(a, a), None);
    }

    #[test]
    fn equal_cost_frontier_expands_fifo() {
        let maze = Maze::standard();
        // Both rows 19 and 20 connect these; the first settled path wins and
        // repeated runs agree.
        let a = a_star(maze, Pos::new(1, 19), Pos::new(12, 20));
        let b = a_star(maze, Pos::new(1, 19), Pos::new(12, 20));
        assert_eq!(a, b);
    }
}
