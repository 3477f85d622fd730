use std::collections::HashSet;
use std::sync::OnceLock;

use crate::constants::GRID_HEIGHT;
use crate::types::{Direction, GhostIdentity, Pos};

/// Board layout. `#` wall, `.` dot, `o` power pellet, `-` ghost house.
/// Row 15 is the tunnel row; its edge cells are the teleport entries.
pub const RAW_MAZE: [&str; GRID_HEIGHT as usize] = [
    "############################",
    "#............##............#",
    "#.####.#####.##.#####.####.#",
    "#o####.#####.##.#####.####o#",
    "#.####.#####.##.#####.####.#",
    "#..........................#",
    "#.####.##.########.##.####.#",
    "#.####.##.########.##.####.#",
    "#......##....##....##......#",
    "######.#####.##.#####.######",
    "#......##..........##......#",
    "#.####.##.###--###.##.####.#",
    "#.####.##.#------#.##.####.#",
    "#......##.#------#.##......#",
    "######.##.########.##.######",
    "............................",
    "#.####.##.########.##.####.#",
    "#.####.##....##....##.####.#",
    "#.####.#####.##.#####.####.#",
    "#............##............#",
    "#..........................#",
    "#.####.#####.##.#####.####.#",
    "#.####.#####.##.#####.####.#",
    "#o..##................##..o#",
    "###.##.##.########.##.##.###",
    "###.##.##.########.##.##.###",
    "#......##....##....##......#",
    "#.##########.##.##########.#",
    "#.##########.##.##########.#",
    "#..........................#",
    "#.####.#####.##.#####.####.#",
    "#.####.#####.##.#####.####.#",
    "#..........................#",
    "#.####.#####.##.#####.####.#",
    "############################",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Wall,
    Dot,
    PowerPellet,
    GhostHouse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeleportPair {
    pub entry: Pos,
    pub exit: Pos,
}

#[derive(Clone, Copy, Debug)]
pub struct StartPositions {
    pub pacman: Pos,
    pub ghost_house: Pos,
    pub blinky: Pos,
    pub pinky: Pos,
    pub inky: Pos,
    pub clyde: Pos,
}

impl StartPositions {
    pub fn for_ghost(&self, ghost: GhostIdentity) -> Pos {
        match ghost {
            GhostIdentity::Blinky => self.blinky,
            GhostIdentity::Pinky => self.pinky,
            GhostIdentity::Inky => self.inky,
            GhostIdentity::Clyde => self.clyde,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Maze {
    cells: Vec<Vec<Cell>>,
    teleports: Vec<TeleportPair>,
    starts: StartPositions,
}

static STANDARD: OnceLock<Maze> = OnceLock::new();

impl Maze {
    /// Shared read-only maze; built once, used by every room.
    pub fn standard() -> &'static Maze {
        STANDARD.get_or_init(|| {
            Maze::from_rows(
                &RAW_MAZE,
                vec![
                    TeleportPair {
                        entry: Pos::new(0, 15),
                        exit: Pos::new(26, 15),
                    },
                    TeleportPair {
                        entry: Pos::new(27, 15),
                        exit: Pos::new(1, 15),
                    },
                ],
                StartPositions {
                    pacman: Pos::new(13, 29),
                    ghost_house: Pos::new(13, 12),
                    blinky: Pos::new(13, 10),
                    pinky: Pos::new(12, 12),
                    inky: Pos::new(14, 12),
                    clyde: Pos::new(13, 13),
                },
            )
        })
    }

    pub fn from_rows(rows: &[&str], teleports: Vec<TeleportPair>, starts: StartPositions) -> Maze {
        let cells = rows
            .iter()
            .map(|row| {
                row.bytes()
                    .map(|byte| match byte {
                        b'#' => Cell::Wall,
                        b'.' => Cell::Dot,
                        b'o' => Cell::PowerPellet,
                        b'-' => Cell::GhostHouse,
                        other => panic!("unrecognized maze cell: '{}'", other as char),
                    })
                    .collect()
            })
            .collect();
        Maze {
            cells,
            teleports,
            starts,
        }
    }

    pub fn width(&self) -> i32 {
        self.cells.first().map(|row| row.len() as i32).unwrap_or(0)
    }

    pub fn height(&self) -> i32 {
        self.cells.len() as i32
    }

    pub fn in_bounds(&self, p: Pos) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width() && p.y < self.height()
    }

    pub fn cell(&self, p: Pos) -> Cell {
        if !self.in_bounds(p) {
            return Cell::Wall;
        }
        self.cells[p.y as usize][p.x as usize]
    }

    pub fn is_walkable(&self, p: Pos) -> bool {
        self.cell(p) != Cell::Wall
    }

    /// Resolves a raw position through the teleport table. A step that lands
    /// on an entry comes out at the exit in the same tick.
    pub fn apply_teleport(&self, p: Pos) -> Pos {
        for pair in &self.teleports {
            if pair.entry == p {
                return pair.exit;
            }
        }
        p
    }

    /// Walkable cells reachable in one step, teleports already resolved.
    /// The exit of an entry cell is included for callers that hold a raw
    /// entry position.
    pub fn neighbors(&self, p: Pos) -> Vec<Pos> {
        let mut out = Vec::with_capacity(4);
        for dir in Direction::ALL {
            let raw = p.step(dir);
            if self.is_walkable(raw) {
                out.push(self.apply_teleport(raw));
            }
        }
        for pair in &self.teleports {
            if pair.entry == p && !out.contains(&pair.exit) {
                out.push(pair.exit);
            }
        }
        out
    }

    pub fn walkable_degree(&self, p: Pos) -> usize {
        Direction::ALL
            .iter()
            .filter(|dir| self.is_walkable(p.step(**dir)))
            .count()
    }

    /// Manhattan distance that may route through a teleport pair.
    pub fn distance(&self, a: Pos, b: Pos) -> i32 {
        let mut best = a.manhattan(b);
        for pair in &self.teleports {
            let through = a.manhattan(pair.entry) + 1 + pair.exit.manhattan(b);
            best = best.min(through);
        }
        best
    }

    /// Dot cells, excluding teleport entries: a step onto an entry resolves
    /// to the exit, so an entry cell is never occupied and a dot there could
    /// never be consumed.
    pub fn initial_dots(&self) -> HashSet<(i32, i32)> {
        let mut out = HashSet::new();
        for y in 0..self.height() {
            for x in 0..self.width() {
                let p = Pos::new(x, y);
                if self.cell(p) == Cell::Dot && self.apply_teleport(p) == p {
                    out.insert(p.key());
                }
            }
        }
        out
    }

    pub fn initial_power_pellets(&self) -> HashSet<(i32, i32)> {
        let mut out = HashSet::new();
        for y in 0..self.height() {
            for x in 0..self.width() {
                let p = Pos::new(x, y);
                if self.cell(p) == Cell::PowerPellet {
                    out.insert(p.key());
                }
            }
        }
        out
    }

    pub fn starts(&self) -> &StartPositions {
        &self.starts
    }

    pub fn teleports(&self) -> &[TeleportPair] {
        &self.teleports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GRID_WIDTH;

    #[test]
    fn board_has_expected_shape() {
        let maze = Maze::standard();
        assert_eq!(maze.width(), GRID_WIDTH);
        assert_eq!(maze.height(), GRID_HEIGHT);
        for row in RAW_MAZE {
            assert_eq!(row.len(), GRID_WIDTH as usize);
        }
    }

    #[test]
    fn starts_are_walkable() {
        let maze = Maze::standard();
        let starts = maze.starts();
        for p in [
            starts.pacman,
            starts.ghost_house,
            starts.blinky,
            starts.pinky,
            starts.inky,
            starts.clyde,
        ] {
            assert!(maze.is_walkable(p), "start {:?} must be walkable", p);
        }
        for ghost in GhostIdentity::ALL {
            assert!(maze.is_walkable(starts.for_ghost(ghost)));
        }
    }

    #[test]
    fn teleport_endpoints_are_walkable_and_applied() {
        let maze = Maze::standard();
        for pair in maze.teleports() {
            assert!(maze.is_walkable(pair.entry));
            assert!(maze.is_walkable(pair.exit));
            assert_eq!(maze.apply_teleport(pair.entry), pair.exit);
            // The exit itself is a plain cell.
            assert_eq!(maze.apply_teleport(pair.exit), pair.exit);
        }
    }

    #[test]
    fn teleport_preserves_walkability() {
        let maze = Maze::standard();
        for y in 0..maze.height() {
            for x in 0..maze.width() {
                let p = Pos::new(x, y);
                if maze.is_walkable(p) {
                    assert!(maze.is_walkable(maze.apply_teleport(p)));
                }
            }
        }
    }

    #[test]
    fn neighbors_resolve_teleports() {
        let maze = Maze::standard();
        // Stepping left from (1,15) lands on the entry and comes out at the
        // right-hand exit.
        let neighbors = maze.neighbors(Pos::new(1, 15));
        assert!(neighbors.contains(&Pos::new(26, 15)));
        assert!(!neighbors.contains(&Pos::new(0, 15)));
        // An entry cell exposes its exit.
        assert!(maze.neighbors(Pos::new(0, 15)).contains(&Pos::new(26, 15)));
    }

    #[test]
    fn neighbors_are_walkable_and_bounded() {
        let maze = Maze::standard();
        for y in 0..maze.height() {
            for x in 0..maze.width() {
                let p = Pos::new(x, y);
                if !maze.is_walkable(p) {
                    continue;
                }
                let neighbors = maze.neighbors(p);
                assert!(neighbors.len() <= 5);
                for n in neighbors {
                    assert!(maze.is_walkable(n));
                }
            }
        }
    }

    #[test]
    fn dots_and_pellets_are_disjoint() {
        let maze = Maze::standard();
        let dots = maze.initial_dots();
        let pellets = maze.initial_power_pellets();
        assert!(dots.is_disjoint(&pellets));
        assert_eq!(pellets.len(), 4);
        assert!(dots.len() > 300);
    }

    #[test]
    fn teleport_entries_carry_no_dot() {
        let maze = Maze::standard();
        let dots = maze.initial_dots();
        for pair in maze.teleports() {
            assert!(!dots.contains(&pair.entry.key()));
        }
    }

    #[test]
    fn distance_routes_through_tunnel() {
        let maze = Maze::standard();
        let a = Pos::new(1, 15);
        let b = Pos::new(26, 15);
        // Straight across is 25; through the left entry it is 1 + 1.
        assert_eq!(maze.distance(a, b), 2);
        assert_eq!(a.manhattan(b), 25);
    }

    #[test]
    fn every_walkable_cell_is_mutually_reachable() {
        let maze = Maze::standard();
        let mut seen = HashSet::new();
        let start = maze.starts().pacman;
        let mut queue = vec![start];
        seen.insert(start.key());
        while let Some(p) = queue.pop() {
            for n in maze.neighbors(p) {
                if seen.insert(n.key()) {
                    queue.push(n);
                }
            }
        }
        for y in 0..maze.height() {
            for x in 0..maze.width() {
                let p = Pos::new(x, y);
                // Entries resolve elsewhere and are never occupied.
                if maze.is_walkable(p) && maze.apply_teleport(p) == p {
                    assert!(seen.contains(&p.key()), "unreachable cell {:?}", p);
                }
            }
        }
    }
}
