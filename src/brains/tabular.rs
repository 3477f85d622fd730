use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{
    GRID_WIDTH, GVF_DOT_WEIGHT, GVF_FRIGHTENED_WEIGHT, GVF_GHOST_WEIGHT, GVF_PELLET_WEIGHT,
    SHAPING_ADJACENT_PENALTY, SHAPING_FAR_NUMERATOR, SHAPING_FAR_RADIUS, SHAPING_MID_NUMERATOR,
    SHAPING_MID_RADIUS, SHAPING_NEAR_PENALTY,
};
use crate::types::{Direction, Pos};

use super::BrainContext;

pub fn pack_position(p: Pos) -> u32 {
    (p.y * GRID_WIDTH + p.x) as u32
}

pub fn pack_state(p: Pos, dir: Direction) -> u32 {
    pack_position(p) * 4 + dir.index() as u32
}

#[derive(Debug, Deserialize)]
struct ModelFileRaw {
    alpha: f64,
    gamma: f64,
    #[serde(rename = "totalActions")]
    total_actions: u64,
    #[serde(rename = "explorationModeChanged")]
    exploration_mode_changed: bool,
    entries: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ModelEntryRaw {
    #[serde(rename = "positionKey")]
    position_key: u32,
    #[serde(rename = "valueTable")]
    value_table: Vec<(u32, [f32; 4])>,
}

/// Pre-trained general value functions: one `state -> q4` table per semantic
/// target position, aggregated at inference time. Loaded once, shared
/// read-only across rooms.
pub struct TabularPolicy {
    alpha: f64,
    gamma: f64,
    total_actions: u64,
    exploration_mode_changed: bool,
    tables: HashMap<u32, HashMap<u32, [f32; 4]>>,
}

impl TabularPolicy {
    /// Reads the model file once. Missing or corrupt files are logged and
    /// yield `None`; the caller continues with the heuristic brains.
    pub fn load(path: &Path) -> Option<TabularPolicy> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    eprintln!("[policy] failed to read {}: {error}", path.display());
                }
                return None;
            }
        };
        let raw: ModelFileRaw = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(error) => {
                eprintln!("[policy] failed to parse {}: {error}", path.display());
                return None;
            }
        };

        let mut tables = HashMap::new();
        for value in raw.entries {
            let entry: ModelEntryRaw = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(error) => {
                    eprintln!("[policy] skipping bad entry in {}: {error}", path.display());
                    continue;
                }
            };
            tables.insert(
                entry.position_key,
                entry.value_table.into_iter().collect::<HashMap<_, _>>(),
            );
        }

        let policy = TabularPolicy {
            alpha: raw.alpha,
            gamma: raw.gamma,
            total_actions: raw.total_actions,
            exploration_mode_changed: raw.exploration_mode_changed,
            tables,
        };
        println!(
            "[policy] loaded {} targets from {} (alpha {}, gamma {}, {} training actions{})",
            policy.tables.len(),
            path.display(),
            policy.alpha,
            policy.gamma,
            policy.total_actions,
            if policy.exploration_mode_changed {
                ", exploration schedule changed mid-run"
            } else {
                ""
            },
        );
        Some(policy)
    }

    #[cfg(test)]
    fn from_tables(tables: HashMap<u32, HashMap<u32, [f32; 4]>>) -> TabularPolicy {
        TabularPolicy {
            alpha: 0.1,
            gamma: 0.95,
            total_actions: 0,
            exploration_mode_changed: false,
            tables,
        }
    }

    pub fn target_count(&self) -> usize {
        self.tables.len()
    }

    /// Unseen targets contribute the zero vector.
    fn q_values(&self, target_key: u32, state_key: u32) -> [f32; 4] {
        self.tables
            .get(&target_key)
            .and_then(|table| table.get(&state_key))
            .copied()
            .unwrap_or([0.0; 4])
    }

    /// Weighted sum over every target's value vector, an adjacency shaping
    /// term per candidate move, then argmax over walkable actions.
    /// `ctx.step_count` is part of the observation contract but plays no
    /// role in the aggregation; it existed for the trainers' exploration
    /// schedule.
    pub fn select_action(&self, ctx: &BrainContext) -> Option<Direction> {
        let state_key = pack_state(ctx.pacman, ctx.facing);
        let mut totals = [0f32; 4];

        let accumulate = |target: Pos, weight: f32, totals: &mut [f32; 4]| {
            let q = self.q_values(pack_position(target), state_key);
            for (total, value) in totals.iter_mut().zip(q.iter()) {
                *total += weight * value;
            }
        };

        for &(x, y) in ctx.dots {
            accumulate(Pos::new(x, y), GVF_DOT_WEIGHT, &mut totals);
        }
        for &(x, y) in ctx.pellets {
            accumulate(Pos::new(x, y), GVF_PELLET_WEIGHT, &mut totals);
        }
        for ghost in ctx.ghosts {
            let weight = if ghost.frightened {
                GVF_FRIGHTENED_WEIGHT
            } else {
                GVF_GHOST_WEIGHT
            };
            accumulate(ghost.position, weight, &mut totals);
        }

        let mut best: Option<(Direction, f32)> = None;
        for dir in Direction::ALL {
            let raw = ctx.pacman.step(dir);
            if !ctx.maze.is_walkable(raw) {
                continue;
            }
            let landing = ctx.maze.apply_teleport(raw);
            let score = totals[dir.index()] + self.shaping(ctx, landing);
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((dir, score));
            }
        }
        best.map(|(dir, _)| dir)
    }

    /// Decaying penalty for ending a move near a non-frightened ghost.
    fn shaping(&self, ctx: &BrainContext, landing: Pos) -> f32 {
        let mut penalty = 0.0;
        for ghost in ctx.ghosts.iter().filter(|g| !g.frightened) {
            let d = ctx.maze.distance(landing, ghost.position);
            penalty += if d <= 1 {
                SHAPING_ADJACENT_PENALTY
            } else if d == 2 {
                SHAPING_NEAR_PENALTY
            } else if d <= SHAPING_MID_RADIUS {
                SHAPING_MID_NUMERATOR / d as f32
            } else if d <= SHAPING_FAR_RADIUS {
                SHAPING_FAR_NUMERATOR / d as f32
            } else {
                0.0
            };
        }
        penalty
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;
    use crate::brains::GhostObservation;
    use crate::maze::Maze;

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u32>()
        );
        std::env::temp_dir().join(unique)
    }

    fn context<'a>(
        maze: &'a Maze,
        pacman: Pos,
        facing: Direction,
        ghosts: &'a [GhostObservation],
        dots: &'a HashSet<(i32, i32)>,
        pellets: &'a HashSet<(i32, i32)>,
    ) -> BrainContext<'a> {
        BrainContext {
            maze,
            pacman,
            facing,
            ghosts,
            dots,
            pellets,
            step_count: 7,
        }
    }

    #[test]
    fn packed_keys_are_unique_per_cell_and_direction() {
        let mut seen = HashSet::new();
        for y in 0..5 {
            for x in 0..5 {
                for dir in Direction::ALL {
                    assert!(seen.insert(pack_state(Pos::new(x, y), dir)));
                }
            }
        }
    }

    #[test]
    fn load_round_trips_a_model_file() {
        let path = temp_file("policy-load");
        let state_key = pack_state(Pos::new(13, 29), Direction::Left);
        let raw = format!(
            r#"{{
  "alpha": 0.1,
  "gamma": 0.95,
  "totalActions": 5000,
  "explorationModeChanged": false,
  "entries": [
    {{"positionKey": 42, "valueTable": [[{state_key}, [1.0, 2.0, 3.0, 4.0]]]}},
    {{"positionKey": "broken"}}
  ]
}}"#
        );
        std::fs::write(&path, raw).expect("write model file");

        let policy = TabularPolicy::load(&path).expect("model loads");
        // The malformed entry is skipped, the good one survives.
        assert_eq!(policy.target_count(), 1);
        assert_eq!(policy.q_values(42, state_key), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(policy.q_values(42, state_key + 1), [0.0; 4]);
        assert_eq!(policy.q_values(999, state_key), [0.0; 4]);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_or_corrupt_files_yield_none() {
        assert!(TabularPolicy::load(Path::new("/nonexistent/model.json")).is_none());
        let path = temp_file("policy-corrupt");
        std::fs::write(&path, "not json at all").expect("write file");
        assert!(TabularPolicy::load(&path).is_none());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn argmax_follows_the_weighted_tables() {
        let maze = Maze::standard();
        let pacman = Pos::new(13, 20);
        let facing = Direction::Left;
        let state_key = pack_state(pacman, facing);
        let dot = (12, 20);

        let mut table = HashMap::new();
        // Right is the most valuable action for this dot target.
        table.insert(state_key, [0.0, 0.0, 1.0, 5.0]);
        let mut tables = HashMap::new();
        tables.insert(pack_position(Pos::new(dot.0, dot.1)), table);
        let policy = TabularPolicy::from_tables(tables);

        let mut dots = HashSet::new();
        dots.insert(dot);
        let pellets = HashSet::new();
        let ctx = context(maze, pacman, facing, &[], &dots, &pellets);
        assert_eq!(policy.select_action(&ctx), Some(Direction::Right));
    }

    #[test]
    fn shaping_steers_away_from_adjacent_ghosts() {
        let maze = Maze::standard();
        let policy = TabularPolicy::from_tables(HashMap::new());
        let ghosts = [GhostObservation {
            position: Pos::new(14, 20),
            direction: Direction::Left,
            frightened: false,
        }];
        let dots = HashSet::new();
        let pellets = HashSet::new();
        let ctx = context(maze, Pos::new(13, 20), Direction::Right, &ghosts, &dots, &pellets);
        let picked = policy.select_action(&ctx).expect("action");
        assert_ne!(picked, Direction::Right);
        assert!(maze.is_walkable(Pos::new(13, 20).step(picked)));
    }

    #[test]
    fn only_walkable_actions_are_considered() {
        let maze = Maze::standard();
        let policy = TabularPolicy::from_tables(HashMap::new());
        let dots = HashSet::new();
        let pellets = HashSet::new();
        // (1,1) corner: only right and down are open.
        let ctx = context(maze, Pos::new(1, 1), Direction::Up, &[], &dots, &pellets);
        let picked = policy.select_action(&ctx).expect("action");
        assert!(matches!(picked, Direction::Down | Direction::Right));
    }
}
