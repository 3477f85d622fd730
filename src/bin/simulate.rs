use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use ghost_rush_server::brains::PacmanController;
use ghost_rush_server::constants::{DEFAULT_SEARCH_DEPTH, TICK_PERIOD_MS};
use ghost_rush_server::pathfinding::direction_toward;
use ghost_rush_server::room::GameRoom;
use ghost_rush_server::types::{GhostIdentity, OutboundFrame, Winner};
use serde::Serialize;

/// Headless balance smoke-runner: scripted chaser ghosts against the live
/// Pac-Man brains, one result line per match.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Number of matches to run.
    #[arg(long, default_value_t = 3)]
    matches: usize,
    /// Ghost players per match (1-4).
    #[arg(long, default_value_t = 2)]
    ghosts: usize,
    /// DefensiveBrain search depth.
    #[arg(long, default_value_t = DEFAULT_SEARCH_DEPTH)]
    depth: u32,
    /// Hard tick cap per match.
    #[arg(long, default_value_t = 4_000)]
    max_ticks: u64,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct MatchResult {
    index: usize,
    winner: Option<Winner>,
    reason: Option<String>,
    score: i32,
    #[serde(rename = "captureCount")]
    capture_count: u32,
    ticks: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    matches: usize,
    #[serde(rename = "winnerCounts")]
    winner_counts: BTreeMap<String, usize>,
    #[serde(rename = "averageScore")]
    average_score: i32,
    results: Vec<MatchResult>,
}

fn main() {
    let cli = Cli::parse();
    let ghost_count = cli.ghosts.clamp(1, 4);

    let mut results = Vec::new();
    for index in 0..cli.matches {
        let result = run_match(index, ghost_count, cli.depth, cli.max_ticks);
        println!(
            "[simulate] match {index}: winner={:?} reason={:?} score={} captures={} ticks={}",
            result.winner, result.reason, result.score, result.capture_count, result.ticks
        );
        results.push(result);
    }

    let summary = build_summary(results);
    println!(
        "[simulate] {} matches, winners {:?}, avg score {}",
        summary.matches, summary.winner_counts, summary.average_score
    );
    if let Some(path) = cli.summary_out {
        if let Err(error) = write_summary(&path, &summary) {
            eprintln!("[simulate] failed to write {}: {error}", path.display());
        }
    }
}

fn run_match(index: usize, ghost_count: usize, depth: u32, max_ticks: u64) -> MatchResult {
    let controller = PacmanController::new(depth, None);
    let mut room = GameRoom::new(format!("SIM{index}"), controller, 0);
    let ghosts = [
        GhostIdentity::Blinky,
        GhostIdentity::Pinky,
        GhostIdentity::Inky,
        GhostIdentity::Clyde,
    ];
    for (slot, ghost) in ghosts.iter().take(ghost_count).enumerate() {
        let connection_id = format!("bot_{slot}");
        room.add_player(&connection_id, &connection_id, *ghost)
            .expect("bot joins empty room");
        room.toggle_ready(&connection_id);
    }
    room.start(0);

    let mut winner = None;
    let mut reason = None;
    let mut ticks = 0;
    'outer: for tick in 1..=max_ticks {
        ticks = tick;
        drive_bots(&mut room, tick);
        for frame in room.step(TICK_PERIOD_MS) {
            if let OutboundFrame::GameOver {
                winner: w,
                reason: r,
                ..
            } = frame
            {
                winner = Some(w);
                reason = r;
                break 'outer;
            }
        }
    }

    MatchResult {
        index,
        winner,
        reason,
        score: room.score(),
        capture_count: room.capture_count(),
        ticks,
    }
}

/// Naive chasers: every few ticks each bot re-aims straight at Pac-Man.
/// Enough pressure to exercise captures, pellets, and respawns.
fn drive_bots(room: &mut GameRoom, tick: u64) {
    if tick % 3 != 0 {
        return;
    }
    let snapshot = room.snapshot();
    let pacman = snapshot.pacman.position;
    for player in &snapshot.players {
        if let Some(direction) = direction_toward(player.position, pacman) {
            room.submit_input(&player.connection_id, direction);
        }
    }
}

fn build_summary(results: Vec<MatchResult>) -> RunSummary {
    let mut winner_counts = BTreeMap::new();
    for result in &results {
        let key = match result.winner {
            Some(Winner::Ghosts) => "ghosts",
            Some(Winner::Pacman) => "pacman",
            None => "unfinished",
        };
        *winner_counts.entry(key.to_string()).or_insert(0) += 1;
    }
    let average_score = if results.is_empty() {
        0
    } else {
        results.iter().map(|r| r.score as i64).sum::<i64>() as i32 / results.len() as i32
    };
    RunSummary {
        matches: results.len(),
        winner_counts,
        average_score,
        results,
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(winner: Option<Winner>, score: i32) -> MatchResult {
        MatchResult {
            index: 0,
            winner,
            reason: None,
            score,
            capture_count: 0,
            ticks: 100,
        }
    }

    #[test]
    fn summary_counts_winners_and_averages_scores() {
        let summary = build_summary(vec![
            result(Some(Winner::Ghosts), 600),
            result(Some(Winner::Pacman), 1_200),
            result(None, 300),
        ]);
        assert_eq!(summary.matches, 3);
        assert_eq!(summary.winner_counts["ghosts"], 1);
        assert_eq!(summary.winner_counts["pacman"], 1);
        assert_eq!(summary.winner_counts["unfinished"], 1);
        assert_eq!(summary.average_score, 700);
    }

    #[test]
    fn short_match_produces_a_result() {
        let r = run_match(0, 1, 2, 20);
        assert_eq!(r.ticks, 20);
        assert!(r.winner.is_none());
        assert!(r.score >= 0);
    }
}
