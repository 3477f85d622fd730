use std::collections::{BTreeMap, HashSet};

use crate::brains::{BrainContext, GhostObservation, PacmanController};
use crate::constants::{
    BASE_CAPTURE_SCORE, CAPTURES_TO_WIN, CAPTURE_MULTIPLIER, CAPTURE_NEARBY_RADIUS, DOT_VALUE,
    EMOTE_REFRESH_TICKS, FRIGHTENED_DURATION_MS, GHOST_EAT_SCORE, MATCH_DURATION_MS,
    MAX_PLAYERS_PER_ROOM, POWER_PELLET_VALUE, RESPAWN_DELAY_MS, TICK_RATE,
};
use crate::maze::Maze;
use crate::types::{
    DeltaFrame, Direction, GameMode, GhostIdentity, JoinError, OutboundFrame, PacmanDelta,
    PacmanView, PlayerDelta, PlayerLifecycle, PlayerView, Pos, RoomSnapshot, Winner,
};

#[derive(Clone, Debug)]
pub struct PlayerInternal {
    pub view: PlayerView,
    pub buffered_direction: Option<Direction>,
    pub respawn_at: Option<u64>,
    pub previous_position: Pos,
}

#[derive(Clone, Debug)]
struct BroadcastShadow {
    score: i32,
    capture_count: u32,
    mode: GameMode,
}

/// One match: players, board state, the tick procedure, and delta
/// broadcasting. All methods are synchronous; the owning context (one tick
/// task per room) drives `step` and ships whatever frames come back.
pub struct GameRoom {
    code: String,
    maze: &'static Maze,
    controller: PacmanController,
    players: BTreeMap<String, PlayerInternal>,
    dots: HashSet<(i32, i32)>,
    pellets: HashSet<(i32, i32)>,
    pacman: Pos,
    pacman_direction: Direction,
    previous_pacman: Pos,
    mode: GameMode,
    score: i32,
    capture_count: u32,
    started: bool,
    created_at_ms: u64,
    started_at_ms: u64,
    elapsed_ms: u64,
    frightened_started_at: Option<u64>,
    tick_counter: u64,
    emote: Option<&'static str>,
    emote_tick: u64,
    emote_changed: bool,
    winner: Option<Winner>,
    ended_at_ms: Option<u64>,
    dots_changed: bool,
    pellets_changed: bool,
    shadow: BroadcastShadow,
    stopped: bool,
}

impl GameRoom {
    pub fn new(code: String, controller: PacmanController, now_ms: u64) -> Self {
        let maze = Maze::standard();
        let starts = *maze.starts();
        Self {
            code,
            maze,
            controller,
            players: BTreeMap::new(),
            dots: maze.initial_dots(),
            pellets: maze.initial_power_pellets(),
            pacman: starts.pacman,
            pacman_direction: Direction::Left,
            previous_pacman: starts.pacman,
            mode: GameMode::Chase,
            score: 0,
            capture_count: 0,
            started: false,
            created_at_ms: now_ms,
            started_at_ms: now_ms,
            elapsed_ms: 0,
            frightened_started_at: None,
            tick_counter: 0,
            emote: None,
            emote_tick: 0,
            emote_changed: false,
            winner: None,
            ended_at_ms: None,
            dots_changed: false,
            pellets_changed: false,
            shadow: BroadcastShadow {
                score: 0,
                capture_count: 0,
                mode: GameMode::Chase,
            },
            stopped: false,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn ended_at_ms(&self) -> Option<u64> {
        self.ended_at_ms
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_ended(&self) -> bool {
        self.mode == GameMode::GameOver
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, connection_id: &str) -> bool {
        self.players.contains_key(connection_id)
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn capture_count(&self) -> u32 {
        self.capture_count
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn add_player(
        &mut self,
        connection_id: &str,
        name: &str,
        ghost: GhostIdentity,
    ) -> Result<(), JoinError> {
        if self.started {
            return Err(JoinError::RoomStarted);
        }
        if self.players.len() >= MAX_PLAYERS_PER_ROOM {
            return Err(JoinError::RoomFull);
        }
        if self.players.values().any(|p| p.view.ghost == ghost) {
            return Err(JoinError::GhostTaken);
        }
        let position = self.maze.starts().for_ghost(ghost);
        self.players.insert(
            connection_id.to_string(),
            PlayerInternal {
                view: PlayerView {
                    connection_id: connection_id.to_string(),
                    name: name.to_string(),
                    ghost,
                    position,
                    direction: Direction::Left,
                    state: PlayerLifecycle::Active,
                    ready: false,
                },
                buffered_direction: None,
                respawn_at: None,
                previous_position: position,
            },
        );
        Ok(())
    }

    pub fn remove_player(&mut self, connection_id: &str) -> Option<PlayerView> {
        self.players.remove(connection_id).map(|p| p.view)
    }

    pub fn toggle_ready(&mut self, connection_id: &str) -> Option<bool> {
        let player = self.players.get_mut(connection_id)?;
        player.view.ready = !player.view.ready;
        Some(player.view.ready)
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.view.ready)
    }

    pub fn can_start(&self) -> bool {
        !self.started && self.all_ready()
    }

    pub fn start(&mut self, now_ms: u64) -> Vec<OutboundFrame> {
        if self.started {
            return Vec::new();
        }
        self.seed_match(now_ms);
        vec![
            OutboundFrame::GameStarted,
            OutboundFrame::GameState {
                state: self.snapshot(),
            },
        ]
    }

    /// New match with the same room code; player identities and ready flags
    /// survive.
    pub fn restart(&mut self, now_ms: u64) -> Vec<OutboundFrame> {
        if self.players.is_empty() || !self.started {
            return Vec::new();
        }
        self.seed_match(now_ms);
        vec![
            OutboundFrame::GameRestarted,
            OutboundFrame::GameState {
                state: self.snapshot(),
            },
        ]
    }

    fn seed_match(&mut self, now_ms: u64) {
        let starts = *self.maze.starts();
        self.started = true;
        self.started_at_ms = now_ms;
        self.elapsed_ms = 0;
        self.tick_counter = 0;
        self.mode = GameMode::Chase;
        self.score = 0;
        self.capture_count = 0;
        self.winner = None;
        self.ended_at_ms = None;
        self.stopped = false;
        self.frightened_started_at = None;
        self.dots = self.maze.initial_dots();
        // Pac-Man never moves onto his own seed cell, so it starts clear.
        self.dots.remove(&starts.pacman.key());
        self.pellets = self.maze.initial_power_pellets();
        self.dots_changed = false;
        self.pellets_changed = false;
        self.pacman = starts.pacman;
        self.previous_pacman = starts.pacman;
        self.pacman_direction = Direction::Left;
        self.emote = None;
        self.emote_tick = 0;
        self.emote_changed = false;
        for player in self.players.values_mut() {
            let position = starts.for_ghost(player.view.ghost);
            player.view.position = position;
            player.previous_position = position;
            player.view.direction = Direction::Left;
            player.view.state = PlayerLifecycle::Active;
            player.buffered_direction = None;
            player.respawn_at = None;
        }
        self.shadow = BroadcastShadow {
            score: 0,
            capture_count: 0,
            mode: GameMode::Chase,
        };
    }

    /// Buffered: stored on the player record, adopted on a later tick once
    /// the target cell is walkable.
    pub fn submit_input(&mut self, connection_id: &str, direction: Direction) -> bool {
        match self.players.get_mut(connection_id) {
            Some(player) => {
                player.buffered_direction = Some(direction);
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn now_ms(&self) -> u64 {
        self.started_at_ms + self.elapsed_ms
    }

    pub fn time_remaining_ms(&self) -> u64 {
        if !self.started {
            return MATCH_DURATION_MS;
        }
        MATCH_DURATION_MS.saturating_sub(self.elapsed_ms)
    }

    fn frightened_remaining_ms(&self, now_ms: u64) -> u64 {
        if self.mode != GameMode::Frightened {
            return 0;
        }
        match self.frightened_started_at {
            Some(at) => (at + FRIGHTENED_DURATION_MS).saturating_sub(now_ms),
            None => 0,
        }
    }

    /// One fixed-period simulation step. Returns the frames to broadcast.
    pub fn step(&mut self, dt_ms: u64) -> Vec<OutboundFrame> {
        if !self.started || self.stopped || self.mode == GameMode::GameOver {
            return Vec::new();
        }
        self.tick_counter += 1;
        self.elapsed_ms += dt_ms;
        let now_ms = self.started_at_ms + self.elapsed_ms;
        let mut frames = Vec::new();

        if self.mode == GameMode::Frightened {
            if let Some(at) = self.frightened_started_at {
                if now_ms.saturating_sub(at) >= FRIGHTENED_DURATION_MS {
                    self.end_frightened();
                }
            }
        }
        self.process_respawns(now_ms);

        self.previous_pacman = self.pacman;
        for player in self.players.values_mut() {
            player.previous_position = player.view.position;
        }

        // Early pass: players already co-located with Pac-Man after prior
        // teleports or respawns.
        self.resolve_collisions(now_ms);

        self.move_pacman(now_ms);
        self.move_players();
        self.resolve_collisions(now_ms);

        if let Some(frame) = self.check_invariants() {
            frames.push(frame);
            return frames;
        }
        if let Some(frame) = self.check_terminal(now_ms) {
            frames.push(frame);
            return frames;
        }

        if self.tick_counter.saturating_sub(self.emote_tick) >= EMOTE_REFRESH_TICKS {
            self.refresh_emote();
        }

        frames.push(OutboundFrame::GameUpdate {
            delta: self.build_delta(),
        });
        if self.tick_counter % TICK_RATE as u64 == 0 {
            frames.push(OutboundFrame::TimerUpdate {
                time_remaining_ms: self.time_remaining_ms(),
            });
        }
        frames
    }

    fn ghost_observations(&self) -> Vec<GhostObservation> {
        self.players
            .values()
            .filter(|p| p.view.state != PlayerLifecycle::Respawning)
            .map(|p| GhostObservation {
                position: p.view.position,
                direction: p.view.direction,
                frightened: p.view.state == PlayerLifecycle::Frightened,
            })
            .collect()
    }

    fn move_pacman(&mut self, now_ms: u64) {
        let observations = self.ghost_observations();
        let decision = {
            let ctx = BrainContext {
                maze: self.maze,
                pacman: self.pacman,
                facing: self.pacman_direction,
                ghosts: &observations,
                dots: &self.dots,
                pellets: &self.pellets,
                step_count: self.tick_counter,
            };
            self.controller
                .decide(&ctx, self.mode, self.frightened_remaining_ms(now_ms))
        };
        // A brain failure keeps the current facing for this tick.
        let direction = decision.unwrap_or(self.pacman_direction);
        let raw = self.pacman.step(direction);
        if self.maze.is_walkable(raw) {
            self.pacman_direction = direction;
            self.pacman = self.maze.apply_teleport(raw);
            self.consume_food(now_ms);
        }
    }

    fn consume_food(&mut self, now_ms: u64) {
        let key = self.pacman.key();
        if self.dots.remove(&key) {
            self.score += DOT_VALUE;
            self.dots_changed = true;
        } else if self.pellets.remove(&key) {
            self.score += POWER_PELLET_VALUE;
            self.pellets_changed = true;
            self.arm_frightened(now_ms);
        }
    }

    /// Pellet consumed: every active player turns frightened and any running
    /// frightened timer resets.
    fn arm_frightened(&mut self, now_ms: u64) {
        self.mode = GameMode::Frightened;
        self.frightened_started_at = Some(now_ms);
        for player in self.players.values_mut() {
            if player.view.state == PlayerLifecycle::Active {
                player.view.state = PlayerLifecycle::Frightened;
            }
        }
    }

    fn end_frightened(&mut self) {
        self.mode = GameMode::Chase;
        self.frightened_started_at = None;
        for player in self.players.values_mut() {
            if player.view.state == PlayerLifecycle::Frightened {
                player.view.state = PlayerLifecycle::Active;
            }
        }
    }

    fn process_respawns(&mut self, now_ms: u64) {
        let starts = *self.maze.starts();
        let mode = self.mode;
        for player in self.players.values_mut() {
            if player.view.state != PlayerLifecycle::Respawning {
                continue;
            }
            let Some(at) = player.respawn_at else {
                continue;
            };
            if now_ms < at {
                continue;
            }
            player.respawn_at = None;
            player.view.state = if mode == GameMode::Frightened {
                PlayerLifecycle::Frightened
            } else {
                PlayerLifecycle::Active
            };
            let position = starts.for_ghost(player.view.ghost);
            player.view.position = position;
            player.previous_position = position;
        }
    }

    fn move_players(&mut self) {
        let maze = self.maze;
        for player in self.players.values_mut() {
            if player.view.state == PlayerLifecycle::Respawning {
                continue;
            }
            if let Some(buffered) = player.buffered_direction {
                if maze.is_walkable(player.view.position.step(buffered)) {
                    player.view.direction = buffered;
                    player.buffered_direction = None;
                }
            }
            let raw = player.view.position.step(player.view.direction);
            if maze.is_walkable(raw) {
                player.view.position = maze.apply_teleport(raw);
            }
            // Blocked: facing persists, no movement this tick.
        }
    }

    /// Tick-granular collision rule: same cell, or a same-tick swap of
    /// cells with Pac-Man.
    fn resolve_collisions(&mut self, now_ms: u64) {
        if self.mode == GameMode::GameOver || self.capture_count >= CAPTURES_TO_WIN {
            return;
        }
        let connection_ids: Vec<String> = self.players.keys().cloned().collect();
        for connection_id in connection_ids {
            let (position, previous, state) = {
                let player = &self.players[&connection_id];
                (
                    player.view.position,
                    player.previous_position,
                    player.view.state,
                )
            };
            if state == PlayerLifecycle::Respawning {
                continue;
            }
            let overlap = position == self.pacman;
            let swapped = previous == self.pacman && position == self.previous_pacman;
            if !overlap && !swapped {
                continue;
            }

            if state == PlayerLifecycle::Frightened {
                let ghost_house = self.maze.starts().ghost_house;
                if let Some(player) = self.players.get_mut(&connection_id) {
                    player.view.state = PlayerLifecycle::Respawning;
                    player.view.position = ghost_house;
                    player.previous_position = ghost_house;
                    player.respawn_at = Some(now_ms + RESPAWN_DELAY_MS);
                }
                self.score += GHOST_EAT_SCORE;
            } else {
                let site = self.pacman;
                let nearby = self
                    .players
                    .values()
                    .filter(|p| {
                        p.view.state != PlayerLifecycle::Respawning
                            && p.view.position.manhattan(site) < CAPTURE_NEARBY_RADIUS
                    })
                    .count()
                    .max(1);
                self.score += (BASE_CAPTURE_SCORE
                    * CAPTURE_MULTIPLIER.powi(nearby as i32 - 1))
                .round() as i32;
                self.capture_count += 1;
                let start = self.maze.starts().pacman;
                self.pacman = start;
                self.previous_pacman = start;
                self.pacman_direction = Direction::Left;
                // One capture per pass keeps the capture count inside its
                // bound even when several ghosts converge.
                break;
            }
        }
    }

    /// A position on a wall means the movement logic is corrupt; the room
    /// aborts rather than keep broadcasting garbage.
    fn check_invariants(&mut self) -> Option<OutboundFrame> {
        let pacman_ok = self.maze.is_walkable(self.pacman);
        let players_ok = self
            .players
            .values()
            .all(|p| self.maze.is_walkable(p.view.position));
        if pacman_ok && players_ok {
            return None;
        }
        eprintln!(
            "[room {}] internal invariant violation: agent on a wall, aborting match",
            self.code
        );
        self.mode = GameMode::GameOver;
        self.winner = Some(Winner::Pacman);
        self.ended_at_ms = Some(self.now_ms());
        Some(OutboundFrame::GameOver {
            winner: Winner::Pacman,
            reason: Some("internal".to_string()),
            score: self.score,
        })
    }

    fn check_terminal(&mut self, now_ms: u64) -> Option<OutboundFrame> {
        let (winner, reason) = if self.capture_count >= CAPTURES_TO_WIN {
            (Winner::Ghosts, None)
        } else if self.dots.is_empty() {
            (Winner::Pacman, None)
        } else if self.elapsed_ms >= MATCH_DURATION_MS {
            (Winner::Pacman, Some("timeout".to_string()))
        } else {
            return None;
        };
        self.mode = GameMode::GameOver;
        self.winner = Some(winner);
        self.ended_at_ms = Some(now_ms);
        Some(OutboundFrame::GameOver {
            winner,
            reason,
            score: self.score,
        })
    }

    fn refresh_emote(&mut self) {
        self.emote_tick = self.tick_counter;
        let threat = self
            .players
            .values()
            .filter(|p| p.view.state == PlayerLifecycle::Active)
            .map(|p| self.maze.distance(self.pacman, p.view.position))
            .min();
        let any_frightened = self
            .players
            .values()
            .any(|p| p.view.state == PlayerLifecycle::Frightened);
        let next = if self.mode == GameMode::Frightened && any_frightened {
            "hunting"
        } else {
            match threat {
                Some(d) if d <= 3 => "panicked",
                Some(d) if d <= 6 => "wary",
                _ => "cruising",
            }
        };
        if self.emote != Some(next) {
            self.emote = Some(next);
            self.emote_changed = true;
        }
    }

    fn sorted_positions(set: &HashSet<(i32, i32)>) -> Vec<Pos> {
        let mut out: Vec<Pos> = set.iter().map(|&(x, y)| Pos::new(x, y)).collect();
        out.sort_by_key(|p| (p.y, p.x));
        out
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.code.clone(),
            started: self.started,
            mode: self.mode,
            score: self.score,
            capture_count: self.capture_count,
            time_remaining_ms: self.time_remaining_ms(),
            tick: self.tick_counter,
            pacman: PacmanView {
                position: self.pacman,
                direction: self.pacman_direction,
                emote: self.emote.map(str::to_string),
            },
            players: self.players.values().map(|p| p.view.clone()).collect(),
            dots: Self::sorted_positions(&self.dots),
            power_pellets: Self::sorted_positions(&self.pellets),
        }
    }

    pub fn state_frame(&self) -> OutboundFrame {
        OutboundFrame::GameState {
            state: self.snapshot(),
        }
    }

    /// Always-present positions plus only the fields whose values moved
    /// since the previous broadcast. Change flags drain here, like an event
    /// queue drains into a snapshot.
    fn build_delta(&mut self) -> DeltaFrame {
        let delta = DeltaFrame {
            pacman: PacmanDelta {
                position: self.pacman,
                direction: self.pacman_direction,
                emote: if self.emote_changed {
                    self.emote.map(str::to_string)
                } else {
                    None
                },
            },
            players: self
                .players
                .values()
                .map(|p| PlayerDelta {
                    connection_id: p.view.connection_id.clone(),
                    position: p.view.position,
                    direction: p.view.direction,
                    state: p.view.state,
                })
                .collect(),
            score: (self.score != self.shadow.score).then_some(self.score),
            capture_count: (self.capture_count != self.shadow.capture_count)
                .then_some(self.capture_count),
            mode: (self.mode != self.shadow.mode).then_some(self.mode),
            dots: self
                .dots_changed
                .then(|| Self::sorted_positions(&self.dots)),
            power_pellets: self
                .pellets_changed
                .then(|| Self::sorted_positions(&self.pellets)),
        };
        self.shadow.score = self.score;
        self.shadow.capture_count = self.capture_count;
        self.shadow.mode = self.mode;
        self.dots_changed = false;
        self.pellets_changed = false;
        self.emote_changed = false;
        delta
    }
}
