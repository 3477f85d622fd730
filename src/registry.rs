use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::brains::{PacmanController, TabularPolicy};
use crate::constants::{POST_GAME_LINGER_MS, ROOM_CODE_LEN, ROOM_TTL_MS};
use crate::directory::RoomDirectory;
use crate::room::GameRoom;
use crate::types::{GhostIdentity, JoinError, PlayerView};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A poisoned room lock means a tick panicked mid-mutation; the state is
/// still the best we have, so keep serving it.
pub fn lock_room(room: &Mutex<GameRoom>) -> MutexGuard<'_, GameRoom> {
    match room.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct DisconnectOutcome {
    pub room_code: String,
    pub removed: PlayerView,
    pub room_torn_down: bool,
}

/// Owns room lifecycle across the whole process: code allocation, the
/// player-to-room index, TTL sweeps, and the optional shared directory.
pub struct RoomRegistry {
    rooms: HashMap<String, Arc<Mutex<GameRoom>>>,
    player_rooms: HashMap<String, String>,
    directory: Option<RoomDirectory>,
    policy: Option<Arc<TabularPolicy>>,
    search_depth: u32,
}

impl RoomRegistry {
    pub fn new(
        search_depth: u32,
        policy: Option<Arc<TabularPolicy>>,
        directory: Option<RoomDirectory>,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            directory,
            policy,
            search_depth,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn create_room(&mut self, now_ms: u64) -> String {
        let mut rng = rand::rng();
        let code = loop {
            let candidate: String = (0..ROOM_CODE_LEN)
                .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let controller = PacmanController::new(self.search_depth, self.policy.clone());
        let room = GameRoom::new(code.clone(), controller, now_ms);
        self.rooms.insert(code.clone(), Arc::new(Mutex::new(room)));
        if let Some(directory) = &self.directory {
            directory.publish(&code, 0, now_ms);
        }
        println!("[registry] room {code} created");
        code
    }

    pub fn room(&self, code: &str) -> Option<Arc<Mutex<GameRoom>>> {
        self.rooms.get(code).cloned()
    }

    pub fn room_code_of(&self, connection_id: &str) -> Option<&str> {
        self.player_rooms.get(connection_id).map(String::as_str)
    }

    pub fn room_of(&self, connection_id: &str) -> Option<Arc<Mutex<GameRoom>>> {
        let code = self.player_rooms.get(connection_id)?;
        self.rooms.get(code).cloned()
    }

    pub fn join_room(
        &mut self,
        code: &str,
        connection_id: &str,
        name: &str,
        ghost: GhostIdentity,
        now_ms: u64,
    ) -> Result<Arc<Mutex<GameRoom>>, JoinError> {
        let room = self.rooms.get(code).ok_or(JoinError::RoomNotFound)?;
        let player_count = {
            let mut guard = lock_room(room);
            guard.add_player(connection_id, name, ghost)?;
            guard.player_count()
        };
        self.player_rooms
            .insert(connection_id.to_string(), code.to_string());
        if let Some(directory) = &self.directory {
            directory.update_player_count(code, player_count, now_ms);
        }
        Ok(room.clone())
    }

    /// Removes the player from their room; an emptied room is torn down on
    /// the spot.
    pub fn handle_disconnect(
        &mut self,
        connection_id: &str,
        now_ms: u64,
    ) -> Option<DisconnectOutcome> {
        let code = self.player_rooms.remove(connection_id)?;
        let room = self.rooms.get(&code)?;
        let (removed, remaining) = {
            let mut guard = lock_room(room);
            let removed = guard.remove_player(connection_id)?;
            (removed, guard.player_count())
        };

        let room_torn_down = remaining == 0;
        if room_torn_down {
            self.teardown(&code, now_ms);
        } else if let Some(directory) = &self.directory {
            directory.update_player_count(&code, remaining, now_ms);
        }
        Some(DisconnectOutcome {
            room_code: code,
            removed,
            room_torn_down,
        })
    }

    /// Idempotent: tearing down an unknown or already-removed code is a
    /// no-op.
    pub fn teardown(&mut self, code: &str, now_ms: u64) {
        let Some(room) = self.rooms.remove(code) else {
            return;
        };
        lock_room(&room).stop();
        self.player_rooms.retain(|_, room_code| room_code != code);
        if let Some(directory) = &self.directory {
            directory.unpublish(code, now_ms);
        }
        println!("[registry] room {code} torn down");
    }

    /// Periodic cleanup: absolute 1-hour TTL, plus a linger window after
    /// game over in which restartGame can still revive the room. A room
    /// emptied by disconnects is torn down on that path, not here; a fresh
    /// room still waiting for its creator to join keeps its full TTL.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, room)| {
                let guard = lock_room(room);
                let past_ttl = now_ms.saturating_sub(guard.created_at_ms()) >= ROOM_TTL_MS;
                let past_linger = guard
                    .ended_at_ms()
                    .map(|at| now_ms.saturating_sub(at) >= POST_GAME_LINGER_MS)
                    .unwrap_or(false);
                past_ttl || past_linger
            })
            .map(|(code, _)| code.clone())
            .collect();
        for code in &expired {
            self.teardown(code, now_ms);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MATCH_DURATION_MS;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(4, None, None)
    }

    #[test]
    fn room_codes_are_four_chars_from_the_charset() {
        let mut registry = registry();
        for _ in 0..20 {
            let code = registry.create_room(1_000);
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
        assert_eq!(registry.room_count(), 20);
    }

    #[test]
    fn join_unknown_room_fails() {
        let mut registry = registry();
        assert_eq!(
            registry
                .join_room("ZZZZ", "c1", "A", GhostIdentity::Blinky, 1_000)
                .err(),
            Some(JoinError::RoomNotFound)
        );
    }

    #[test]
    fn join_indexes_the_player() {
        let mut registry = registry();
        let code = registry.create_room(1_000);
        registry
            .join_room(&code, "c1", "A", GhostIdentity::Blinky, 1_000)
            .expect("join succeeds");
        assert_eq!(registry.room_code_of("c1"), Some(code.as_str()));
        assert!(registry.room_of("c1").is_some());
    }

    #[test]
    fn disconnect_of_last_player_tears_the_room_down() {
        let mut registry = registry();
        let code = registry.create_room(1_000);
        registry
            .join_room(&code, "c1", "A", GhostIdentity::Blinky, 1_000)
            .expect("join succeeds");
        registry
            .join_room(&code, "c2", "B", GhostIdentity::Pinky, 1_000)
            .expect("join succeeds");

        let outcome = registry
            .handle_disconnect("c1", 2_000)
            .expect("player was in a room");
        assert!(!outcome.room_torn_down);
        assert_eq!(outcome.removed.connection_id, "c1");
        assert_eq!(registry.room_count(), 1);

        let outcome = registry
            .handle_disconnect("c2", 3_000)
            .expect("player was in a room");
        assert!(outcome.room_torn_down);
        assert_eq!(registry.room_count(), 0);
        assert!(registry.handle_disconnect("c2", 4_000).is_none());
    }

    #[test]
    fn sweep_enforces_the_absolute_ttl() {
        let mut registry = registry();
        let code = registry.create_room(0);
        registry
            .join_room(&code, "c1", "A", GhostIdentity::Blinky, 0)
            .expect("join succeeds");
        assert!(registry.sweep(ROOM_TTL_MS - 1).is_empty());
        let removed = registry.sweep(ROOM_TTL_MS);
        assert_eq!(removed, vec![code]);
        assert_eq!(registry.room_count(), 0);
        assert!(registry.room_code_of("c1").is_none());
    }

    #[test]
    fn sweep_leaves_fresh_unjoined_rooms_until_their_ttl() {
        let mut registry = registry();
        let code = registry.create_room(1_000);
        // Nobody has joined yet; the next sweep tick must not reap it.
        assert!(registry.sweep(1_001).is_empty());
        assert!(registry.sweep(1_000 + ROOM_TTL_MS - 1).is_empty());
        assert_eq!(registry.sweep(1_000 + ROOM_TTL_MS), vec![code]);
    }

    #[test]
    fn ended_rooms_linger_before_the_sweep_takes_them() {
        let mut registry = registry();
        let code = registry.create_room(1_000);
        let room = registry
            .join_room(&code, "c1", "A", GhostIdentity::Blinky, 1_000)
            .expect("join succeeds");
        let ended_at = {
            let mut guard = lock_room(&room);
            guard.toggle_ready("c1");
            guard.start(1_000);
            // Run the whole match clock out in one oversized step.
            let frames = guard.step(MATCH_DURATION_MS);
            assert!(!frames.is_empty());
            assert!(guard.is_ended());
            guard.ended_at_ms().expect("match ended")
        };

        assert!(registry.sweep(ended_at + POST_GAME_LINGER_MS - 1).is_empty());
        let removed = registry.sweep(ended_at + POST_GAME_LINGER_MS);
        assert_eq!(removed, vec![code]);
    }
}
