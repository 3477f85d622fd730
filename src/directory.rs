use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DIRECTORY_ENTRY_TTL_MS;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryEntry {
    #[serde(rename = "instanceId")]
    pub instance_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "createdAtMs")]
    pub created_at_ms: u64,
    #[serde(rename = "playerCount")]
    pub player_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DirectoryFile {
    version: u8,
    rooms: HashMap<String, DirectoryEntry>,
}

/// Optional shared room directory: a versioned JSON file mapping room codes
/// to the instance that hosts them. Every operation is fire-and-forget;
/// failures are logged and never affect room correctness.
#[derive(Debug)]
pub struct RoomDirectory {
    file_path: PathBuf,
    instance_id: String,
}

impl RoomDirectory {
    pub fn new(file_path: PathBuf, instance_id: String) -> Self {
        Self {
            file_path,
            instance_id,
        }
    }

    pub fn publish(&self, room_code: &str, player_count: usize, now_ms: u64) {
        let mut rooms = self.load(now_ms);
        rooms.insert(
            room_code.to_string(),
            DirectoryEntry {
                instance_id: self.instance_id.clone(),
                created_at: iso_timestamp(now_ms),
                created_at_ms: now_ms,
                player_count,
            },
        );
        self.store(rooms);
    }

    pub fn update_player_count(&self, room_code: &str, player_count: usize, now_ms: u64) {
        let mut rooms = self.load(now_ms);
        let Some(entry) = rooms.get_mut(room_code) else {
            return;
        };
        entry.player_count = player_count;
        self.store(rooms);
    }

    pub fn unpublish(&self, room_code: &str, now_ms: u64) {
        let mut rooms = self.load(now_ms);
        if rooms.remove(room_code).is_none() {
            return;
        }
        self.store(rooms);
    }

    pub fn entries(&self, now_ms: u64) -> HashMap<String, DirectoryEntry> {
        self.load(now_ms)
    }

    /// Tolerant load: a missing file is an empty directory, a corrupt file
    /// or unknown version is logged and treated as empty. Entries past
    /// their TTL are dropped.
    fn load(&self, now_ms: u64) -> HashMap<String, DirectoryEntry> {
        let text = match fs::read_to_string(&self.file_path) {
            Ok(text) => text,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    eprintln!(
                        "[directory] failed to read {}: {error}",
                        self.file_path.display()
                    );
                }
                return HashMap::new();
            }
        };
        let parsed: DirectoryFile = match serde_json::from_str::<DirectoryFile>(&text) {
            Ok(file) if file.version == 1 => file,
            Ok(file) => {
                eprintln!(
                    "[directory] unsupported version {} at {}",
                    file.version,
                    self.file_path.display()
                );
                return HashMap::new();
            }
            Err(error) => {
                eprintln!(
                    "[directory] failed to parse {}: {error}",
                    self.file_path.display()
                );
                return HashMap::new();
            }
        };
        parsed
            .rooms
            .into_iter()
            .filter(|(_, entry)| {
                now_ms.saturating_sub(entry.created_at_ms) < DIRECTORY_ENTRY_TTL_MS
            })
            .collect()
    }

    fn store(&self, rooms: HashMap<String, DirectoryEntry>) {
        if let Some(parent) = self.file_path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                eprintln!(
                    "[directory] failed to create parent dir {}: {error}",
                    parent.display()
                );
                return;
            }
        }
        let payload = DirectoryFile { version: 1, rooms };
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => {
                if let Err(error) = fs::write(&self.file_path, text) {
                    eprintln!(
                        "[directory] failed to write {}: {error}",
                        self.file_path.display()
                    );
                }
            }
            Err(error) => {
                eprintln!(
                    "[directory] failed to serialize {}: {error}",
                    self.file_path.display()
                );
            }
        }
    }
}

fn iso_timestamp(now_ms: u64) -> String {
    match Utc.timestamp_millis_opt(now_ms as i64).single() {
        Some(stamp) => stamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let unique = format!("{}-{}-{}", name, std::process::id(), rand::random::<u32>());
        std::env::temp_dir().join(unique).join("rooms.json")
    }

    #[test]
    fn publish_update_unpublish_round_trip() {
        let path = temp_path("directory-roundtrip");
        let directory = RoomDirectory::new(path.clone(), "instance_1".to_string());

        directory.publish("AB12", 1, 10_000);
        directory.update_player_count("AB12", 3, 11_000);
        let entries = directory.entries(12_000);
        let entry = entries.get("AB12").expect("entry exists");
        assert_eq!(entry.player_count, 3);
        assert_eq!(entry.instance_id, "instance_1");
        assert_eq!(entry.created_at_ms, 10_000);
        assert!(!entry.created_at.is_empty());

        directory.unpublish("AB12", 13_000);
        assert!(directory.entries(14_000).is_empty());

        let _ = fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let path = temp_path("directory-ttl");
        let directory = RoomDirectory::new(path.clone(), "instance_1".to_string());
        directory.publish("OLD1", 2, 1_000);
        assert_eq!(directory.entries(1_000 + DIRECTORY_ENTRY_TTL_MS - 1).len(), 1);
        assert!(directory
            .entries(1_000 + DIRECTORY_ENTRY_TTL_MS)
            .is_empty());

        let _ = fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let path = temp_path("directory-corrupt");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, "{ not json").expect("write file");
        let directory = RoomDirectory::new(path.clone(), "instance_1".to_string());
        assert!(directory.entries(1_000).is_empty());
        // Publishing over a corrupt file recovers it.
        directory.publish("GOOD", 1, 2_000);
        assert_eq!(directory.entries(2_500).len(), 1);

        let _ = fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn unknown_version_is_ignored() {
        let path = temp_path("directory-version");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, r#"{"version": 9, "rooms": {}}"#).expect("write file");
        let directory = RoomDirectory::new(path.clone(), "instance_1".to_string());
        assert!(directory.entries(1_000).is_empty());

        let _ = fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }
}
