use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostIdentity {
    Blinky,
    Pinky,
    Inky,
    Clyde,
}

impl GhostIdentity {
    pub const ALL: [GhostIdentity; 4] = [
        GhostIdentity::Blinky,
        GhostIdentity::Pinky,
        GhostIdentity::Inky,
        GhostIdentity::Clyde,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "blinky" => Some(Self::Blinky),
            "pinky" => Some(Self::Pinky),
            "inky" => Some(Self::Inky),
            "clyde" => Some(Self::Clyde),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerLifecycle {
    Active,
    Frightened,
    Respawning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Chase,
    Frightened,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Ghosts,
    Pacman,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: Pos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn key(self) -> (i32, i32) {
        (self.x, self.y)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    #[serde(rename = "connectionId")]
    pub connection_id: String,
    pub name: String,
    pub ghost: GhostIdentity,
    pub position: Pos,
    pub direction: Direction,
    pub state: PlayerLifecycle,
    pub ready: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct PacmanView {
    pub position: Pos,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emote: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoomSnapshot {
    #[serde(rename = "roomCode")]
    pub room_code: String,
    pub started: bool,
    pub mode: GameMode,
    pub score: i32,
    #[serde(rename = "captureCount")]
    pub capture_count: u32,
    #[serde(rename = "timeRemainingMs")]
    pub time_remaining_ms: u64,
    pub tick: u64,
    pub pacman: PacmanView,
    pub players: Vec<PlayerView>,
    pub dots: Vec<Pos>,
    #[serde(rename = "powerPellets")]
    pub power_pellets: Vec<Pos>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PacmanDelta {
    pub position: Pos,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emote: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerDelta {
    #[serde(rename = "connectionId")]
    pub connection_id: String,
    pub position: Pos,
    pub direction: Direction,
    pub state: PlayerLifecycle,
}

/// One tick's outbound update. `pacman` and `players` are always present;
/// everything else only when its value changed since the last broadcast.
#[derive(Clone, Debug, Serialize)]
pub struct DeltaFrame {
    pub pacman: PacmanDelta,
    pub players: Vec<PlayerDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(rename = "captureCount", skip_serializing_if = "Option::is_none")]
    pub capture_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<GameMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dots: Option<Vec<Pos>>,
    #[serde(rename = "powerPellets", skip_serializing_if = "Option::is_none")]
    pub power_pellets: Option<Vec<Pos>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    #[serde(rename = "gameState")]
    GameState { state: RoomSnapshot },
    #[serde(rename = "gameUpdate")]
    GameUpdate {
        #[serde(flatten)]
        delta: DeltaFrame,
    },
    #[serde(rename = "timerUpdate")]
    TimerUpdate {
        #[serde(rename = "timeRemainingMs")]
        time_remaining_ms: u64,
    },
    #[serde(rename = "gameOver")]
    GameOver {
        winner: Winner,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        score: i32,
    },
    #[serde(rename = "gameStarted")]
    GameStarted,
    #[serde(rename = "gameRestarted")]
    GameRestarted,
    #[serde(rename = "playerLeft")]
    PlayerLeft {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinError {
    RoomNotFound,
    RoomStarted,
    RoomFull,
    GhostTaken,
}

impl JoinError {
    pub fn code(self) -> &'static str {
        match self {
            Self::RoomNotFound => "roomNotFound",
            Self::RoomStarted => "roomStarted",
            Self::RoomFull => "roomFull",
            Self::GhostTaken => "ghostTaken",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::RoomNotFound => "room not found",
            Self::RoomStarted => "game already started in this room",
            Self::RoomFull => "room is full",
            Self::GhostTaken => "that ghost is already taken",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trips_through_parse() {
        for dir in Direction::ALL {
            let text = serde_json::to_value(dir).expect("serialize direction");
            let parsed = Direction::parse_move(text.as_str().expect("string"));
            assert_eq!(parsed, Some(dir));
        }
    }

    #[test]
    fn direction_deltas_are_unit_vectors() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert_eq!(dx.abs() + dy.abs(), 1);
        }
    }

    #[test]
    fn opposite_is_an_involution() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn delta_frame_omits_unchanged_fields() {
        let frame = OutboundFrame::GameUpdate {
            delta: DeltaFrame {
                pacman: PacmanDelta {
                    position: Pos::new(1, 2),
                    direction: Direction::Left,
                    emote: None,
                },
                players: Vec::new(),
                score: None,
                capture_count: None,
                mode: None,
                dots: None,
                power_pellets: None,
            },
        };
        let value = serde_json::to_value(&frame).expect("serialize frame");
        assert_eq!(value["type"], "gameUpdate");
        assert!(value.get("score").is_none());
        assert!(value.get("mode").is_none());
        assert!(value.get("dots").is_none());
        assert_eq!(value["pacman"]["position"]["x"], 1);
    }

    #[test]
    fn game_over_frame_carries_winner_string() {
        let frame = OutboundFrame::GameOver {
            winner: Winner::Ghosts,
            reason: None,
            score: 420,
        };
        let value = serde_json::to_value(&frame).expect("serialize frame");
        assert_eq!(value["type"], "gameOver");
        assert_eq!(value["winner"], "ghosts");
        assert!(value.get("reason").is_none());
    }

    #[test]
    fn join_error_codes_are_stable() {
        assert_eq!(JoinError::RoomNotFound.code(), "roomNotFound");
        assert_eq!(JoinError::GhostTaken.code(), "ghostTaken");
    }
}
