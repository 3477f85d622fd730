pub const TICK_RATE: u32 = 20;
pub const TICK_PERIOD_MS: u64 = 1000 / TICK_RATE as u64;

pub const GRID_WIDTH: i32 = 28;
pub const GRID_HEIGHT: i32 = 35;

pub const MAX_PLAYERS_PER_ROOM: usize = 4;
pub const ROOM_CODE_LEN: usize = 4;

pub const FRIGHTENED_DURATION_MS: u64 = 10_000;
pub const RESPAWN_DELAY_MS: u64 = 5_000;
pub const MATCH_DURATION_MS: u64 = 180_000;

pub const CAPTURES_TO_WIN: u32 = 3;
pub const BASE_CAPTURE_SCORE: f64 = 200.0;
pub const CAPTURE_MULTIPLIER: f64 = 1.5;
pub const CAPTURE_NEARBY_RADIUS: i32 = 3;
pub const DOT_VALUE: i32 = 10;
pub const POWER_PELLET_VALUE: i32 = 50;
pub const GHOST_EAT_SCORE: i32 = 200;

pub const EMOTE_REFRESH_TICKS: u64 = 3;

pub const ROOM_TTL_MS: u64 = 3_600_000;
pub const POST_GAME_LINGER_MS: u64 = 60_000;
pub const DIRECTORY_ENTRY_TTL_MS: u64 = 3_600_000;

// HunterBrain takes over while at least this much frightened time remains.
pub const HUNTER_MIN_REMAINING_MS: u64 = 1_000;
pub const HUNTER_KEEP_FACING_DISTANCE: i32 = 5;

pub const DEFAULT_SEARCH_DEPTH: u32 = 12;
pub const MIN_SEARCH_DEPTH: u32 = 1;
pub const MAX_SEARCH_DEPTH: u32 = 20;

// DefensiveBrain evaluation weights. Survival-biased: danger dwarfs
// everything except the urgency of grabbing a pellet while being chased.
pub const W_DANGER: f64 = -2_500.0;
pub const W_PROGRESS: f64 = 200.0;
pub const W_DIST: f64 = -3.0;
pub const W_FRIGHT_BONUS: f64 = 1_200.0;
pub const W_URGENCY: f64 = 6_000.0;
pub const W_EXPLORE: f64 = 150.0;
pub const W_POSITION: f64 = 80.0;
pub const W_CHOKE: f64 = -800.0;

pub const DEATH_SENTINEL: f64 = -100_000.0;

pub const SAFE_EXPLORE_DISTANCE: i32 = 12;
pub const URGENCY_GHOST_RADIUS: i32 = 8;
pub const EXPLORE_FOOD_RADIUS: i32 = 6;
pub const EXPLORE_GHOST_RADIUS: i32 = 8;
pub const DITHER_EXPLORE_DANGER: i32 = 10;
pub const DITHER_EXPLORE_FOOD: i32 = 8;
pub const DITHER_EXPLORE_BONUS: f64 = 0.15;
pub const DITHER_STICKY_BONUS: f64 = 0.05;
pub const GHOST_PROJECTION_SLACK: i32 = 5;
pub const FLOOD_DEPTH: i32 = 6;
pub const FLOOD_SAFE_DISTANCE: i32 = 4;
pub const CHOKE_WINDOW: i32 = 7;

pub const AVOIDANCE_RADIUS: i32 = 4;
pub const AVOIDANCE_PENALTY: i32 = 6;

// TabularPolicy aggregation weights and adjacency shaping schedule.
pub const GVF_DOT_WEIGHT: f32 = 10.0;
pub const GVF_PELLET_WEIGHT: f32 = 50.0;
pub const GVF_GHOST_WEIGHT: f32 = -1_000.0;
pub const GVF_FRIGHTENED_WEIGHT: f32 = 1_000.0;
pub const SHAPING_ADJACENT_PENALTY: f32 = -500.0;
pub const SHAPING_NEAR_PENALTY: f32 = -250.0;
pub const SHAPING_MID_NUMERATOR: f32 = -100.0;
pub const SHAPING_FAR_NUMERATOR: f32 = -50.0;
pub const SHAPING_MID_RADIUS: i32 = 4;
pub const SHAPING_FAR_RADIUS: i32 = 8;
