pub mod brains;
pub mod constants;
pub mod directory;
pub mod maze;
pub mod pathfinding;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod types;
