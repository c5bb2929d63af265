//! Level simulation: authoritative map, player, door and entity state.
//!
//! # Invariants
//! - The grid is immutable after load; doors animate as separate entities.
//! - All state mutations flow through explicit operations and are recorded as [`LevelEvent`]s.
//! - Spawning is deterministic for a given seed.

pub mod door;
pub mod level;
pub mod sprite;

pub use door::{DOOR_SYMBOL_XY, DOOR_SYMBOL_ZY, Door, DoorPhase};
pub use level::{Level, LevelError, LevelEvent, ModelInstance, Player, PLAYER_SYMBOL};
pub use sprite::{Blueprint, SpawnRng, SpriteEntity, SpriteFacing, SpriteKind, normalize_resolution};

pub fn crate_info() -> &'static str {
    "crawl-level v0.1.0"
}
