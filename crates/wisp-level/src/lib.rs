//! Tile grid, game objects and the tick loop for the Wisp grid-physics
//! engine.
//!
//! A [`Level`] owns a coarse grid of [`LevelCell`]s, an object arena and
//! the fine-grid [`wisp_physics::Automaton`]. Each tick it waits for the
//! automaton to settle, resolves object behaviour (movement, gravity,
//! rolling, impacts, explosions), re-applies object stamps, advances the
//! particle pool and hands the automaton the next frame.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod level;
pub mod movement;
pub mod object;
pub mod particles;
pub mod tileset;
pub mod weapon;

pub use arena::ObjectArena;
pub use level::{Level, LevelCell, LevelConfig, LevelEvent, TickMetrics};
pub use movement::{Movement, STRAIGHT_DURATION};
pub use object::{FrameState, GameObject, MoveDirection, ObjectInfo, ObjectKind};
pub use particles::{Particle, ParticleKind, ParticleSystem};
pub use tileset::{standard_tileset, TileArgValue, TileArgv, TileDef, TileFactory, Tileset};
pub use weapon::{Flamethrower, Weapon};
