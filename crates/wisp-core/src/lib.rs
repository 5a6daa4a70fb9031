//! Core types for the Wisp grid-physics engine.
//!
//! This is the leaf crate with zero internal Wisp dependencies. It defines
//! the fundamental vocabulary shared by the automaton, the level layer and
//! the server: coordinates, cell scalars, stamps, simulation tuning and
//! error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cell;
pub mod config;
pub mod coord;
pub mod error;
pub mod stamp;

// Re-export core types at crate root for convenience.
pub use cell::{Cell, CellInfo, CellMetadata};
pub use config::{
    SimulationConfig, AIRTEMPCOEFF_PER_PRESSURE, CELL_STAMP_LENGTH, DEFAULT_LEVEL_HEIGHT,
    DEFAULT_LEVEL_WIDTH, EXPLOSION_BLOCK_LIFETIME, EXPLOSION_TRIGGER_TIMEOUT,
    FIRE_PARTICLE_TEMPERATURE_RISE, SUBDIVISION_COUNT,
};
pub use coord::{Coord, ObjectId, TickCounter};
pub use error::{LevelError, PhysicsError, TilesetError};
pub use stamp::{CellStamp, Stamp};
