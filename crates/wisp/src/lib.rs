//! Wisp: a grid-physics puzzle-game core.
//!
//! Air pressure, fog, heat and directional flow diffuse across a fine
//! cellular grid while solid objects — walls, rocks, bombs, the player —
//! live on a coarser tile grid, stamping their footprints into the
//! automaton as they fall, roll and explode. This facade crate re-exports
//! the public API of the Wisp sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use wisp::prelude::*;
//!
//! // A small level stepped by hand (no server thread).
//! let mut level = Level::new(LevelConfig {
//!     width: 10,
//!     height: 10,
//!     time_slice: 1.0,
//!     physics_workers: Some(1),
//!     ..LevelConfig::default()
//! })
//! .unwrap();
//!
//! let rock = level.place_object(GameObject::rock(), 5, 2, 1.0).unwrap();
//! for _ in 0..10 {
//!     level.update().unwrap();
//! }
//! // Gravity has pulled the rock to the floor.
//! assert_eq!(level.object(rock).cell.y, 9);
//! ```
//!
//! For real-time use, hand the level to a [`server::Server`]: it drives
//! the tick loop on its own thread, applies queued operations between
//! ticks and gives renderers tear-free snapshots via
//! [`server::Server::sync_safe_point`].
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `wisp-core` | Cells, coordinates, stamps, configuration, errors |
//! | [`physics`] | `wisp-physics` | The multi-threaded cellular automaton |
//! | [`level`] | `wisp-level` | Tile grid, objects, movements, particles, tilesets |
//! | [`save`] | `wisp-save` | Binary level persistence |
//! | [`server`] | `wisp-server` | Real-time game thread and operation queue |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`wisp-core`).
pub mod types {
    pub use wisp_core::*;
}

/// The cellular automaton (`wisp-physics`).
pub mod physics {
    pub use wisp_physics::*;
}

/// Tile grid and game objects (`wisp-level`).
pub mod level {
    pub use wisp_level::*;
}

/// Level persistence (`wisp-save`).
pub mod save {
    pub use wisp_save::*;
}

/// Real-time server (`wisp-server`).
pub mod server {
    pub use wisp_server::*;
}

/// The most commonly used types in one import.
pub mod prelude {
    pub use wisp_core::{
        Cell, CellMetadata, CellStamp, Coord, LevelError, ObjectId, PhysicsError,
        SimulationConfig, Stamp,
    };
    pub use wisp_level::{
        standard_tileset, GameObject, Level, LevelConfig, LevelEvent, MoveDirection, ObjectKind,
        Tileset,
    };
    pub use wisp_physics::Automaton;
    pub use wisp_save::{LevelStore, SaveError};
    pub use wisp_server::{LevelOp, Server};
}
