//! Binary level persistence for the Wisp grid-physics engine.
//!
//! A saved level is a flat row-major array of tile cells, each holding a
//! tileset index, a tile UUID string (empty for an empty cell) and a list
//! of typed arguments. The encoding is little-endian and length-prefixed;
//! no compression, no alignment padding, no self-describing schema.
//!
//! [`LevelStore`] pairs a live [`wisp_level::Level`] with the placement
//! map needed to round-trip a document: loading instantiates objects
//! through a [`wisp_level::Tileset`] and rolls back every placement when
//! a tile UUID cannot be resolved.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod reader;
pub mod store;
pub mod types;
pub mod writer;

pub use error::SaveError;
pub use reader::read_level;
pub use store::{LevelStore, TileTemplate};
pub use types::{LevelDoc, TileArg, TileCell};
pub use writer::write_level;

/// Magic bytes at the start of every level file.
pub const MAGIC: [u8; 4] = *b"WLV1";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;
