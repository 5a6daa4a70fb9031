//! A level paired with its tile placement map.
//!
//! The automaton and object state cannot be recovered from a running
//! [`Level`] alone (stamps overwrite cells destructively), so the store
//! records the template of every placement and serializes those. Loading
//! re-instantiates each template through the tileset.

use std::io::{Read, Write};

use indexmap::IndexMap;

use wisp_core::ObjectId;
use wisp_level::{Level, TileArgv, Tileset};

use crate::error::SaveError;
use crate::reader::read_level;
use crate::types::{LevelDoc, TileArg, TileCell};
use crate::writer::write_level;

/// The recorded template of one tile placement.
#[derive(Clone, Debug, PartialEq)]
pub struct TileTemplate {
    /// Tile UUID.
    pub id: String,
    /// Placement arguments.
    pub argv: TileArgv,
}

/// A [`Level`] plus the placement map needed to save it.
pub struct LevelStore {
    level: Level,
    placements: IndexMap<(i32, i32), TileTemplate>,
}

impl LevelStore {
    /// Wrap a level. The placement map starts empty; objects placed
    /// through [`place_tile`](Self::place_tile) are recorded.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            placements: IndexMap::new(),
        }
    }

    /// The wrapped level.
    pub fn level(&self) -> &Level {
        &self.level
    }

    /// The wrapped level, mutably.
    pub fn level_mut(&mut self) -> &mut Level {
        &mut self.level
    }

    /// The recorded placement for a tile, if any.
    pub fn placement(&self, x: i32, y: i32) -> Option<&TileTemplate> {
        self.placements.get(&(x, y))
    }

    /// Instantiate a tile through the tileset, place it, and record the
    /// template for saving.
    ///
    /// # Errors
    ///
    /// [`SaveError::UnknownTile`] for an unregistered UUID; placement
    /// failures are reported as [`SaveError::Malformed`].
    pub fn place_tile(
        &mut self,
        tileset: &Tileset,
        id: &str,
        argv: TileArgv,
        x: i32,
        y: i32,
    ) -> Result<ObjectId, SaveError> {
        let object = tileset
            .make_tile(id, &argv)
            .map_err(|_| SaveError::UnknownTile { id: id.to_string() })?;
        let object_id = self
            .level
            .place_object(object, x, y, argv.initial_temperature())
            .map_err(|e| SaveError::Malformed {
                detail: format!("cannot place tile {id} at ({x}, {y}): {e}"),
            })?;
        self.placements.insert(
            (x, y),
            TileTemplate {
                id: id.to_string(),
                argv,
            },
        );
        Ok(object_id)
    }

    /// Build the document for the current placements.
    pub fn to_doc(&self) -> LevelDoc {
        let mut doc = LevelDoc::empty(self.level.width(), self.level.height());
        for (&(x, y), template) in &self.placements {
            *doc.cell_mut(x, y) = TileCell {
                tileset: 0,
                tile: template.id.clone(),
                argv: template
                    .argv
                    .0
                    .iter()
                    .map(|(arg_type, value)| TileArg {
                        arg_type: *arg_type,
                        value: value.clone(),
                    })
                    .collect(),
            };
        }
        doc
    }

    /// Serialize the placements.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures.
    pub fn save(&self, w: &mut dyn Write) -> Result<(), SaveError> {
        write_level(w, &self.to_doc())
    }

    /// Load a document, replacing the level's contents. Any failure
    /// (parse error, size mismatch, unknown tile) rolls back every
    /// placement, leaving the level empty.
    ///
    /// # Errors
    ///
    /// Decoding errors, [`SaveError::SizeMismatch`] or
    /// [`SaveError::UnknownTile`].
    pub fn load(&mut self, tileset: &Tileset, r: &mut dyn Read) -> Result<(), SaveError> {
        let doc = read_level(r)?;
        if doc.width != self.level.width() || doc.height != self.level.height() {
            return Err(SaveError::SizeMismatch {
                expected: (self.level.width(), self.level.height()),
                found: (doc.width, doc.height),
            });
        }

        self.level.clear();
        self.placements.clear();

        for y in 0..doc.height {
            for x in 0..doc.width {
                let cell = doc.cell(x, y);
                if cell.is_empty() {
                    continue;
                }
                let argv = TileArgv(
                    cell.argv
                        .iter()
                        .map(|arg| (arg.arg_type, arg.value.clone()))
                        .collect(),
                );
                if let Err(e) = self.place_tile(tileset, &cell.tile, argv, x, y) {
                    log::error!(
                        "failed to instantiate tile {} at ({x}, {y}); rolling back: {e}",
                        cell.tile
                    );
                    self.level.clear();
                    self.placements.clear();
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
