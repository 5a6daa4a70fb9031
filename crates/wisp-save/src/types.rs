//! In-memory form of a saved level.

use wisp_level::TileArgValue;

/// One typed tile argument, as stored on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct TileArg {
    /// Application-defined argument type
    /// (e.g. [`wisp_level::tileset::ARG_INITIAL_TEMPERATURE`]).
    pub arg_type: i32,
    /// The value.
    pub value: TileArgValue,
}

/// One cell of a saved level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileCell {
    /// Tileset index; only tileset 0 is defined.
    pub tileset: u32,
    /// Tile UUID string; empty means the cell is empty.
    pub tile: String,
    /// Placement arguments.
    pub argv: Vec<TileArg>,
}

impl TileCell {
    /// Whether the cell holds no tile.
    pub fn is_empty(&self) -> bool {
        self.tile.is_empty()
    }
}

/// A decoded level document: a flat row-major cell array.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelDoc {
    /// Width in tiles.
    pub width: i32,
    /// Height in tiles.
    pub height: i32,
    /// `width * height` cells, row-major.
    pub cells: Vec<TileCell>,
}

impl LevelDoc {
    /// An all-empty document of the given dimensions.
    pub fn empty(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![TileCell::default(); (width * height).max(0) as usize],
        }
    }

    /// Borrow the cell at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when the coordinate is out of bounds.
    pub fn cell(&self, x: i32, y: i32) -> &TileCell {
        &self.cells[(x + y * self.width) as usize]
    }

    /// Mutably borrow the cell at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when the coordinate is out of bounds.
    pub fn cell_mut(&mut self, x: i32, y: i32) -> &mut TileCell {
        &mut self.cells[(x + y * self.width) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_doc_has_empty_cells() {
        let doc = LevelDoc::empty(3, 2);
        assert_eq!(doc.cells.len(), 6);
        assert!(doc.cell(2, 1).is_empty());
    }
}
