//! Object shape masks over the fine grid.
//!
//! A [`CellStamp`] is the raw boolean mask an object class is authored
//! with; a [`Stamp`] is the derived, immutable form the automaton consumes:
//! the list of occupied offsets in iteration order plus the de-duplicated
//! border ring used as redistribution targets when the stamp displaces
//! matter.

use smallvec::SmallVec;

use crate::config::{CELL_STAMP_LENGTH, SUBDIVISION_COUNT};
use crate::coord::Coord;

const SIDE: usize = SUBDIVISION_COUNT as usize;

/// Raw boolean occupancy mask, `SUBDIVISION_COUNT` cells on a side,
/// row-major from the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellStamp(pub [bool; CELL_STAMP_LENGTH]);

impl CellStamp {
    /// An entirely clear mask.
    pub const fn empty() -> Self {
        Self([false; CELL_STAMP_LENGTH])
    }

    /// An entirely occupied mask.
    pub const fn full() -> Self {
        Self([true; CELL_STAMP_LENGTH])
    }

    /// Occupancy at `(x, y)` within the mask.
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.0[x + y * SIDE]
    }
}

impl From<[bool; CELL_STAMP_LENGTH]> for CellStamp {
    fn from(mask: [bool; CELL_STAMP_LENGTH]) -> Self {
        Self(mask)
    }
}

/// Immutable shape mask with derived iteration order and border.
///
/// Construction walks the mask once to extract `map_coords` (the occupied
/// offsets, row-major) and once more to find `border`: every 4-neighbour
/// of an occupied cell that lies within the mask box augmented by one and
/// is not itself occupied, each offset recorded once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    mask: CellStamp,
    map_coords: SmallVec<[Coord; CELL_STAMP_LENGTH]>,
    border: SmallVec<[Coord; 32]>,
}

impl Stamp {
    /// Derive a stamp from a raw mask.
    pub fn new(mask: CellStamp) -> Self {
        let mut map_coords: SmallVec<[Coord; CELL_STAMP_LENGTH]> = SmallVec::new();
        for y in 0..SIDE {
            for x in 0..SIDE {
                if mask.get(x, y) {
                    map_coords.push(Coord::new(x as i32, y as i32));
                }
            }
        }

        // Dedup table over the box augmented by one on every side.
        let index_side = SIDE + 2;
        let mut seen = vec![false; index_side * index_side];
        let mut border: SmallVec<[Coord; 32]> = SmallVec::new();
        for &coord in &map_coords {
            for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                let nx: i32 = coord.x + dx;
                let ny: i32 = coord.y + dy;
                let in_mask = (0..SIDE as i32).contains(&nx)
                    && (0..SIDE as i32).contains(&ny)
                    && mask.get(nx as usize, ny as usize);
                if in_mask {
                    continue;
                }
                let key = (ny + 1) as usize * index_side + (nx + 1) as usize;
                if !seen[key] {
                    seen[key] = true;
                    border.push(Coord::new(nx, ny));
                }
            }
        }

        Self {
            mask,
            map_coords,
            border,
        }
    }

    /// Whether the mask occupies at least one cell.
    pub fn non_empty(&self) -> bool {
        !self.map_coords.is_empty()
    }

    /// Occupied offsets relative to the top-left corner, row-major.
    pub fn map_coords(&self) -> &[Coord] {
        &self.map_coords
    }

    /// De-duplicated border offsets; may extend one cell outside the box.
    pub fn border(&self) -> &[Coord] {
        &self.border
    }

    /// The raw occupancy mask.
    pub fn mask(&self) -> &CellStamp {
        &self.mask
    }
}

impl From<CellStamp> for Stamp {
    fn from(mask: CellStamp) -> Self {
        Self::new(mask)
    }
}
