//! Fine-grid cell scalars and per-cell obstruction metadata.

use crate::coord::{Coord, ObjectId};

/// One cell of the fine physics grid.
///
/// Flow is stored on the *downstream* cell relative to each axis: `flow[0]`
/// is the flux toward the left neighbour, `flow[1]` the flux toward the
/// upper neighbour. Every edge of the grid therefore has exactly one
/// canonical owner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cell {
    /// Air pressure (mass) in this cell.
    pub air_pressure: f64,
    /// Heat energy. Temperature is `heat_energy / temp_coefficient`.
    pub heat_energy: f64,
    /// Fog density.
    pub fog: f64,
    /// Directional flux toward the left (`[0]`) and upper (`[1]`) neighbour.
    pub flow: [f64; 2],
}

impl Cell {
    /// A cell filled with air at the given pressure and temperature,
    /// with no flow and no fog.
    pub fn with_air(pressure: f64, temperature: f64) -> Self {
        Self {
            air_pressure: pressure,
            heat_energy: temperature * crate::config::AIRTEMPCOEFF_PER_PRESSURE * pressure,
            fog: 0.0,
            flow: [0.0, 0.0],
        }
    }
}

/// Obstruction metadata, held in a parallel array next to the cells.
///
/// The automaton never inspects the occupying object beyond its heat
/// capacity, so the coefficient is denormalized in here when a stamp is
/// placed. `object` is carried along for embedders that want to map a
/// blocked cell back to its occupant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellMetadata {
    /// Whether a solid object's stamp occupies this cell.
    pub blocked: bool,
    /// Heat capacity of the blocking object; meaningless when unblocked
    /// (air cells derive theirs from pressure).
    pub temp_coefficient: f64,
    /// The occupant, if any.
    pub object: Option<ObjectId>,
}

/// One record of a batched stamp placement: a stamp-relative offset plus
/// the cell payload and metadata to install there.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellInfo {
    /// Offset within the stamp, relative to its top-left corner.
    pub offset: Coord,
    /// Cell scalars to write.
    pub cell: Cell,
    /// Metadata to write.
    pub meta: CellMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_air_scales_heat_by_pressure() {
        let cell = Cell::with_air(2.0, 1.5);
        assert_eq!(cell.air_pressure, 2.0);
        assert_eq!(cell.heat_energy, 3.0);
        assert_eq!(cell.fog, 0.0);
        assert_eq!(cell.flow, [0.0, 0.0]);
    }

    #[test]
    fn metadata_defaults_unblocked() {
        let meta = CellMetadata::default();
        assert!(!meta.blocked);
        assert!(meta.object.is_none());
    }
}
