//! Player weapons.

use wisp_core::Coord;

use crate::level::Level;

/// Ticks of continuous fire that consume one unit of fuel.
const SUBTICKS_PER_FUEL: u64 = 10;

/// Fire particles sprayed per trigger tick.
const PARTICLES_PER_BURST: usize = 4;

/// A usable weapon carried by an object.
pub trait Weapon {
    /// Whether the weapon is out of ammunition.
    fn empty(&self) -> bool;

    /// Discharge for one tick from the user's tile toward `direction`.
    fn fire(&mut self, level: &mut Level, user: Coord, direction: Coord);
}

/// Fuel-driven flamethrower spraying fire particles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flamethrower {
    fuel: u64,
    subticks: u64,
}

impl Flamethrower {
    /// A flamethrower with the given fuel units.
    pub fn new(fuel: u64) -> Self {
        Self { fuel, subticks: 0 }
    }

    /// Remaining fuel units.
    pub fn fuel(&self) -> u64 {
        self.fuel
    }
}

impl Default for Flamethrower {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Weapon for Flamethrower {
    fn empty(&self) -> bool {
        self.fuel == 0
    }

    fn fire(&mut self, level: &mut Level, user: Coord, direction: Coord) {
        if self.fuel == 0 {
            return;
        }
        self.subticks += 1;
        if self.subticks % SUBTICKS_PER_FUEL == 0 {
            self.fuel -= 1;
        }
        level.spawn_fire(user, direction, PARTICLES_PER_BURST);
    }
}
