//! Game object kinds, their static class descriptors and per-tick state.

use std::sync::LazyLock;

use wisp_core::{CellStamp, Coord, Stamp, TickCounter, CELL_STAMP_LENGTH};

use crate::movement::Movement;
use crate::weapon::Flamethrower;

/// Flow-stamp scale applied by fans each tick.
pub const FAN_FLOW_COEFFICIENT: f64 = 0.2;

/// Static per-class descriptor shared by every object of a kind.
#[derive(Debug)]
pub struct ObjectInfo {
    /// Occupies fine-grid cells and blocks air flow.
    pub is_blocking: bool,
    /// Destroyed by explosions.
    pub is_destructible: bool,
    /// Can be consumed by the player walking into it.
    pub is_edible: bool,
    /// Subject to gravity handling each tick.
    pub is_gravity_affected: bool,
    /// Can be pushed.
    pub is_movable: bool,
    /// Round enough to roll, and to be rolled off of.
    pub is_rollable: bool,
    /// Other objects resting on it will not slide.
    pub is_sticky: bool,
    /// Rolling radius, in tiles.
    pub roll_radius: f64,
    /// Heat capacity of the blocked cells.
    pub temp_coefficient: f64,
    /// Fine-grid footprint.
    pub stamp: Stamp,
}

/// Flags and values latched for an object by the engine each tick and
/// consumed by the object's own update.
#[derive(Clone, Copy, Debug)]
pub struct FrameState {
    /// The object is inside an explosion area this tick.
    pub explode: bool,
    /// The object is being hit by igniting particles this tick.
    pub ignite: bool,
    /// Average temperature over the object's blocked cells.
    pub own_temperature: f32,
    /// Average temperature of the cells bordering the object.
    pub surr_temperature: f32,
}

impl FrameState {
    /// Clear the flags and invalidate the temperatures. Called after each
    /// processing; the engine only ever sets fields.
    pub fn reset(&mut self) {
        self.explode = false;
        self.ignite = false;
        self.own_temperature = f32::NAN;
        self.surr_temperature = f32::NAN;
    }
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            explode: false,
            ignite: false,
            own_temperature: f32::NAN,
            surr_temperature: f32::NAN,
        }
    }
}

/// A pending movement command, applied on the next tick the object is
/// free to move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MoveDirection {
    /// No pending command.
    #[default]
    None,
    /// One tile up.
    Up,
    /// One tile down.
    Down,
    /// One tile left.
    Left,
    /// One tile right.
    Right,
}

impl MoveDirection {
    /// The tile offset of the command; zero for `None`.
    pub fn offset(self) -> Coord {
        match self {
            Self::None => Coord::new(0, 0),
            Self::Up => Coord::new(0, -1),
            Self::Down => Coord::new(0, 1),
            Self::Left => Coord::new(-1, 0),
            Self::Right => Coord::new(1, 0),
        }
    }
}

/// The concrete object variants and their per-instance state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObjectKind {
    /// Plain static wall.
    Wall,
    /// Indestructible wall.
    SafeWall,
    /// Indestructible round wall; objects can roll off it.
    RoundWall,
    /// Falling, rolling boulder.
    Rock,
    /// Diggable soil block.
    Dirt,
    /// Explosive; detonates on impact or headache, or on a fuse once
    /// ignited.
    Bomb {
        /// Tick the bomb was ignited at, if any.
        ignited_at: Option<TickCounter>,
    },
    /// The player avatar.
    Player {
        /// The player's fire weapon.
        flamethrower: Flamethrower,
    },
    /// Transient explosion block.
    Explosion {
        /// Tick at which the block expires.
        die_at: TickCounter,
    },
    /// Fan blowing horizontally.
    HorizFan {
        /// Flow strength.
        intensity: f64,
    },
    /// Fan blowing vertically.
    VertFan {
        /// Flow strength.
        intensity: f64,
    },
}

/// One object on the coarse tile grid.
#[derive(Debug)]
pub struct GameObject {
    /// Variant and per-instance state.
    pub kind: ObjectKind,
    /// Static class descriptor.
    pub info: &'static ObjectInfo,
    /// Current coarse tile.
    pub cell: Coord,
    /// Continuous position, in tile units, for rendering and movement.
    pub x: f64,
    /// See [`x`](Self::x).
    pub y: f64,
    /// Orientation, for rendering.
    pub phi: f64,
    /// Top-left fine-grid coordinate of the stamp.
    pub phy: Coord,
    /// Movement in progress, if any.
    pub movement: Option<Movement>,
    /// Tick of the last full update, guarding against double updates
    /// when an object moves into a not-yet-visited tile.
    pub ticks: TickCounter,
    /// Pending movement command.
    pub acting: MoveDirection,
    /// Engine-latched per-tick inputs.
    pub frame_state: FrameState,
}

impl GameObject {
    fn with_info(kind: ObjectKind, info: &'static ObjectInfo) -> Self {
        Self {
            kind,
            info,
            cell: Coord::new(0, 0),
            x: 0.0,
            y: 0.0,
            phi: 0.0,
            phy: Coord::new(0, 0),
            movement: None,
            ticks: 0,
            acting: MoveDirection::None,
            frame_state: FrameState::default(),
        }
    }

    /// A plain wall.
    pub fn wall() -> Self {
        Self::with_info(ObjectKind::Wall, &WALL_INFO)
    }

    /// An indestructible wall.
    pub fn safe_wall() -> Self {
        Self::with_info(ObjectKind::SafeWall, &SAFE_WALL_INFO)
    }

    /// An indestructible round wall.
    pub fn round_wall() -> Self {
        Self::with_info(ObjectKind::RoundWall, &ROUND_WALL_INFO)
    }

    /// A boulder.
    pub fn rock() -> Self {
        Self::with_info(ObjectKind::Rock, &ROCK_INFO)
    }

    /// A soil block.
    pub fn dirt() -> Self {
        Self::with_info(ObjectKind::Dirt, &DIRT_INFO)
    }

    /// A bomb with an unlit fuse.
    pub fn bomb() -> Self {
        Self::with_info(ObjectKind::Bomb { ignited_at: None }, &BOMB_INFO)
    }

    /// The player avatar.
    pub fn player() -> Self {
        Self::with_info(
            ObjectKind::Player {
                flamethrower: Flamethrower::default(),
            },
            &PLAYER_INFO,
        )
    }

    /// An explosion block expiring at the given tick.
    pub fn explosion(die_at: TickCounter) -> Self {
        Self::with_info(ObjectKind::Explosion { die_at }, &EXPLOSION_INFO)
    }

    /// A horizontal fan of the given strength.
    pub fn horiz_fan(intensity: f64) -> Self {
        Self::with_info(ObjectKind::HorizFan { intensity }, &HORIZ_FAN_INFO)
    }

    /// A vertical fan of the given strength.
    pub fn vert_fan(intensity: f64) -> Self {
        Self::with_info(ObjectKind::VertFan { intensity }, &VERT_FAN_INFO)
    }
}

// ── Stamp masks ──────────────────────────────────────────────────

const O: bool = false;
const X: bool = true;

#[rustfmt::skip]
const ROUND_MASK: [bool; CELL_STAMP_LENGTH] = [
    O, X, X, X, O,
    X, X, X, X, X,
    X, X, X, X, X,
    X, X, X, X, X,
    O, X, X, X, O,
];

#[rustfmt::skip]
const SQUARE_MASK: [bool; CELL_STAMP_LENGTH] = [
    X, X, X, X, X,
    X, X, X, X, X,
    X, X, X, X, X,
    X, X, X, X, X,
    X, X, X, X, X,
];

#[rustfmt::skip]
const HORIZ_FAN_MASK: [bool; CELL_STAMP_LENGTH] = [
    O, X, X, X, O,
    O, O, O, O, O,
    O, O, O, O, O,
    O, O, O, O, O,
    O, X, X, X, O,
];

#[rustfmt::skip]
const VERT_FAN_MASK: [bool; CELL_STAMP_LENGTH] = [
    O, O, O, O, O,
    X, O, O, O, X,
    X, O, O, O, X,
    X, O, O, O, X,
    O, O, O, O, O,
];

#[rustfmt::skip]
const HORIZ_FAN_EFFECT_MASK: [bool; CELL_STAMP_LENGTH] = [
    O, O, O, O, O,
    O, O, X, O, O,
    O, O, X, O, O,
    O, O, X, O, O,
    O, O, O, O, O,
];

#[rustfmt::skip]
const VERT_FAN_EFFECT_MASK: [bool; CELL_STAMP_LENGTH] = [
    O, O, O, O, O,
    O, O, O, O, O,
    O, X, X, X, O,
    O, O, O, O, O,
    O, O, O, O, O,
];

/// Effect footprint a horizontal fan forces flow into.
pub static HORIZ_FAN_EFFECT_STAMP: LazyLock<Stamp> =
    LazyLock::new(|| Stamp::new(CellStamp(HORIZ_FAN_EFFECT_MASK)));

/// Effect footprint a vertical fan forces flow into.
pub static VERT_FAN_EFFECT_STAMP: LazyLock<Stamp> =
    LazyLock::new(|| Stamp::new(CellStamp(VERT_FAN_EFFECT_MASK)));

// ── Class descriptors ────────────────────────────────────────────

static WALL_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: true,
    is_edible: false,
    is_gravity_affected: false,
    is_movable: false,
    is_rollable: false,
    is_sticky: true,
    roll_radius: 0.0,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(SQUARE_MASK)),
});

static SAFE_WALL_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: false,
    is_edible: false,
    is_gravity_affected: false,
    is_movable: false,
    is_rollable: false,
    is_sticky: true,
    roll_radius: 0.0,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(SQUARE_MASK)),
});

static ROUND_WALL_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: false,
    is_edible: false,
    is_gravity_affected: false,
    is_movable: false,
    is_rollable: true,
    is_sticky: true,
    roll_radius: 0.5,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(ROUND_MASK)),
});

static ROCK_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: true,
    is_edible: false,
    is_gravity_affected: true,
    is_movable: true,
    is_rollable: true,
    is_sticky: false,
    roll_radius: 1.0,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(ROUND_MASK)),
});

static DIRT_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: true,
    is_edible: true,
    is_gravity_affected: true,
    is_movable: false,
    is_rollable: false,
    is_sticky: false,
    roll_radius: 0.0,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(SQUARE_MASK)),
});

static BOMB_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: true,
    is_edible: false,
    is_gravity_affected: true,
    is_movable: true,
    is_rollable: true,
    is_sticky: false,
    roll_radius: 0.5,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(ROUND_MASK)),
});

static PLAYER_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: true,
    is_edible: false,
    is_gravity_affected: false,
    is_movable: true,
    is_rollable: false,
    is_sticky: false,
    roll_radius: 0.0,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(ROUND_MASK)),
});

static EXPLOSION_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: false,
    is_edible: false,
    is_gravity_affected: false,
    is_movable: false,
    is_rollable: false,
    is_sticky: false,
    roll_radius: 0.5,
    temp_coefficient: 1.0,
    // No fine-grid footprint: air may pass through the blast area.
    stamp: Stamp::new(CellStamp::empty()),
});

static HORIZ_FAN_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: false,
    is_edible: false,
    is_gravity_affected: false,
    is_movable: false,
    is_rollable: false,
    is_sticky: false,
    roll_radius: 0.0,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(HORIZ_FAN_MASK)),
});

static VERT_FAN_INFO: LazyLock<ObjectInfo> = LazyLock::new(|| ObjectInfo {
    is_blocking: true,
    is_destructible: false,
    is_edible: false,
    is_gravity_affected: false,
    is_movable: false,
    is_rollable: false,
    is_sticky: false,
    roll_radius: 0.0,
    temp_coefficient: 1.0,
    stamp: Stamp::new(CellStamp(VERT_FAN_MASK)),
});
