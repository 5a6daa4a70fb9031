//! Movement state machines for tile-to-tile object motion.
//!
//! A movement is owned by the moving object; the level transfers the
//! `here`/`reserved_by` tile links when it starts one and releases them
//! when the movement finishes or is aborted. Reservations are never left
//! behind: every exit path runs through
//! [`Level::finish_movement`](crate::level::Level) or the abort path.

use wisp_core::Coord;

/// Seconds of `advance` time per half unit of movement parameter; a
/// movement completes when the parameter reaches 2.0, i.e. after
/// `2 * STRAIGHT_DURATION` seconds.
pub const STRAIGHT_DURATION: f64 = 0.5;

/// A movement in progress.
#[derive(Clone, Debug, PartialEq)]
pub enum Movement {
    /// Linear interpolation into a 4-neighbour tile.
    Straight {
        /// Source tile.
        from: Coord,
        /// Target tile.
        to: Coord,
        /// `to - from`; exactly one axis, magnitude one.
        offset: Coord,
        /// Continuous position at movement start.
        start_x: f64,
        /// See `start_x`.
        start_y: f64,
        /// Movement parameter in `[0, 2]`.
        time: f64,
    },
    /// Roll of a round object off a round object: sideways over `via`,
    /// then down into `to`.
    Roll {
        /// Source tile.
        from: Coord,
        /// The tile rolled across; reserved until the midpoint.
        via: Coord,
        /// Target tile, below `via`.
        to: Coord,
        /// `to - from`.
        offset: Coord,
        /// Continuous position at movement start.
        start_x: f64,
        /// See `start_x`.
        start_y: f64,
        /// Movement parameter in `[0, 2]`.
        time: f64,
        /// Whether the `via` reservation has been released.
        via_released: bool,
    },
}

impl Movement {
    /// A straight movement from the object's current position.
    pub fn straight(from: Coord, to: Coord, offset: Coord, start_x: f64, start_y: f64) -> Self {
        Self::Straight {
            from,
            to,
            offset,
            start_x,
            start_y,
            time: 0.0,
        }
    }

    /// A roll from the object's current position.
    pub fn roll(from: Coord, via: Coord, to: Coord, start_x: f64, start_y: f64) -> Self {
        Self::Roll {
            from,
            via,
            to,
            offset: to - from,
            start_x,
            start_y,
            time: 0.0,
            via_released: false,
        }
    }

    /// Advance by `dt` seconds, updating the object's continuous
    /// position. Returns `true` when the movement has completed.
    pub fn advance(&mut self, dt: f64, x: &mut f64, y: &mut f64) -> bool {
        match self {
            Self::Straight {
                offset,
                start_x,
                start_y,
                time,
                ..
            } => {
                *time += dt / STRAIGHT_DURATION;
                if *time >= 2.0 {
                    *time = 2.0;
                }
                *x = *start_x + offset.x as f64 * *time / 2.0;
                *y = *start_y + offset.y as f64 * *time / 2.0;
                *time >= 2.0
            }
            Self::Roll {
                offset,
                start_x,
                start_y,
                time,
                ..
            } => {
                *time += dt / STRAIGHT_DURATION;
                if *time >= 2.0 {
                    *time = 2.0;
                }
                // Two legs over the same total duration: sideways first,
                // then down.
                *x = *start_x + offset.x as f64 * time.min(1.0);
                *y = *start_y + offset.y as f64 * (*time - 1.0).clamp(0.0, 1.0);
                *time >= 2.0
            }
        }
    }

    /// Tile-units direction of the current motion, used to weight stamp
    /// redistribution.
    pub fn velocity_vector(&self) -> Coord {
        match self {
            Self::Straight { offset, .. } => *offset,
            Self::Roll { offset, time, .. } => {
                if *time < 1.0 {
                    Coord::new(offset.x, 0)
                } else {
                    Coord::new(0, offset.y)
                }
            }
        }
    }

    /// The source tile whose reservation is held for the whole movement.
    pub fn from(&self) -> Coord {
        match self {
            Self::Straight { from, .. } | Self::Roll { from, .. } => *from,
        }
    }

    /// The target tile.
    pub fn to(&self) -> Coord {
        match self {
            Self::Straight { to, .. } | Self::Roll { to, .. } => *to,
        }
    }

    /// Total tile offset of the movement.
    pub fn offset(&self) -> Coord {
        match self {
            Self::Straight { offset, .. } | Self::Roll { offset, .. } => *offset,
        }
    }

    /// Continuous position the object snaps to on completion or abort.
    pub fn end_position(&self) -> (f64, f64) {
        match self {
            Self::Straight {
                offset,
                start_x,
                start_y,
                ..
            }
            | Self::Roll {
                offset,
                start_x,
                start_y,
                ..
            } => (start_x + offset.x as f64, start_y + offset.y as f64),
        }
    }

    /// Whether the roll has passed its midpoint (the `via` reservation
    /// can be released). Always `false` for straight movements.
    pub fn past_midpoint(&self) -> bool {
        matches!(self, Self::Roll { time, .. } if *time >= 1.0)
    }

    /// Whether this movement ends with a downward leg, which is what
    /// triggers the impact/headache chain on completion.
    pub fn lands_downward(&self) -> bool {
        match self {
            Self::Straight { offset, .. } => *offset == Coord::new(0, 1),
            Self::Roll { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_interpolates_linearly() {
        let mut movement = Movement::straight(
            Coord::new(3, 3),
            Coord::new(3, 4),
            Coord::new(0, 1),
            3.0,
            3.0,
        );
        let (mut x, mut y) = (3.0, 3.0);
        // Half the duration: parameter 1.0, position halfway.
        assert!(!movement.advance(STRAIGHT_DURATION, &mut x, &mut y));
        assert_eq!(x, 3.0);
        assert!((y - 3.5).abs() < 1e-12);
        // The rest completes and snaps.
        assert!(movement.advance(STRAIGHT_DURATION, &mut x, &mut y));
        assert!((y - 4.0).abs() < 1e-12);
    }

    #[test]
    fn straight_completes_in_one_big_step() {
        let mut movement = Movement::straight(
            Coord::new(0, 0),
            Coord::new(1, 0),
            Coord::new(1, 0),
            0.0,
            0.0,
        );
        let (mut x, mut y) = (0.0, 0.0);
        assert!(movement.advance(10.0, &mut x, &mut y));
        assert_eq!(x, 1.0);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn roll_moves_sideways_then_down() {
        let mut movement = Movement::roll(
            Coord::new(5, 5),
            Coord::new(4, 5),
            Coord::new(4, 6),
            5.0,
            5.0,
        );
        let (mut x, mut y) = (5.0, 5.0);
        // First leg: horizontal only.
        assert!(!movement.advance(STRAIGHT_DURATION, &mut x, &mut y));
        assert!((x - 4.0).abs() < 1e-12);
        assert_eq!(y, 5.0);
        assert!(movement.past_midpoint());
        // Second leg: vertical only.
        assert!(movement.advance(STRAIGHT_DURATION, &mut x, &mut y));
        assert!((x - 4.0).abs() < 1e-12);
        assert!((y - 6.0).abs() < 1e-12);
    }

    #[test]
    fn roll_velocity_follows_the_leg() {
        let mut movement = Movement::roll(
            Coord::new(5, 5),
            Coord::new(6, 5),
            Coord::new(6, 6),
            5.0,
            5.0,
        );
        assert_eq!(movement.velocity_vector(), Coord::new(1, 0));
        let (mut x, mut y) = (5.0, 5.0);
        movement.advance(STRAIGHT_DURATION, &mut x, &mut y);
        assert_eq!(movement.velocity_vector(), Coord::new(0, 1));
    }

    #[test]
    fn landing_detection() {
        let down = Movement::straight(
            Coord::new(0, 0),
            Coord::new(0, 1),
            Coord::new(0, 1),
            0.0,
            0.0,
        );
        let side = Movement::straight(
            Coord::new(0, 0),
            Coord::new(1, 0),
            Coord::new(1, 0),
            0.0,
            0.0,
        );
        let roll = Movement::roll(
            Coord::new(0, 0),
            Coord::new(1, 0),
            Coord::new(1, 1),
            0.0,
            0.0,
        );
        assert!(down.lands_downward());
        assert!(!side.lands_downward());
        assert!(roll.lands_downward());
    }

    #[test]
    fn end_position_is_the_target_tile() {
        let movement = Movement::roll(
            Coord::new(2, 2),
            Coord::new(3, 2),
            Coord::new(3, 3),
            2.0,
            2.0,
        );
        assert_eq!(movement.end_position(), (3.0, 3.0));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn straight_position_stays_on_the_segment(
                steps in prop::collection::vec(0.001f64..0.3, 1..64),
            ) {
                let mut movement = Movement::straight(
                    Coord::new(2, 2),
                    Coord::new(3, 2),
                    Coord::new(1, 0),
                    2.0,
                    2.0,
                );
                let (mut x, mut y) = (2.0, 2.0);
                let mut finished = false;
                for dt in steps {
                    finished = movement.advance(dt, &mut x, &mut y);
                    prop_assert!((2.0..=3.0).contains(&x), "x left the segment: {x}");
                    prop_assert_eq!(y, 2.0);
                    if finished {
                        break;
                    }
                }
                if finished {
                    prop_assert_eq!(x, 3.0);
                }
            }

            #[test]
            fn roll_always_finishes_within_total_duration(
                dt in 0.01f64..0.5,
            ) {
                let mut movement = Movement::roll(
                    Coord::new(5, 5),
                    Coord::new(6, 5),
                    Coord::new(6, 6),
                    5.0,
                    5.0,
                );
                let (mut x, mut y) = (5.0, 5.0);
                let mut elapsed = 0.0;
                while !movement.advance(dt, &mut x, &mut y) {
                    elapsed += dt;
                    prop_assert!(
                        elapsed <= 2.0 * STRAIGHT_DURATION + dt,
                        "movement overran its duration"
                    );
                }
                prop_assert_eq!((x, y), (6.0, 6.0));
            }
        }
    }
}
