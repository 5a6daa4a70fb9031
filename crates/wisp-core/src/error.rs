//! Error types, organized by subsystem: automaton, level, tileset.
//!
//! Policy: precondition violations fail fast as `Err` values that abort
//! the current tick; per-frame numeric anomalies (NaN/Inf flow) are
//! clamped silently during activation; running out of redistribution
//! border cells is logged and the mass discarded rather than reported.

use std::error::Error;
use std::fmt;

/// Errors from the cellular automaton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhysicsError {
    /// A stamp or grid mutation API was called while the worker set owns
    /// the buffers. All mutation must happen between `wait_for()` and
    /// `resume()`.
    EngineRunning,
    /// The grid has a zero dimension.
    EmptyGrid,
    /// The simulation configuration failed validation.
    InvalidConfig {
        /// Description of the violated constraint.
        reason: String,
    },
    /// A worker thread could not be spawned.
    ThreadSpawnFailed {
        /// Description from the OS.
        reason: String,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineRunning => {
                write!(f, "grid mutation attempted while the automaton is running")
            }
            Self::EmptyGrid => write!(f, "grid must have nonzero width and height"),
            Self::InvalidConfig { reason } => write!(f, "invalid simulation config: {reason}"),
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "failed to spawn automaton worker: {reason}")
            }
        }
    }
}

impl Error for PhysicsError {}

/// Errors from the level layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelError {
    /// A straight movement with a zero offset was requested.
    ZeroMove,
    /// A straight movement across more than one axis was requested.
    DiagonalMove,
    /// A tile coordinate lies outside the level.
    OutOfBounds {
        /// Offending column.
        x: i32,
        /// Offending row.
        y: i32,
    },
    /// The underlying automaton rejected an operation.
    Physics(PhysicsError),
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroMove => write!(f, "cannot move zero tiles"),
            Self::DiagonalMove => {
                write!(f, "cannot move diagonally or more than one tile")
            }
            Self::OutOfBounds { x, y } => write!(f, "tile ({x}, {y}) is out of bounds"),
            Self::Physics(e) => write!(f, "physics: {e}"),
        }
    }
}

impl Error for LevelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Physics(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhysicsError> for LevelError {
    fn from(e: PhysicsError) -> Self {
        Self::Physics(e)
    }
}

/// Errors from tileset registration and lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TilesetError {
    /// A tile with this UUID is already registered.
    DuplicateTile {
        /// The colliding UUID.
        id: String,
    },
    /// No tile with this UUID is registered.
    UnknownTile {
        /// The missing UUID.
        id: String,
    },
}

impl fmt::Display for TilesetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTile { id } => write!(f, "tile uuid {id} already in use"),
            Self::UnknownTile { id } => write!(f, "no tile registered for uuid {id}"),
        }
    }
}

impl Error for TilesetError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_error_wraps_physics_error() {
        let err: LevelError = PhysicsError::EngineRunning.into();
        assert!(matches!(err, LevelError::Physics(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn display_is_human_readable() {
        let err = TilesetError::DuplicateTile { id: "abcd".into() };
        assert_eq!(err.to_string(), "tile uuid abcd already in use");
    }
}
