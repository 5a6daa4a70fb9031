//! Error type for level persistence.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors from encoding, decoding and applying level documents.
#[derive(Debug)]
pub enum SaveError {
    /// Underlying I/O failure.
    Io(io::Error),
    /// The file does not start with the level magic.
    InvalidMagic,
    /// The format version is not supported.
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
    /// Structurally invalid data.
    Malformed {
        /// Description of the malformation.
        detail: String,
    },
    /// The document dimensions do not match the target level.
    SizeMismatch {
        /// Dimensions of the target level.
        expected: (i32, i32),
        /// Dimensions recorded in the document.
        found: (i32, i32),
    },
    /// A tile UUID could not be resolved against the tileset; the load
    /// was rolled back.
    UnknownTile {
        /// The unresolvable UUID.
        id: String,
    },
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::InvalidMagic => write!(f, "not a level file (bad magic)"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported level format version {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed level data: {detail}"),
            Self::SizeMismatch { expected, found } => write!(
                f,
                "level size mismatch: expected {}x{}, found {}x{}",
                expected.0, expected.1, found.0, found.1
            ),
            Self::UnknownTile { id } => {
                write!(f, "unknown tile uuid {id}; load rolled back")
            }
        }
    }
}

impl Error for SaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SaveError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: SaveError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, SaveError::Io(_)));
        assert!(err.source().is_some());
    }
}
