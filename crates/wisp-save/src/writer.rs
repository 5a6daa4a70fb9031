//! Writing level documents to a byte stream.

use std::io::Write;

use crate::codec::encode_doc;
use crate::error::SaveError;
use crate::types::LevelDoc;

/// Write a level document.
///
/// # Errors
///
/// Propagates I/O failures.
pub fn write_level(w: &mut dyn Write, doc: &LevelDoc) -> Result<(), SaveError> {
    encode_doc(w, doc)
}
