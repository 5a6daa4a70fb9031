//! Reading level documents from a byte stream.

use std::io::Read;

use crate::codec::decode_doc;
use crate::error::SaveError;
use crate::types::LevelDoc;

/// Read and validate a level document.
///
/// # Errors
///
/// [`SaveError::InvalidMagic`], [`SaveError::UnsupportedVersion`],
/// [`SaveError::Malformed`] or an I/O failure.
pub fn read_level(r: &mut dyn Read) -> Result<LevelDoc, SaveError> {
    decode_doc(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::write_level;

    #[test]
    fn reads_what_the_writer_wrote() {
        let doc = LevelDoc::empty(5, 5);
        let mut buf = Vec::new();
        write_level(&mut buf, &doc).unwrap();
        let got = read_level(&mut buf.as_slice()).unwrap();
        assert_eq!(doc, got);
    }
}
