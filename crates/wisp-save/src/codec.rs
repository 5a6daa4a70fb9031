//! Binary encode/decode for the level format.
//!
//! All integers are little-endian. Strings and byte arrays are
//! length-prefixed with a `u32` length. Argument values carry a one-byte
//! variant tag.

use std::io::{Read, Write};

use wisp_core::Coord;
use wisp_level::TileArgValue;

use crate::error::SaveError;
use crate::types::{LevelDoc, TileArg, TileCell};
use crate::{FORMAT_VERSION, MAGIC};

// Value variant tags.
const TAG_SVAL: u8 = 1;
const TAG_FVAL: u8 = 2;
const TAG_DVAL: u8 = 3;
const TAG_IVAL: u8 = 4;
const TAG_UIVAL: u8 = 5;
const TAG_BVAL: u8 = 6;
const TAG_BINVAL: u8 = 7;
const TAG_PVAL: u8 = 8;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), SaveError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), SaveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), SaveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i32.
pub fn write_i32_le(w: &mut dyn Write, v: i32) -> Result<(), SaveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i64.
pub fn write_i64_le(w: &mut dyn Write, v: i64) -> Result<(), SaveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f32.
pub fn write_f32_le(w: &mut dyn Write, v: f32) -> Result<(), SaveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), SaveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), SaveError> {
    write_u32_le(w, s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), SaveError> {
    write_u32_le(w, b.len() as u32)?;
    w.write_all(b)?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, SaveError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, SaveError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, SaveError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian i32.
pub fn read_i32_le(r: &mut dyn Read) -> Result<i32, SaveError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a little-endian i64.
pub fn read_i64_le(r: &mut dyn Read) -> Result<i64, SaveError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Read a little-endian f32.
pub fn read_f32_le(r: &mut dyn Read) -> Result<f32, SaveError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, SaveError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, SaveError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| SaveError::Malformed {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

/// Read a length-prefixed byte array.
pub fn read_length_prefixed_bytes(r: &mut dyn Read) -> Result<Vec<u8>, SaveError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

// ── Argument encode/decode ──────────────────────────────────────

/// Encode one tile argument: type, variant tag, value.
pub fn encode_arg(w: &mut dyn Write, arg: &TileArg) -> Result<(), SaveError> {
    write_i32_le(w, arg.arg_type)?;
    match &arg.value {
        TileArgValue::Str(s) => {
            write_u8(w, TAG_SVAL)?;
            write_length_prefixed_str(w, s)?;
        }
        TileArgValue::F32(v) => {
            write_u8(w, TAG_FVAL)?;
            write_f32_le(w, *v)?;
        }
        TileArgValue::F64(v) => {
            write_u8(w, TAG_DVAL)?;
            write_f64_le(w, *v)?;
        }
        TileArgValue::I64(v) => {
            write_u8(w, TAG_IVAL)?;
            write_i64_le(w, *v)?;
        }
        TileArgValue::U64(v) => {
            write_u8(w, TAG_UIVAL)?;
            write_u64_le(w, *v)?;
        }
        TileArgValue::Bool(v) => {
            write_u8(w, TAG_BVAL)?;
            write_u8(w, u8::from(*v))?;
        }
        TileArgValue::Bytes(b) => {
            write_u8(w, TAG_BINVAL)?;
            write_length_prefixed_bytes(w, b)?;
        }
        TileArgValue::Point(p) => {
            write_u8(w, TAG_PVAL)?;
            write_i32_le(w, p.x)?;
            write_i32_le(w, p.y)?;
        }
    }
    Ok(())
}

/// Decode one tile argument.
pub fn decode_arg(r: &mut dyn Read) -> Result<TileArg, SaveError> {
    let arg_type = read_i32_le(r)?;
    let tag = read_u8(r)?;
    let value = match tag {
        TAG_SVAL => TileArgValue::Str(read_length_prefixed_str(r)?),
        TAG_FVAL => TileArgValue::F32(read_f32_le(r)?),
        TAG_DVAL => TileArgValue::F64(read_f64_le(r)?),
        TAG_IVAL => TileArgValue::I64(read_i64_le(r)?),
        TAG_UIVAL => TileArgValue::U64(read_u64_le(r)?),
        TAG_BVAL => match read_u8(r)? {
            0 => TileArgValue::Bool(false),
            1 => TileArgValue::Bool(true),
            other => {
                return Err(SaveError::Malformed {
                    detail: format!("invalid bool byte {other}"),
                })
            }
        },
        TAG_BINVAL => TileArgValue::Bytes(read_length_prefixed_bytes(r)?),
        TAG_PVAL => {
            let x = read_i32_le(r)?;
            let y = read_i32_le(r)?;
            TileArgValue::Point(Coord::new(x, y))
        }
        other => {
            return Err(SaveError::Malformed {
                detail: format!("unknown value tag {other}"),
            })
        }
    };
    Ok(TileArg { arg_type, value })
}

// ── Cell encode/decode ──────────────────────────────────────────

/// Encode one cell: tileset index, tile UUID, argument list.
pub fn encode_cell(w: &mut dyn Write, cell: &TileCell) -> Result<(), SaveError> {
    write_u32_le(w, cell.tileset)?;
    write_length_prefixed_str(w, &cell.tile)?;
    write_u32_le(w, cell.argv.len() as u32)?;
    for arg in &cell.argv {
        encode_arg(w, arg)?;
    }
    Ok(())
}

/// Decode one cell.
pub fn decode_cell(r: &mut dyn Read) -> Result<TileCell, SaveError> {
    let tileset = read_u32_le(r)?;
    let tile = read_length_prefixed_str(r)?;
    let argc = read_u32_le(r)? as usize;
    let mut argv = Vec::with_capacity(argc.min(64));
    for _ in 0..argc {
        argv.push(decode_arg(r)?);
    }
    Ok(TileCell {
        tileset,
        tile,
        argv,
    })
}

// ── Document encode/decode ──────────────────────────────────────

/// Encode a whole document: magic, version, dimensions, cells.
pub fn encode_doc(w: &mut dyn Write, doc: &LevelDoc) -> Result<(), SaveError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_i32_le(w, doc.width)?;
    write_i32_le(w, doc.height)?;
    for cell in &doc.cells {
        encode_cell(w, cell)?;
    }
    Ok(())
}

/// Decode and validate a whole document.
pub fn decode_doc(r: &mut dyn Read) -> Result<LevelDoc, SaveError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(SaveError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(SaveError::UnsupportedVersion { found: version });
    }

    let width = read_i32_le(r)?;
    let height = read_i32_le(r)?;
    if width <= 0 || height <= 0 {
        return Err(SaveError::Malformed {
            detail: format!("non-positive dimensions {width}x{height}"),
        });
    }
    let count = (width as i64) * (height as i64);
    let mut cells = Vec::with_capacity(count.min(1 << 20) as usize);
    for _ in 0..count {
        cells.push(decode_cell(r)?);
    }
    Ok(LevelDoc {
        width,
        height,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = TileArgValue> {
        prop_oneof![
            "[a-zA-Z0-9 _-]{0,24}".prop_map(TileArgValue::Str),
            any::<f32>().prop_map(TileArgValue::F32),
            any::<f64>().prop_map(TileArgValue::F64),
            any::<i64>().prop_map(TileArgValue::I64),
            any::<u64>().prop_map(TileArgValue::U64),
            any::<bool>().prop_map(TileArgValue::Bool),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(TileArgValue::Bytes),
            (any::<i32>(), any::<i32>())
                .prop_map(|(x, y)| TileArgValue::Point(Coord::new(x, y))),
        ]
    }

    fn arb_arg() -> impl Strategy<Value = TileArg> {
        (any::<i32>(), arb_value()).prop_map(|(arg_type, value)| TileArg { arg_type, value })
    }

    fn arb_cell() -> impl Strategy<Value = TileCell> {
        (
            0u32..2,
            "[a-f0-9-]{0,36}",
            prop::collection::vec(arb_arg(), 0..4),
        )
            .prop_map(|(tileset, tile, argv)| TileCell {
                tileset,
                tile,
                argv,
            })
    }

    fn bits_equal(a: &TileArgValue, b: &TileArgValue) -> bool {
        match (a, b) {
            // NaN-safe float comparison.
            (TileArgValue::F32(x), TileArgValue::F32(y)) => x.to_bits() == y.to_bits(),
            (TileArgValue::F64(x), TileArgValue::F64(y)) => x.to_bits() == y.to_bits(),
            _ => a == b,
        }
    }

    proptest! {
        #[test]
        fn roundtrip_arg(arg in arb_arg()) {
            let mut buf = Vec::new();
            encode_arg(&mut buf, &arg).unwrap();
            let got = decode_arg(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(arg.arg_type, got.arg_type);
            prop_assert!(bits_equal(&arg.value, &got.value));
        }

        #[test]
        fn roundtrip_cell(cell in arb_cell()) {
            let mut buf = Vec::new();
            encode_cell(&mut buf, &cell).unwrap();
            let got = decode_cell(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(cell.tileset, got.tileset);
            prop_assert_eq!(&cell.tile, &got.tile);
            prop_assert_eq!(cell.argv.len(), got.argv.len());
            for (a, b) in cell.argv.iter().zip(&got.argv) {
                prop_assert_eq!(a.arg_type, b.arg_type);
                prop_assert!(bits_equal(&a.value, &b.value));
            }
        }
    }

    #[test]
    fn roundtrip_document() {
        let mut doc = LevelDoc::empty(4, 3);
        *doc.cell_mut(1, 2) = TileCell {
            tileset: 0,
            tile: "abcd-1234".into(),
            argv: vec![TileArg {
                arg_type: 1,
                value: TileArgValue::F32(2.5),
            }],
        };
        let mut buf = Vec::new();
        encode_doc(&mut buf, &doc).unwrap();
        let got = decode_doc(&mut buf.as_slice()).unwrap();
        assert_eq!(doc, got);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let data = b"XLVL\x01";
        let result = decode_doc(&mut data.as_slice());
        assert!(matches!(result, Err(SaveError::InvalidMagic)));
    }

    #[test]
    fn bad_version_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(99);
        let result = decode_doc(&mut buf.as_slice());
        assert!(matches!(
            result,
            Err(SaveError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn truncated_cell_is_an_error() {
        let mut buf = Vec::new();
        encode_doc(&mut buf, &LevelDoc::empty(2, 2)).unwrap();
        buf.truncate(buf.len() - 3);
        let result = decode_doc(&mut buf.as_slice());
        assert!(result.is_err());
    }

    #[test]
    fn invalid_bool_byte_is_rejected() {
        let mut buf = Vec::new();
        write_i32_le(&mut buf, 7).unwrap();
        write_u8(&mut buf, TAG_BVAL).unwrap();
        write_u8(&mut buf, 3).unwrap();
        let result = decode_arg(&mut buf.as_slice());
        assert!(matches!(result, Err(SaveError::Malformed { .. })));
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(FORMAT_VERSION);
        write_i32_le(&mut buf, -1).unwrap();
        write_i32_le(&mut buf, 5).unwrap();
        let result = decode_doc(&mut buf.as_slice());
        assert!(matches!(result, Err(SaveError::Malformed { .. })));
    }
}
