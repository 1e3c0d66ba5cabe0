//! Persisted format for fragment metadata.
//!
//! The whole layout is wrapped in a gzip stream before hitting storage and
//! inflated before parsing. Inside the stream:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  range_present: u8 (0x00 absent, 0x01 present)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  range_bytes: layout.range_len() bytes (only if present)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  per attribute, in layout order:                            │
//! │  - offset_count: u64 LE                                     │
//! │  - offset_count × offset: u64 LE                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are explicit little-endian fixed-width, so the format is
//! stable across platforms regardless of native endianness or alignment.
//!
//! Decoding is all-or-nothing: any structural mismatch, truncation, or
//! malformed length field fails with `CorruptMetadata` and yields no
//! partially populated index.

use crate::error::{FragmentError, Result};
use crate::layout::{ArrayLayout, RangeBuffer};
use crate::meta::FragmentMetadata;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{ErrorKind, Read, Write};
use tracing::debug;

/// Range presence flag: no range was initialized.
const RANGE_ABSENT: u8 = 0x00;

/// Range presence flag: range bytes follow.
const RANGE_PRESENT: u8 = 0x01;

/// Cap on the offset capacity reserved up front per attribute. A corrupt
/// count larger than this still decodes one offset at a time and fails on
/// truncation instead of aborting on allocation.
const MAX_PREALLOC_OFFSETS: u64 = 4096;

/// Serializes fragment metadata into `sink` as a gzip stream.
pub fn serialize_into<W: Write>(meta: &FragmentMetadata, sink: W) -> Result<()> {
    let mut encoder = GzEncoder::new(sink, Compression::default());
    write_body(meta, &mut encoder)?;
    encoder.finish()?;

    debug!(
        attribute_count = meta.attribute_count(),
        total_offsets = meta.total_tile_count(),
        "serialized fragment metadata"
    );
    Ok(())
}

/// Deserializes fragment metadata from the gzip stream in `source`.
///
/// The recovered structure is validated against `layout`: the range length
/// and attribute count must match exactly and the stream must hold nothing
/// else.
///
/// # Errors
///
/// Returns `FragmentError::CorruptMetadata` on any structural mismatch and
/// propagates other I/O errors unchanged.
pub fn deserialize_from<R: Read>(source: R, layout: &ArrayLayout) -> Result<FragmentMetadata> {
    let mut decoder = GzDecoder::new(source);
    let meta = read_body(&mut decoder, layout)?;

    debug!(
        attribute_count = meta.attribute_count(),
        total_offsets = meta.total_tile_count(),
        "deserialized fragment metadata"
    );
    Ok(meta)
}

fn write_body<W: Write>(meta: &FragmentMetadata, writer: &mut W) -> Result<()> {
    // Range presence flag (1 byte) + range bytes
    match meta.range() {
        Some(range) => {
            writer.write_all(&[RANGE_PRESENT])?;
            writer.write_all(range.as_bytes())?;
        }
        None => writer.write_all(&[RANGE_ABSENT])?,
    }

    // Per attribute: offset count (8 bytes) + offsets (8 bytes each)
    for offsets in meta.all_tile_offsets() {
        writer.write_all(&(offsets.len() as u64).to_le_bytes())?;
        for offset in offsets {
            writer.write_all(&offset.to_le_bytes())?;
        }
    }

    Ok(())
}

fn read_body<R: Read>(reader: &mut R, layout: &ArrayLayout) -> Result<FragmentMetadata> {
    // Range presence flag (1 byte)
    let mut flag = [0u8; 1];
    read_exact(reader, &mut flag, "range presence flag")?;

    // Range bytes, length implied by the layout
    let range = match flag[0] {
        RANGE_ABSENT => None,
        RANGE_PRESENT => {
            let mut bytes = vec![0u8; layout.range_len()];
            read_exact(reader, &mut bytes, "range bytes")?;
            let range = RangeBuffer::from_bytes(bytes, layout.coord_type).map_err(|e| {
                FragmentError::CorruptMetadata(format!("invalid range buffer: {}", e))
            })?;
            Some(range)
        }
        other => {
            return Err(FragmentError::CorruptMetadata(format!(
                "invalid range presence flag: {:#04x}",
                other
            )));
        }
    };

    // Per attribute: offset count (8 bytes) + offsets (8 bytes each)
    let mut tile_offsets = Vec::with_capacity(layout.attribute_count);
    let mut buf8 = [0u8; 8];
    for attribute in 0..layout.attribute_count {
        read_exact(reader, &mut buf8, "tile offset count")?;
        let count = u64::from_le_bytes(buf8);

        let mut offsets = Vec::with_capacity(count.min(MAX_PREALLOC_OFFSETS) as usize);
        for tile in 0..count {
            read_exact(reader, &mut buf8, "tile offset")
                .map_err(|e| truncated_offsets(attribute, tile, count, e))?;
            offsets.push(u64::from_le_bytes(buf8));
        }
        tile_offsets.push(offsets);
    }

    // The attribute count is implied by the layout; anything left over means
    // the stream was written for a different layout.
    let mut trailing = [0u8; 1];
    match reader.read(&mut trailing) {
        Ok(0) => {}
        Ok(_) => {
            return Err(FragmentError::CorruptMetadata(
                "trailing bytes after last attribute".to_string(),
            ));
        }
        Err(e) => return Err(decode_error(e, "end of stream")),
    }

    Ok(FragmentMetadata::from_parts(layout, range, tile_offsets))
}

/// `read_exact` with truncation reported as `CorruptMetadata`.
fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader
        .read_exact(buf)
        .map_err(|e| decode_error(e, what))
}

fn decode_error(e: std::io::Error, what: &str) -> FragmentError {
    // Gzip framing errors surface as InvalidInput/InvalidData from flate2;
    // those and short reads are corruption, everything else is real I/O.
    match e.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::InvalidInput | ErrorKind::InvalidData => {
            FragmentError::CorruptMetadata(format!("truncated or malformed {}: {}", what, e))
        }
        _ => FragmentError::Io(e),
    }
}

fn truncated_offsets(attribute: usize, read: u64, declared: u64, e: FragmentError) -> FragmentError {
    match e {
        FragmentError::CorruptMetadata(_) => FragmentError::CorruptMetadata(format!(
            "attribute {}: declared {} tile offsets, stream ended after {}",
            attribute, declared, read
        )),
        other => other,
    }
}
