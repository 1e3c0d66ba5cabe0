//! Per-fragment metadata: the domain range and tile offset index.
//!
//! A [`FragmentMetadata`] is owned by exactly one writer for its whole write
//! session and needs no internal locking:
//!
//! ```text
//! Writer → init(range) → append_tile_offset(..) × N → finalize → flush
//! Reader → load → immutable, shareable read-only
//! ```
//!
//! Once finalized and persisted, the bytes (or a freshly loaded instance)
//! are immutable and safe to share across arbitrarily many readers, each on
//! its own loaded copy.

pub mod codec;

use crate::error::{FragmentError, Result};
use crate::layout::{ArrayLayout, RangeBuffer};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// The metadata index of one fragment.
///
/// Records the domain range the fragment covers and, per attribute, the
/// byte offsets of its tiles in that attribute's data file. The attribute
/// count is fixed at construction from the owning array's layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentMetadata {
    /// The domain range the fragment is constrained to, once initialized.
    range: Option<RangeBuffer>,
    /// Tile offsets in the corresponding attribute files, one list per
    /// attribute, each append-only and non-decreasing (caller-maintained).
    tile_offsets: Vec<Vec<u64>>,
    /// Set by `finalize()`; a sealed index rejects further appends.
    sealed: bool,
}

impl FragmentMetadata {
    /// Creates empty metadata for a fragment of the given array layout.
    pub fn new(layout: &ArrayLayout) -> Self {
        Self {
            range: None,
            tile_offsets: vec![Vec::new(); layout.attribute_count],
            sealed: false,
        }
    }

    /// Rebuilds a sealed instance from deserialized parts.
    pub(crate) fn from_parts(
        layout: &ArrayLayout,
        range: Option<RangeBuffer>,
        tile_offsets: Vec<Vec<u64>>,
    ) -> Self {
        debug_assert_eq!(tile_offsets.len(), layout.attribute_count);
        Self {
            range,
            tile_offsets,
            sealed: true,
        }
    }

    /// Sets the domain range the fragment is constrained to.
    ///
    /// The caller supplies a range sized to the owning schema's coordinate
    /// width and dimension count; that contract is not re-validated here.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::AlreadyInitialized` if the range was already
    /// set, and `FragmentError::Sealed` on a finalized index.
    pub fn init(&mut self, range: RangeBuffer) -> Result<()> {
        if self.sealed {
            return Err(FragmentError::Sealed);
        }
        if self.range.is_some() {
            return Err(FragmentError::AlreadyInitialized);
        }
        self.range = Some(range);
        Ok(())
    }

    /// Appends a tile offset for the given attribute.
    ///
    /// Offsets within one attribute must be appended in non-decreasing
    /// order; violating that is undefined for downstream tile lookup but is
    /// not rejected here.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::AttributeOutOfRange` if `attribute_index`
    /// is not below the attribute count, and `FragmentError::Sealed` on a
    /// finalized index.
    pub fn append_tile_offset(&mut self, attribute_index: usize, offset: u64) -> Result<()> {
        if self.sealed {
            return Err(FragmentError::Sealed);
        }
        let attribute_count = self.tile_offsets.len();
        let offsets = self.tile_offsets.get_mut(attribute_index).ok_or(
            FragmentError::AttributeOutOfRange {
                index: attribute_index,
                attribute_count,
            },
        )?;
        offsets.push(offset);
        Ok(())
    }

    /// Seals the index against further appends. Idempotent.
    pub fn finalize(&mut self) {
        if !self.sealed {
            self.sealed = true;
            debug!(
                attribute_count = self.attribute_count(),
                total_offsets = self.total_tile_count(),
                "finalized fragment metadata"
            );
        }
    }

    /// Returns true once `finalize()` has been called (or the instance was
    /// loaded from persisted bytes).
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the domain range, or `None` if it was never initialized.
    pub fn range(&self) -> Option<&RangeBuffer> {
        self.range.as_ref()
    }

    /// Returns the fixed attribute count of this fragment.
    pub fn attribute_count(&self) -> usize {
        self.tile_offsets.len()
    }

    /// Returns the tile offsets recorded for the given attribute.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::AttributeOutOfRange` if `attribute_index`
    /// is not below the attribute count.
    pub fn tile_offsets(&self, attribute_index: usize) -> Result<&[u64]> {
        self.tile_offsets
            .get(attribute_index)
            .map(Vec::as_slice)
            .ok_or(FragmentError::AttributeOutOfRange {
                index: attribute_index,
                attribute_count: self.tile_offsets.len(),
            })
    }

    /// Returns the offset of one tile, or `None` if either index is out of
    /// bounds.
    pub fn tile_offset(&self, attribute_index: usize, tile: usize) -> Option<u64> {
        self.tile_offsets.get(attribute_index)?.get(tile).copied()
    }

    /// Returns the number of tiles recorded for the given attribute.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::AttributeOutOfRange` if `attribute_index`
    /// is not below the attribute count.
    pub fn tile_count(&self, attribute_index: usize) -> Result<usize> {
        Ok(self.tile_offsets(attribute_index)?.len())
    }

    /// Returns the most recently appended offset for the given attribute,
    /// or `None` if no tiles were recorded yet.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::AttributeOutOfRange` if `attribute_index`
    /// is not below the attribute count.
    pub fn last_tile_offset(&self, attribute_index: usize) -> Result<Option<u64>> {
        Ok(self.tile_offsets(attribute_index)?.last().copied())
    }

    /// Returns the total number of tile offsets across all attributes.
    pub fn total_tile_count(&self) -> usize {
        self.tile_offsets.iter().map(Vec::len).sum()
    }

    /// All per-attribute offset lists, in layout order. Codec use only.
    pub(crate) fn all_tile_offsets(&self) -> &[Vec<u64>] {
        &self.tile_offsets
    }

    /// Serializes this metadata into `sink` as a compressed stream.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the sink.
    pub fn serialize_into<W: Write>(&self, sink: W) -> Result<()> {
        codec::serialize_into(self, sink)
    }

    /// Deserializes metadata from the compressed stream in `source`.
    ///
    /// The recovered instance is sealed and structurally validated against
    /// `layout`; on any mismatch this fails with
    /// `FragmentError::CorruptMetadata` and no partial index is produced.
    pub fn deserialize_from<R: Read>(source: R, layout: &ArrayLayout) -> Result<Self> {
        codec::deserialize_from(source, layout)
    }

    /// Persists this metadata to a file, syncing before returning.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from file creation, writing, or syncing.
    pub fn flush(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.serialize_into(&mut writer)?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        file.sync_all()?;

        debug!(path = %path.display(), "flushed fragment metadata");
        Ok(())
    }

    /// Loads sealed metadata from a file written by [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::CorruptMetadata` if the file's contents are
    /// malformed for `layout`, and propagates other I/O errors.
    pub fn load(path: &Path, layout: &ArrayLayout) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let meta = Self::deserialize_from(reader, layout)?;

        debug!(path = %path.display(), "loaded fragment metadata");
        Ok(meta)
    }
}
