//! Array layout facts and the typed domain-range buffer.
//!
//! The full array schema lives outside this crate. The metadata layer only
//! consumes two facts from it: how many attributes the array has, and how
//! wide a coordinate element is. [`ArrayLayout`] carries exactly those facts.
//!
//! The domain range a fragment covers is stored as an owned byte buffer
//! tagged with its coordinate type ([`RangeBuffer`]), accessed only through
//! bounds-checked element views.

use crate::error::{FragmentError, Result};

/// Coordinate element type of the owning array's dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CoordType {
    /// 32-bit signed integer coordinates.
    Int32 = 0,
    /// 64-bit signed integer coordinates (default).
    #[default]
    Int64 = 1,
    /// 32-bit floating point coordinates.
    Float32 = 2,
    /// 64-bit floating point coordinates.
    Float64 = 3,
}

impl CoordType {
    /// Creates a CoordType from a u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Int32),
            1 => Some(Self::Int64),
            2 => Some(Self::Float32),
            3 => Some(Self::Float64),
            _ => None,
        }
    }

    /// Returns the width of one coordinate element in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }
}

/// The schema facts the metadata layer needs about the owning array.
///
/// Supplied by the (out-of-scope) schema provider at fragment creation and
/// again when a persisted fragment is opened, so deserialization can size
/// and validate the recovered structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayLayout {
    /// Number of attributes stored per cell.
    pub attribute_count: usize,
    /// Number of dimensions in the array domain.
    pub dimension_count: usize,
    /// Coordinate element type shared by all dimensions.
    pub coord_type: CoordType,
}

impl ArrayLayout {
    /// Creates a new layout descriptor.
    pub fn new(attribute_count: usize, dimension_count: usize, coord_type: CoordType) -> Self {
        Self {
            attribute_count,
            dimension_count,
            coord_type,
        }
    }

    /// Returns the byte length of a domain range for this layout.
    ///
    /// A range holds a low and a high bound per dimension.
    pub fn range_len(&self) -> usize {
        2 * self.dimension_count * self.coord_type.width()
    }
}

/// An owned domain-range buffer tagged with its coordinate type.
///
/// Elements are stored little-endian and read back through bounds-checked
/// views; the buffer is never exposed as raw untyped memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBuffer {
    bytes: Vec<u8>,
    coord_type: CoordType,
}

impl RangeBuffer {
    /// Creates a range buffer from raw little-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::InvalidRangeLength` if `bytes` is not a
    /// multiple of the coordinate width.
    pub fn from_bytes(bytes: Vec<u8>, coord_type: CoordType) -> Result<Self> {
        if bytes.len() % coord_type.width() != 0 {
            return Err(FragmentError::InvalidRangeLength {
                len: bytes.len(),
                width: coord_type.width(),
            });
        }
        Ok(Self { bytes, coord_type })
    }

    /// Creates an `Int64` range buffer from coordinate bounds.
    pub fn from_i64s(bounds: &[i64]) -> Self {
        let mut bytes = Vec::with_capacity(bounds.len() * 8);
        for bound in bounds {
            bytes.extend_from_slice(&bound.to_le_bytes());
        }
        Self {
            bytes,
            coord_type: CoordType::Int64,
        }
    }

    /// Creates an `Int32` range buffer from coordinate bounds.
    pub fn from_i32s(bounds: &[i32]) -> Self {
        let mut bytes = Vec::with_capacity(bounds.len() * 4);
        for bound in bounds {
            bytes.extend_from_slice(&bound.to_le_bytes());
        }
        Self {
            bytes,
            coord_type: CoordType::Int32,
        }
    }

    /// Creates a `Float64` range buffer from coordinate bounds.
    pub fn from_f64s(bounds: &[f64]) -> Self {
        let mut bytes = Vec::with_capacity(bounds.len() * 8);
        for bound in bounds {
            bytes.extend_from_slice(&bound.to_le_bytes());
        }
        Self {
            bytes,
            coord_type: CoordType::Float64,
        }
    }

    /// Returns the raw little-endian bytes of the range.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the coordinate type the buffer is tagged with.
    pub fn coord_type(&self) -> CoordType {
        self.coord_type
    }

    /// Returns the number of coordinate elements in the buffer.
    pub fn element_count(&self) -> usize {
        self.bytes.len() / self.coord_type.width()
    }

    /// Returns the bytes of element `index`, or `None` if out of bounds.
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        let width = self.coord_type.width();
        let start = index.checked_mul(width)?;
        let end = start.checked_add(width)?;
        self.bytes.get(start..end)
    }

    /// Decodes element `index` as an `i64`, or `None` if out of bounds or
    /// the buffer holds a different coordinate type.
    pub fn element_as_i64(&self, index: usize) -> Option<i64> {
        if self.coord_type != CoordType::Int64 {
            return None;
        }
        let bytes: [u8; 8] = self.element(index)?.try_into().ok()?;
        Some(i64::from_le_bytes(bytes))
    }

    /// Decodes element `index` as an `i32`, or `None` if out of bounds or
    /// the buffer holds a different coordinate type.
    pub fn element_as_i32(&self, index: usize) -> Option<i32> {
        if self.coord_type != CoordType::Int32 {
            return None;
        }
        let bytes: [u8; 4] = self.element(index)?.try_into().ok()?;
        Some(i32::from_le_bytes(bytes))
    }

    /// Decodes element `index` as an `f64`, or `None` if out of bounds or
    /// the buffer holds a different coordinate type.
    pub fn element_as_f64(&self, index: usize) -> Option<f64> {
        if self.coord_type != CoordType::Float64 {
            return None;
        }
        let bytes: [u8; 8] = self.element(index)?.try_into().ok()?;
        Some(f64::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_type_from_u8() {
        assert_eq!(CoordType::from_u8(0), Some(CoordType::Int32));
        assert_eq!(CoordType::from_u8(1), Some(CoordType::Int64));
        assert_eq!(CoordType::from_u8(2), Some(CoordType::Float32));
        assert_eq!(CoordType::from_u8(3), Some(CoordType::Float64));
        assert_eq!(CoordType::from_u8(4), None);
    }

    #[test]
    fn test_coord_type_width() {
        assert_eq!(CoordType::Int32.width(), 4);
        assert_eq!(CoordType::Int64.width(), 8);
        assert_eq!(CoordType::Float32.width(), 4);
        assert_eq!(CoordType::Float64.width(), 8);
    }

    #[test]
    fn test_layout_range_len() {
        let layout = ArrayLayout::new(2, 1, CoordType::Int64);
        assert_eq!(layout.range_len(), 16);

        let layout = ArrayLayout::new(4, 3, CoordType::Int32);
        assert_eq!(layout.range_len(), 24);
    }

    #[test]
    fn test_range_buffer_elements() {
        let range = RangeBuffer::from_i64s(&[0, 100]);
        assert_eq!(range.element_count(), 2);
        assert_eq!(range.element_as_i64(0), Some(0));
        assert_eq!(range.element_as_i64(1), Some(100));
        assert_eq!(range.element_as_i64(2), None);
        assert_eq!(range.as_bytes().len(), 16);
    }

    #[test]
    fn test_range_buffer_typed_mismatch() {
        let range = RangeBuffer::from_i64s(&[0, 100]);
        assert_eq!(range.element_as_i32(0), None);
        assert_eq!(range.element_as_f64(0), None);
    }

    #[test]
    fn test_range_buffer_invalid_length() {
        let result = RangeBuffer::from_bytes(vec![0u8; 7], CoordType::Int64);
        assert!(matches!(
            result,
            Err(FragmentError::InvalidRangeLength { len: 7, width: 8 })
        ));
    }

    #[test]
    fn test_range_buffer_from_bytes_roundtrip() {
        let original = RangeBuffer::from_i32s(&[-5, 5, 10, 20]);
        let rebuilt =
            RangeBuffer::from_bytes(original.as_bytes().to_vec(), CoordType::Int32).unwrap();
        assert_eq!(original, rebuilt);
        assert_eq!(rebuilt.element_as_i32(0), Some(-5));
        assert_eq!(rebuilt.element_as_i32(3), Some(20));
    }
}
