//! Tessera Fragment - Array Fragment Metadata Engine
//!
//! This crate provides the metadata layer of the Tessera multidimensional
//! array storage engine: the per-fragment index that records where tiles
//! live on disk, and the identifier generator that names fragments in a way
//! that preserves write order.
//!
//! # Components
//!
//! - [`UuidGenerator`]: Process-wide unique, time-ordered fragment names
//! - [`FragmentMetadata`]: Domain range and per-attribute tile offsets
//! - [`RangeBuffer`]: Typed, bounds-checked view over the domain range
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_fragment::{ArrayLayout, CoordType, FragmentMetadata, RangeBuffer};
//!
//! // One-dimensional array with two attributes, i64 coordinates.
//! let layout = ArrayLayout::new(2, 1, CoordType::Int64);
//!
//! // Write path: record tile offsets as tiles are flushed.
//! let mut meta = FragmentMetadata::new(&layout);
//! meta.init(RangeBuffer::from_i64s(&[0, 100]))?;
//! meta.append_tile_offset(0, 0)?;
//! meta.append_tile_offset(0, 4096)?;
//! meta.finalize();
//! meta.flush(&path)?;
//!
//! // Read path: reconstruct an identical, immutable index.
//! let loaded = FragmentMetadata::load(&path, &layout)?;
//! assert_eq!(loaded.tile_offsets(0)?, &[0, 4096]);
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod layout;
pub mod meta;
pub mod uuid;

pub use error::{FragmentError, Result};
pub use layout::{ArrayLayout, CoordType, RangeBuffer};
pub use meta::FragmentMetadata;
pub use uuid::{Clock, FragmentUuid, SystemClock, UuidGenerator};
