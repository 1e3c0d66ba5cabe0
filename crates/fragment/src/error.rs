//! Error and Result types for fragment metadata operations.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for fragment metadata operations.
pub type Result<T> = std::result::Result<T, FragmentError>;

/// The error type for fragment metadata and identifier operations.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// The fragment range was already initialized.
    #[error("Fragment range already initialized")]
    AlreadyInitialized,

    /// Attribute index is outside the fragment's attribute count.
    #[error("Attribute index {index} out of range (attribute count {attribute_count})")]
    AttributeOutOfRange {
        /// The offending attribute index.
        index: usize,
        /// The fragment's fixed attribute count.
        attribute_count: usize,
    },

    /// The fragment metadata was finalized and no longer accepts appends.
    #[error("Fragment metadata is sealed, no further appends allowed")]
    Sealed,

    /// Range buffer length is not a multiple of the coordinate width.
    #[error("Range length {len} is not a multiple of coordinate width {width}")]
    InvalidRangeLength {
        /// Length of the supplied range buffer in bytes.
        len: usize,
        /// Width of one coordinate element in bytes.
        width: usize,
    },

    /// Persisted metadata bytes are malformed or truncated.
    #[error("Corrupt fragment metadata: {0}")]
    CorruptMetadata(String),

    /// Identifier counter overflowed within a single millisecond.
    #[error("Maximum identifier generation frequency exceeded")]
    GenerationExhausted,

    /// The cryptographic random source failed.
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
