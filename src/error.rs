//! Error types for building, querying, and (de)serializing sequences.

use thiserror::Error;

/// Error variants for partitioned Elias-Fano operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input values to a build were not non-decreasing.
    #[error("input must be non-decreasing (violated at index {index})")]
    NotMonotone {
        /// Index of the first value smaller than its predecessor.
        index: usize,
    },

    /// A block was constructed from zero values.
    #[error("cannot encode an empty block")]
    EmptyBlock,

    /// An element index was past the end of the sequence.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// A block index was past the end of the block directory.
    #[error("block index out of bounds: {0}")]
    BlockOutOfBounds(usize),

    /// A selection query was performed for a rank that does not exist.
    #[error("invalid selection: rank {0} not found")]
    InvalidSelection(usize),

    /// Serialized input failed validation.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// An I/O error occurred during save or load.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for partitioned Elias-Fano operations.
pub type Result<T> = std::result::Result<T, Error>;
