//! # Partitioned Elias-Fano Sequences
//!
//! *Near-optimal space for sorted integers, with random access intact.*
//!
//! ## Intuition First
//!
//! A sorted list of identifiers is mostly redundant: once you know a value,
//! the next one is usually nearby. Elias-Fano coding exploits this by
//! splitting every value into a handful of explicit low bits and a high
//! part encoded as unary gaps. The result sits within a couple of bits per
//! element of the information-theoretic minimum, and unlike a
//! general-purpose compressor you can still jump straight to the i-th
//! element without decompressing anything before it.
//!
//! Partitioning takes the idea one step further. A single global split
//! wastes bits when the data is locally clustered, so the sequence is cut
//! into fixed-size blocks, each encoded against its own local universe,
//! with a sparse directory (last value and byte offset per block) on top.
//! The directory is what makes the container practical: point lookups
//! touch one block, membership tests binary-search the directory, and set
//! operations stream blocks without ever holding more than one
//! decompressed per input.
//!
//! ## Historical Context
//!
//! ```text
//! 1971  Fano        Partitioned bit storage for associative memories
//! 1974  Elias       Static files of monotone sequences: the high/low split
//! 2014  Ottaviano-  Partitioned Elias-Fano indexes for inverted lists:
//!       Venturini   per-block universes beat one global split
//! ```
//!
//! ## Mathematical Formulation
//!
//! For $n$ sorted values spanning a range of size $r$, a block stores each
//! value minus the block floor: $\ell = \lfloor \log_2(r/n) \rfloor$ low
//! bits per element plus a unary stream of $n + \lceil r/2^\ell \rceil$
//! bits for the high parts. The j-th element's high part $h_j$ becomes a
//! set bit at position $h_j + j$, so decoding is a linear scan for set
//! bits and random access within a block is a select query.
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - [`BitWriter`] / [`BitReader`]: dense LSB-first packing of
//!   variable-width integers into 64-bit words.
//! - [`EFBlock`]: the per-partition codec (encode, decode, rank access,
//!   membership).
//! - [`Sequence`]: the partitioned container with its block directory,
//!   byte/file serialization, and streaming intersection and union.
//!
//! All scalars on the wire are little-endian; the two 40-byte headers are
//! byte-exact contracts (see the format table in [`sequence`]).
//!
//! ## References
//!
//! - Elias, P. (1974). "Efficient storage and retrieval by content and
//!   address of static files."
//! - Fano, R. (1971). "On the number of bits required to implement an
//!   associative memory."
//! - Ottaviano, G., & Venturini, R. (2014). "Partitioned Elias-Fano
//!   indexes."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bits;
pub mod bitstream;
pub mod block;
pub mod error;
pub mod sequence;
mod set_ops;

pub use bitstream::{BitReader, BitWriter};
pub use block::{EFBlock, EFBlockMetadata};
pub use error::{Error, Result};
pub use sequence::{Sequence, SequenceMetadata, DEFAULT_BLOCK_SIZE};
