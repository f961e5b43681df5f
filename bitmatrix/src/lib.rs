//! Compressed bit matrices with named rows and columns.
//!
//! Every cell of a [`CompressedBitMatrix`] holds a fixed-width bitset packed
//! into `u64` words, so a `rows x cols` matrix tracking `bits` flags per cell
//! costs `rows * cols * ceil(bits / 64)` words instead of one byte per flag.

pub mod error;
pub mod format;
pub mod mask;
pub mod matrix;

pub use error::{BitMatrixError, Result};
pub use matrix::CompressedBitMatrix;

/// Number of bits stored in one word of a cell.
pub const BITS_PER_WORD: usize = 64;
