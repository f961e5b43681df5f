use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{BitMatrixError, Result};
use crate::mask;

/// A dense `rows x cols` matrix whose cells are packed bitsets of `bits` flags.
///
/// Rows and columns carry external names (for example gene ids) looked up
/// through hash maps, so callers never deal with matrix-local indices unless
/// they ask for them. Storage is allocated up front for the declared
/// capacity; names are attached afterwards in insertion order.
#[derive(Debug, Clone)]
pub struct CompressedBitMatrix<R, C> {
    n_rows: usize,
    n_cols: usize,
    bits: usize,
    words: usize,
    data: Vec<u64>,
    row_names: Vec<R>,
    col_names: Vec<C>,
    row_index: HashMap<R, usize>,
    col_index: HashMap<C, usize>,
}

impl<R, C> CompressedBitMatrix<R, C>
where
    R: Clone + Eq + Hash + Debug,
    C: Clone + Eq + Hash + Debug,
{
    pub fn new(rows: usize, cols: usize, bits: usize) -> Self {
        let words = mask::words_for(bits);
        Self {
            n_rows: rows,
            n_cols: cols,
            bits,
            words,
            data: vec![0u64; rows * cols * words],
            row_names: Vec::with_capacity(rows),
            col_names: Vec::with_capacity(cols),
            row_index: HashMap::with_capacity(rows),
            col_index: HashMap::with_capacity(cols),
        }
    }

    pub fn rows(&self) -> usize {
        self.n_rows
    }

    pub fn columns(&self) -> usize {
        self.n_cols
    }

    /// Number of flags per cell.
    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn words_per_cell(&self) -> usize {
        self.words
    }

    pub fn add_row_name(&mut self, name: R) -> Result<usize> {
        if self.row_names.len() >= self.n_rows {
            return Err(BitMatrixError::CapacityExceeded {
                what: "row",
                capacity: self.n_rows,
            });
        }
        if self.row_index.contains_key(&name) {
            return Err(BitMatrixError::DuplicateName {
                what: "row",
                name: format!("{name:?}"),
            });
        }
        let idx = self.row_names.len();
        self.row_index.insert(name.clone(), idx);
        self.row_names.push(name);
        Ok(idx)
    }

    pub fn add_column_name(&mut self, name: C) -> Result<usize> {
        if self.col_names.len() >= self.n_cols {
            return Err(BitMatrixError::CapacityExceeded {
                what: "column",
                capacity: self.n_cols,
            });
        }
        if self.col_index.contains_key(&name) {
            return Err(BitMatrixError::DuplicateName {
                what: "column",
                name: format!("{name:?}"),
            });
        }
        let idx = self.col_names.len();
        self.col_index.insert(name.clone(), idx);
        self.col_names.push(name);
        Ok(idx)
    }

    pub fn row_index(&self, name: &R) -> Option<usize> {
        self.row_index.get(name).copied()
    }

    pub fn column_index(&self, name: &C) -> Option<usize> {
        self.col_index.get(name).copied()
    }

    pub fn row_name(&self, i: usize) -> Option<&R> {
        self.row_names.get(i)
    }

    pub fn column_name(&self, j: usize) -> Option<&C> {
        self.col_names.get(j)
    }

    pub fn row_names(&self) -> &[R] {
        &self.row_names
    }

    pub fn column_names(&self) -> &[C] {
        &self.col_names
    }

    /// Sets flag `bit` of cell `(row, col)`. Setting an already-set flag is a no-op.
    ///
    /// Returns `true` when the flag was newly set.
    pub fn set(&mut self, row: usize, col: usize, bit: usize) -> Result<bool> {
        self.check_bit_index(bit)?;
        let offset = self.offset(row, col)?;
        Ok(mask::set_bit(&mut self.data[offset..offset + self.words], bit))
    }

    pub fn get(&self, row: usize, col: usize, bit: usize) -> Result<bool> {
        self.check_bit_index(bit)?;
        Ok(mask::check_bit(self.cell(row, col)?, bit))
    }

    /// The packed words of cell `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Result<&[u64]> {
        let offset = self.offset(row, col)?;
        Ok(&self.data[offset..offset + self.words])
    }

    /// Overwrites cell `(row, col)` with `words`, which must be exactly one cell wide
/// and carry no flag at or beyond `bits`.
    pub fn set_cell(&mut self, row: usize, col: usize, words: &[u64]) -> Result<()> {
        if words.len() != self.words {
            return Err(BitMatrixError::ShapeMismatch(format!(
                "cell has {} words, got {}",
                self.words,
                words.len()
            )));
        }
        if let Some(bit) = mask::set_indices(words).into_iter().find(|b| *b >= self.bits) {
            return Err(BitMatrixError::IndexOutOfRange {
                what: "bit",
                index: bit,
                len: self.bits,
            });
        }
        let offset = self.offset(row, col)?;
        self.data[offset..offset + self.words].copy_from_slice(words);
        Ok(())
    }

    /// Number of flags set in cell `(row, col)`.
    pub fn bit_count(&self, row: usize, col: usize) -> Result<u32> {
        Ok(mask::count_bits(self.cell(row, col)?))
    }

    /// Flag counts for every cell of `row`.
    pub fn row_bit_counts(&self, row: usize) -> Result<Vec<u32>> {
        if self.words == 0 {
            if row >= self.n_rows {
                return Err(BitMatrixError::IndexOutOfRange {
                    what: "row",
                    index: row,
                    len: self.n_rows,
                });
            }
            return Ok(vec![0; self.n_cols]);
        }
        let start = self.offset(row, 0)?;
        let end = start + self.n_cols * self.words;
        Ok(self.data[start..end]
            .chunks_exact(self.words)
            .map(mask::count_bits)
            .collect())
    }

    /// Bitwise-ORs every cell of `other` into `self`.
    ///
    /// Both matrices must have the same shape and the same names in the same
    /// order.
    pub fn merge_or(&mut self, other: &Self) -> Result<()> {
        if self.n_rows != other.n_rows || self.n_cols != other.n_cols || self.bits != other.bits
        {
            return Err(BitMatrixError::ShapeMismatch(format!(
                "{}x{}x{} vs {}x{}x{}",
                self.n_rows, self.n_cols, self.bits, other.n_rows, other.n_cols, other.bits
            )));
        }
        if self.row_names != other.row_names || self.col_names != other.col_names {
            return Err(BitMatrixError::ShapeMismatch(
                "row or column names differ".to_string(),
            ));
        }
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            *dst |= src;
        }
        Ok(())
    }

    /// Iterates over `(row, col, words)` for every cell with at least one flag set.
    pub fn non_empty_cells(&self) -> impl Iterator<Item = (usize, usize, &[u64])> + '_ {
        let words = self.words.max(1);
        let n_cols = self.n_cols.max(1);
        self.data
            .chunks_exact(words)
            .enumerate()
            .filter(|(_, cell)| cell.iter().any(|w| *w != 0))
            .map(move |(idx, cell)| (idx / n_cols, idx % n_cols, cell))
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.n_rows {
            return Err(BitMatrixError::IndexOutOfRange {
                what: "row",
                index: row,
                len: self.n_rows,
            });
        }
        if col >= self.n_cols {
            return Err(BitMatrixError::IndexOutOfRange {
                what: "column",
                index: col,
                len: self.n_cols,
            });
        }
        Ok((row * self.n_cols + col) * self.words)
    }

    fn check_bit_index(&self, bit: usize) -> Result<()> {
        if bit >= self.bits {
            return Err(BitMatrixError::IndexOutOfRange {
                what: "bit",
                index: bit,
                len: self.bits,
            });
        }
        Ok(())
    }
}
