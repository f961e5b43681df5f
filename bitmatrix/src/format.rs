//! Plain-text serialization of [`CompressedBitMatrix`].
//!
//! Layout, tab-separated:
//!
//! ```text
//! rows  cols  bits
//! row names...
//! column names...
//! row  col  hexword...     (one line per non-empty cell)
//! ```
//!
//! The two name lines are always present, even when empty.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::io::{BufRead, Write};
use std::str::FromStr;

use tracing::debug;

use crate::error::{BitMatrixError, Result};
use crate::matrix::CompressedBitMatrix;

pub fn write_to<W, R, C>(matrix: &CompressedBitMatrix<R, C>, mut out: W) -> Result<()>
where
    W: Write,
    R: Clone + Eq + Hash + Debug + Display,
    C: Clone + Eq + Hash + Debug + Display,
{
    writeln!(
        out,
        "{}\t{}\t{}",
        matrix.rows(),
        matrix.columns(),
        matrix.bits()
    )?;
    writeln!(out, "{}", join_names(matrix.row_names()))?;
    writeln!(out, "{}", join_names(matrix.column_names()))?;
    let mut cells = 0usize;
    for (row, col, words) in matrix.non_empty_cells() {
        write!(out, "{row}\t{col}")?;
        for w in words {
            write!(out, "\t{w:x}")?;
        }
        writeln!(out)?;
        cells += 1;
    }
    debug!("wrote {cells} non-empty cells");
    Ok(())
}

pub fn read_from<B, R, C>(input: B) -> Result<CompressedBitMatrix<R, C>>
where
    B: BufRead,
    R: Clone + Eq + Hash + Debug + FromStr,
    C: Clone + Eq + Hash + Debug + FromStr,
{
    let mut lines = input.lines();

    let header = next_line(&mut lines, "header")?;
    let dims: Vec<usize> = header
        .split('\t')
        .map(|s| s.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| BitMatrixError::Format(format!("bad header '{header}': {e}")))?;
    if dims.len() != 3 {
        return Err(BitMatrixError::Format(format!(
            "header must hold rows, cols and bits: '{header}'"
        )));
    }
    let mut matrix = CompressedBitMatrix::<R, C>::new(dims[0], dims[1], dims[2]);

    let row_line = next_line(&mut lines, "row names")?;
    for name in split_names(&row_line) {
        let parsed = name
            .parse::<R>()
            .map_err(|_| BitMatrixError::Format(format!("bad row name '{name}'")))?;
        matrix.add_row_name(parsed)?;
    }
    let col_line = next_line(&mut lines, "column names")?;
    for name in split_names(&col_line) {
        let parsed = name
            .parse::<C>()
            .map_err(|_| BitMatrixError::Format(format!("bad column name '{name}'")))?;
        matrix.add_column_name(parsed)?;
    }

    if matrix.row_names().len() != matrix.rows() || matrix.column_names().len() != matrix.columns()
    {
        return Err(BitMatrixError::Format(format!(
            "header declares {} rows and {} columns, found {} row and {} column names",
            matrix.rows(),
            matrix.columns(),
            matrix.row_names().len(),
            matrix.column_names().len()
        )));
    }

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() != 2 + matrix.words_per_cell() {
            return Err(BitMatrixError::Format(format!(
                "expected {} fields, got {}: '{line}'",
                2 + matrix.words_per_cell(),
                fields.len()
            )));
        }
        let row = parse_index(fields[0], &line)?;
        let col = parse_index(fields[1], &line)?;
        let words = fields[2..]
            .iter()
            .map(|f| u64::from_str_radix(f, 16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BitMatrixError::Format(format!("bad cell word in '{line}': {e}")))?;
        matrix.set_cell(row, col, &words)?;
    }
    Ok(matrix)
}

fn next_line<I>(lines: &mut I, what: &str) -> Result<String>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(BitMatrixError::Format(format!("missing {what} line"))),
    }
}

fn join_names<T: Display>(names: &[T]) -> String {
    names
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join("\t")
}

fn split_names(line: &str) -> impl Iterator<Item = &str> {
    line.split('\t').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_index(field: &str, line: &str) -> Result<usize> {
    field
        .parse::<usize>()
        .map_err(|e| BitMatrixError::Format(format!("bad index '{field}' in '{line}': {e}")))
}
