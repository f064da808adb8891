//! Sparse vectors: the `label idx:val idx:val ...` text format and a CSR matrix.

use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// One parsed `label idx:val ...` line.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRecord {
    pub label: f64,
    pub features: Vec<(usize, f64)>,
}

impl SparseRecord {
    /// Parse a single line. `None` for blank lines.
    pub fn parse_line(line: &str) -> std::result::Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(raw_label) = parts.next() else {
            return Ok(None);
        };
        let label: f64 = raw_label
            .parse()
            .map_err(|_| format!("label `{raw_label}` is not a number"))?;

        let mut features = Vec::new();
        for pair in parts {
            let (idx, val) = pair
                .split_once(':')
                .ok_or_else(|| format!("expected idx:val, got `{pair}`"))?;
            let idx: usize = idx.parse().map_err(|_| format!("bad feature index `{idx}`"))?;
            let val: f64 = val.parse().map_err(|_| format!("bad feature value `{val}`"))?;
            features.push((idx, val));
        }
        Ok(Some(Self { label, features }))
    }

    /// One past the highest feature index (0 for an empty vector).
    ///
    /// Saturates at `usize::MAX`.
    pub fn width(&self) -> usize {
        self.features
            .iter()
            .map(|&(i, _)| i.saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}

/// Read a whole sparse-feature file, in file order.
pub fn read_sparse_file(path: impl AsRef<Path>) -> Result<Vec<SparseRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        match SparseRecord::parse_line(&line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(message) => return Err(Error::parse(path, lineno + 1, message)),
        }
    }
    Ok(records)
}

/// Write `label 0:v0 1:v1 ...`, copying value tokens verbatim.
pub fn write_feature_line<W: Write, S: AsRef<str>>(
    out: &mut W,
    label: impl std::fmt::Display,
    values: &[S],
) -> std::io::Result<()> {
    write!(out, "{label}")?;
    for (j, v) in values.iter().enumerate() {
        write!(out, " {j}:{}", v.as_ref())?;
    }
    writeln!(out)
}

/// Densify records into a `(rows, width)` feature matrix plus their labels.
///
/// Indices at or beyond `width` are dropped; missing entries are zero.
pub fn to_dense(records: &[SparseRecord], width: usize) -> (Array2<f32>, Vec<f64>) {
    let mut x = Array2::<f32>::zeros((records.len(), width));
    let mut y = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        for &(j, v) in &r.features {
            if j < width {
                x[[i, j]] = v as f32;
            }
        }
        y.push(r.label);
    }
    (x, y)
}

/// Compressed sparse row matrix for node feature tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f32>,
}

impl CsrMatrix {
    /// Empty matrix with `n_cols` columns.
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            row_ptr: vec![0],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a row given as `(column, value)` pairs; zeros are skipped.
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (usize, f32)>) -> Result<()> {
        let mut row: Vec<(usize, f32)> = entries.into_iter().filter(|&(_, v)| v != 0.0).collect();
        row.sort_by_key(|&(c, _)| c);
        for (c, v) in row {
            if c >= self.n_cols {
                return Err(Error::DimensionMismatch {
                    expected: self.n_cols,
                    got: c + 1,
                });
            }
            self.col_idx.push(c);
            self.values.push(v);
        }
        self.row_ptr.push(self.col_idx.len());
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Non-zero `(column, value)` pairs of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let (start, end) = (self.row_ptr[i], self.row_ptr[i + 1]);
        self.col_idx[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter().copied())
    }

    pub fn to_dense(&self) -> Array2<f32> {
        let mut m = Array2::<f32>::zeros((self.n_rows(), self.n_cols));
        for i in 0..self.n_rows() {
            for (j, v) in self.row(i) {
                m[[i, j]] = v;
            }
        }
        m
    }
}
