//! Node labels: the `node_id label` file and the multi-label indicator matrix.

use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Row-wise sparse binary matrix: each row lists its positive columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseLabels {
    rows: Vec<Vec<usize>>,
    n_cols: usize,
}

impl SparseLabels {
    /// Build from per-row column lists. Columns are sorted and deduplicated.
    pub fn new(rows: Vec<Vec<usize>>, n_cols: usize) -> Result<Self> {
        let mut rows = rows;
        for row in &mut rows {
            row.sort_unstable();
            row.dedup();
            if let Some(&col) = row.last() {
                if col >= n_cols {
                    return Err(Error::DimensionMismatch {
                        expected: n_cols,
                        got: col + 1,
                    });
                }
            }
        }
        Ok(Self { rows, n_cols })
    }

    pub fn row(&self, i: usize) -> &[usize] {
        &self.rows[i]
    }
}

/// Binary label-indicator matrix (`rows = nodes`, `cols = classes`).
///
/// Datasets ship either dense or sparse indicators; both answer the same
/// questions, in particular how many labels each row carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelMatrix {
    Dense(Array2<u8>),
    Sparse(SparseLabels),
}

impl LabelMatrix {
    /// One-hot encode a single-label class vector.
    ///
    /// Columns are the distinct classes in ascending order, so a class vector
    /// using `{2, 5}` yields two columns.
    pub fn from_classes(classes: &[usize]) -> Self {
        let distinct: Vec<usize> = classes.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let column: HashMap<usize, usize> = distinct.iter().enumerate().map(|(i, &c)| (c, i)).collect();

        let mut m = Array2::<u8>::zeros((classes.len(), distinct.len()));
        for (row, class) in classes.iter().enumerate() {
            m[[row, column[class]]] = 1;
        }
        Self::Dense(m)
    }

    pub fn n_rows(&self) -> usize {
        match self {
            Self::Dense(m) => m.nrows(),
            Self::Sparse(s) => s.rows.len(),
        }
    }

    pub fn n_cols(&self) -> usize {
        match self {
            Self::Dense(m) => m.ncols(),
            Self::Sparse(s) => s.n_cols,
        }
    }

    /// Positive columns of row `i`, ascending.
    pub fn row_positives(&self, i: usize) -> Vec<usize> {
        match self {
            Self::Dense(m) => m
                .row(i)
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0)
                .map(|(j, _)| j)
                .collect(),
            Self::Sparse(s) => s.rows[i].clone(),
        }
    }

    /// Number of non-zero entries in row `i`.
    pub fn row_nonzeros(&self, i: usize) -> usize {
        match self {
            Self::Dense(m) => m.row(i).iter().filter(|&&v| v != 0).count(),
            Self::Sparse(s) => s.rows[i].len(),
        }
    }

    /// Label count per row, used as `k` by top-k ranking.
    pub fn nonzero_per_row(&self) -> Vec<usize> {
        (0..self.n_rows()).map(|i| self.row_nonzeros(i)).collect()
    }

    pub fn to_dense(&self) -> Array2<u8> {
        match self {
            Self::Dense(m) => m.clone(),
            Self::Sparse(s) => {
                let mut m = Array2::<u8>::zeros((s.rows.len(), s.n_cols));
                for (i, row) in s.rows.iter().enumerate() {
                    for &j in row {
                        m[[i, j]] = 1;
                    }
                }
                m
            }
        }
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        match self {
            Self::Dense(m) => Self::Dense(m.select(ndarray::Axis(0), rows)),
            Self::Sparse(s) => Self::Sparse(SparseLabels {
                rows: rows.iter().map(|&i| s.rows[i].clone()).collect(),
                n_cols: s.n_cols,
            }),
        }
    }
}

/// Read a `node_id label` file into a map. A repeated id keeps its last label.
pub fn read_label_file(path: impl AsRef<Path>) -> Result<HashMap<String, i64>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut labels = HashMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(id) = parts.next() else { continue };
        let raw = parts
            .next()
            .ok_or_else(|| Error::parse(path, lineno + 1, "missing label"))?;
        let label: i64 = raw
            .parse()
            .map_err(|_| Error::parse(path, lineno + 1, format!("label `{raw}` is not an integer")))?;
        labels.insert(id.to_string(), label);
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_classes_binarizes() {
        let m = LabelMatrix::from_classes(&[2, 0, 2, 6]);
        assert_eq!(m.n_rows(), 4);
        assert_eq!(m.n_cols(), 3);
        assert_eq!(m.row_positives(0), vec![1]);
        assert_eq!(m.row_positives(3), vec![2]);
        assert_eq!(m.nonzero_per_row(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_dense_and_sparse_agree() {
        let sparse = SparseLabels::new(vec![vec![0, 3], vec![], vec![2, 1, 2]], 4).unwrap();
        let sparse = LabelMatrix::Sparse(sparse);
        let dense = LabelMatrix::Dense(sparse.to_dense());

        assert_eq!(sparse.nonzero_per_row(), vec![2, 0, 2]);
        assert_eq!(dense.nonzero_per_row(), vec![2, 0, 2]);
        assert_eq!(dense.row_positives(2), vec![1, 2]);
    }

    #[test]
    fn test_sparse_column_bound() {
        assert!(SparseLabels::new(vec![vec![4]], 4).is_err());
    }

    #[test]
    fn test_select_rows() {
        let m = LabelMatrix::from_classes(&[0, 1, 2]);
        let picked = m.select_rows(&[2, 0]);
        assert_eq!(picked.row_positives(0), vec![2]);
        assert_eq!(picked.row_positives(1), vec![0]);
    }

    #[test]
    fn test_read_label_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cora.labels");
        std::fs::write(&path, "0 3\n1 0\n\n2 6\n").unwrap();

        let labels = read_label_file(&path).unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["2"], 6);

        std::fs::write(&path, "0 x\n").unwrap();
        assert!(matches!(read_label_file(&path), Err(Error::Parse { line: 1, .. })));
    }
}
