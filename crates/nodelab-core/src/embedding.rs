//! Embedding files as written by DeepWalk / node2vec style tools.
//!
//! The first line is `node_count dim`; every other line is `node_id v1 .. vd`.

use crate::{Error, Result};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One embedding row, kept as the original text tokens.
///
/// The splitter copies values into its output verbatim, so the tokens are
/// validated as numbers but never re-formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub values: Vec<String>,
}

fn parse_header(line: &str, path: &Path) -> Result<(usize, usize)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [count, dim] = parts.as_slice() else {
        return Err(Error::parse(path, 1, "header must be `node_count dim`"));
    };
    let count = count
        .parse()
        .map_err(|_| Error::parse(path, 1, format!("bad node count `{count}`")))?;
    let dim = dim
        .parse()
        .map_err(|_| Error::parse(path, 1, format!("bad dimension `{dim}`")))?;
    Ok((count, dim))
}

/// Load an embedding file into a dense `(node_count, dim)` matrix indexed by node ID.
///
/// Rows absent from the file stay zero.
pub fn load_embeddings(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let mut lines = BufReader::new(File::open(path)?).lines();

    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| Error::parse(path, 1, "empty embedding file"))?;
    let (count, dim) = parse_header(&header, path)?;

    let mut emb = Array2::<f32>::zeros((count, dim));
    for (offset, line) in lines.enumerate() {
        let line = line?;
        let lineno = offset + 2;
        let mut parts = line.split_whitespace();
        let Some(raw_id) = parts.next() else { continue };
        let id: usize = raw_id
            .parse()
            .map_err(|_| Error::parse(path, lineno, format!("node id `{raw_id}` is not an integer")))?;
        if id >= count {
            return Err(Error::NodeOutOfRange { id, count });
        }

        let values = parts
            .map(|v| {
                v.parse::<f32>()
                    .map_err(|_| Error::parse(path, lineno, format!("bad value `{v}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        if values.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: values.len(),
            });
        }
        for (j, v) in values.into_iter().enumerate() {
            emb[[id, j]] = v;
        }
    }
    Ok(emb)
}

/// Read embedding rows in file order, skipping the header.
///
/// IDs are left as strings: some tools append non-node summary rows whose
/// IDs are not integers.
pub fn read_embedding_records(path: impl AsRef<Path>) -> Result<Vec<EmbeddingRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(id) = parts.next() else { continue };
        let values: Vec<String> = parts.map(str::to_string).collect();
        if let Some(bad) = values.iter().find(|v| v.parse::<f64>().is_err()) {
            return Err(Error::parse(path, lineno + 1, format!("bad value `{bad}`")));
        }
        records.push(EmbeddingRecord {
            id: id.to_string(),
            values,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.emb");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_dense_matrix() {
        let (_dir, path) = write("3 2\n2 0.5 -1\n0 1.0 2.0\n");
        let emb = load_embeddings(&path).unwrap();

        assert_eq!(emb.dim(), (3, 2));
        assert_eq!(emb[[0, 1]], 2.0);
        assert_eq!(emb[[2, 0]], 0.5);
        // row 1 is absent
        assert_eq!(emb[[1, 0]], 0.0);
    }

    #[test]
    fn test_out_of_range_row() {
        let (_dir, path) = write("2 1\n2 0.1\n");
        assert!(matches!(
            load_embeddings(&path),
            Err(Error::NodeOutOfRange { id: 2, count: 2 })
        ));
    }

    #[test]
    fn test_wrong_dimension() {
        let (_dir, path) = write("2 3\n0 0.1 0.2\n");
        assert!(matches!(
            load_embeddings(&path),
            Err(Error::DimensionMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_records_keep_text() {
        let (_dir, path) = write("2 2\n7 0.100 1e-3\nmotif_1 3 4\n");
        let records = read_embedding_records(&path).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].values, vec!["0.100", "1e-3"]);
        assert_eq!(records[1].id, "motif_1");
    }
}
