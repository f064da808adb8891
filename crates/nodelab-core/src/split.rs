//! Seeded train/validation/test partitioning of embedded nodes.
//!
//! Nodes are taken in embedding-file order, shuffled with a seeded RNG, and
//! cut by position: the first 70% train, the next 10% validation, the rest
//! test. Each partition is written in the sparse `label idx:val` format.

use crate::embedding::{read_embedding_records, EmbeddingRecord};
use crate::labels::read_label_file;
use crate::sparse::write_feature_line;
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Splitter configuration.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Shuffle seed (default: 0).
    pub seed: u64,
    /// Share of nodes in the training partition, in percent (default: 70).
    pub train_percent: usize,
    /// Share of nodes in the validation partition, in percent (default: 10).
    pub val_percent: usize,
    /// Embedding rows whose id starts with this are auxiliary, not nodes.
    pub skip_prefix: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            train_percent: 70,
            val_percent: 10,
            skip_prefix: "motif".to_string(),
        }
    }
}

impl SplitConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_percentages(mut self, train: usize, val: usize) -> Self {
        self.train_percent = train;
        self.val_percent = val;
        self
    }

    pub fn with_skip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefix = prefix.into();
        self
    }

    /// Partition boundaries `(train_end, val_end)` for `n` nodes (floored).
    pub fn boundaries(&self, n: usize) -> (usize, usize) {
        let train_end = n * self.train_percent / 100;
        let val_end = n * (self.train_percent + self.val_percent) / 100;
        (train_end, val_end.min(n))
    }
}

/// The three partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Val,
    Test,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Val, Partition::Test];

    /// File-name suffix appended to a path prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Train => "_train",
            Self::Val => "_val",
            Self::Test => "_test",
        }
    }

    /// `prefix` + suffix, e.g. `cora.feature` -> `cora.feature_train`.
    pub fn path(self, prefix: impl AsRef<Path>) -> PathBuf {
        let mut name = OsString::from(prefix.as_ref().as_os_str());
        name.push(self.suffix());
        PathBuf::from(name)
    }
}

/// One output line: a node with its label and feature tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub node: String,
    pub label: i64,
    pub values: Vec<String>,
}

/// Result of partitioning.
#[derive(Debug, Clone, Default)]
pub struct FeatureSplit {
    pub train: Vec<FeatureRow>,
    pub val: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
}

impl FeatureSplit {
    pub fn get(&self, part: Partition) -> &[FeatureRow] {
        match part {
            Partition::Train => &self.train,
            Partition::Val => &self.val,
            Partition::Test => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `<prefix>_train`, `<prefix>_val` and `<prefix>_test`.
    pub fn write(&self, prefix: impl AsRef<Path>) -> Result<()> {
        for part in Partition::ALL {
            let mut out = BufWriter::new(File::create(part.path(prefix.as_ref()))?);
            for row in self.get(part) {
                write_feature_line(&mut out, row.label, &row.values)?;
            }
            out.flush()?;
        }
        Ok(())
    }
}

/// Shuffle and partition the embedded nodes.
///
/// A node repeated in the embedding file is kept once per occurrence, always
/// with its last vector. Every kept node must have a label.
pub fn split_features(
    labels: &HashMap<String, i64>,
    records: Vec<EmbeddingRecord>,
    cfg: &SplitConfig,
) -> Result<FeatureSplit> {
    let mut nodes = Vec::with_capacity(records.len());
    let mut features: HashMap<String, Vec<String>> = HashMap::with_capacity(records.len());
    for record in records {
        if record.id.starts_with(&cfg.skip_prefix) {
            tracing::debug!(id = %record.id, "skipping auxiliary embedding row");
            continue;
        }
        nodes.push(record.id.clone());
        features.insert(record.id, record.values);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    nodes.shuffle(&mut rng);

    let (train_end, val_end) = cfg.boundaries(nodes.len());
    let mut split = FeatureSplit::default();
    for (pos, node) in nodes.into_iter().enumerate() {
        let label = *labels
            .get(&node)
            .ok_or_else(|| Error::MissingLabel(node.clone()))?;
        let values = features[&node].clone();
        let row = FeatureRow {
            node,
            label,
            values,
        };
        if pos < train_end {
            split.train.push(row);
        } else if pos < val_end {
            split.val.push(row);
        } else {
            split.test.push(row);
        }
    }
    Ok(split)
}

/// Run the whole splitting stage: read labels and embeddings, partition, write.
pub fn run_split(
    label_path: impl AsRef<Path>,
    embedding_path: impl AsRef<Path>,
    output_prefix: impl AsRef<Path>,
    cfg: &SplitConfig,
) -> Result<FeatureSplit> {
    let labels = read_label_file(label_path)?;
    let records = read_embedding_records(embedding_path)?;
    let split = split_features(&labels, records, cfg)?;
    println!("{}", split.len());
    split.write(output_prefix)?;
    tracing::info!(
        train = split.train.len(),
        val = split.val.len(),
        test = split.test.len(),
        "wrote feature partitions"
    );
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize, dim: usize) -> Vec<EmbeddingRecord> {
        (0..n)
            .map(|i| EmbeddingRecord {
                id: i.to_string(),
                values: (0..dim).map(|j| format!("{}.{}", i, j)).collect(),
            })
            .collect()
    }

    fn alternating_labels(n: usize) -> HashMap<String, i64> {
        (0..n).map(|i| (i.to_string(), (i % 2) as i64)).collect()
    }

    #[test]
    fn test_ten_nodes_with_motif_row() {
        let mut recs = records(10, 4);
        recs.insert(
            3,
            EmbeddingRecord {
                id: "motif_1".to_string(),
                values: vec!["9".to_string(); 4],
            },
        );

        let split = split_features(&alternating_labels(10), recs, &SplitConfig::default()).unwrap();
        assert_eq!(split.train.len(), 7);
        assert_eq!(split.val.len(), 1);
        assert_eq!(split.test.len(), 2);
        for part in Partition::ALL {
            assert!(split.get(part).iter().all(|r| !r.node.starts_with("motif")));
        }
    }

    #[test]
    fn test_same_seed_same_split() {
        let labels = alternating_labels(50);
        let a = split_features(&labels, records(50, 2), &SplitConfig::default()).unwrap();
        let b = split_features(&labels, records(50, 2), &SplitConfig::default()).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);

        let c = split_features(&labels, records(50, 2), &SplitConfig::default().with_seed(7))
            .unwrap();
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn test_missing_label() {
        let mut labels = alternating_labels(5);
        labels.remove("3");
        let err = split_features(&labels, records(5, 1), &SplitConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingLabel(id) if id == "3"));
    }

    #[test]
    fn test_partition_paths() {
        assert_eq!(
            Partition::Train.path("out/cora.feature"),
            PathBuf::from("out/cora.feature_train")
        );
        assert_eq!(Partition::Val.path("x"), PathBuf::from("x_val"));
    }

    #[test]
    fn test_boundaries() {
        let cfg = SplitConfig::default();
        assert_eq!(cfg.boundaries(10), (7, 8));
        assert_eq!(cfg.boundaries(2708), (1895, 2166));
        assert_eq!(cfg.boundaries(0), (0, 0));
    }

    #[test]
    fn test_run_split_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let labels = dir.path().join("g.labels");
        let emb = dir.path().join("g.emb");
        std::fs::write(&labels, "0 1\n1 0\n2 1\n").unwrap();
        std::fs::write(&emb, "3 2\n0 0.1 0.2\n1 0.3 0.4\n2 0.5 0.6\n").unwrap();

        let prefix = dir.path().join("g.feature");
        let split = run_split(&labels, &emb, &prefix, &SplitConfig::default()).unwrap();
        assert_eq!(split.len(), 3);

        let train = std::fs::read_to_string(Partition::Train.path(&prefix)).unwrap();
        let test = std::fs::read_to_string(Partition::Test.path(&prefix)).unwrap();
        assert_eq!(train.lines().count(), 2);
        assert_eq!(test.lines().count(), 1);
        assert!(train.lines().all(|l| l.contains(" 0:0.") && l.contains(" 1:0.")));
    }
}
