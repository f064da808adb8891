//! Serialized dataset bundles: ingestion from raw citation files and the
//! named-dataset loaders.

use crate::labels::LabelMatrix;
use crate::sparse::CsrMatrix;
use crate::{CitationGraph, Error, NodeIdMap, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Labels as stored in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BundleLabels {
    /// One class index per node.
    Classes(Vec<usize>),
    /// Binary indicator matrix, already multi-label.
    Indicator(LabelMatrix),
}

/// Everything persisted for one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetBundle {
    pub graph: CitationGraph,
    pub features: Option<CsrMatrix>,
    pub labels: Option<BundleLabels>,
}

impl DatasetBundle {
    /// A bundle holding only the graph.
    pub fn from_graph(graph: CitationGraph) -> Self {
        Self {
            graph,
            features: None,
            labels: None,
        }
    }

    /// Save to binary file (bincode).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from binary file (bincode).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut bundle: Self = bincode::deserialize_from(reader)?;
        bundle.graph.rebuild_indexes();
        Ok(bundle)
    }
}

/// Ingestion options.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Also keep node features and class labels from the content file.
    pub include_content: bool,
}

impl IngestOptions {
    pub fn with_content(mut self, include: bool) -> Self {
        self.include_content = include;
        self
    }
}

/// Content table: `id f1 .. fk class` per line.
#[derive(Debug, Clone)]
pub struct ContentTable {
    pub features: CsrMatrix,
    pub classes: Vec<usize>,
    /// Class names; position is the class index.
    pub class_names: Vec<String>,
}

/// Parse a node-content file. Rows follow file order (the dense node index);
/// class indices follow the sorted class names.
pub fn read_content_table(path: impl AsRef<Path>) -> Result<ContentTable> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut rows: Vec<(Vec<f32>, String)> = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let [_, values @ .., class] = tokens.as_slice() else {
            return Err(Error::parse(path, lineno + 1, "expected `id features.. class`"));
        };
        let values = values
            .iter()
            .map(|v| {
                v.parse::<f32>()
                    .map_err(|_| Error::parse(path, lineno + 1, format!("bad feature `{v}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push((values, class.to_string()));
    }

    let width = rows.first().map_or(0, |(v, _)| v.len());
    let class_names: Vec<String> = rows
        .iter()
        .map(|(_, c)| c.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut features = CsrMatrix::new(width);
    let mut classes = Vec::with_capacity(rows.len());
    for (values, class) in rows {
        if values.len() != width {
            return Err(Error::DimensionMismatch {
                expected: width,
                got: values.len(),
            });
        }
        features.push_row(values.into_iter().enumerate())?;
        // binary_search cannot miss: class_names holds every class seen
        classes.push(class_names.binary_search(&class).unwrap_or_default());
    }

    Ok(ContentTable {
        features,
        classes,
        class_names,
    })
}

/// Build the node-ID map and dataset bundle from a content file and an edge list.
pub fn ingest(
    content_path: impl AsRef<Path>,
    edges_path: impl AsRef<Path>,
    opts: &IngestOptions,
) -> Result<(NodeIdMap, DatasetBundle)> {
    let content_path = content_path.as_ref();
    let map = NodeIdMap::from_content_file(content_path)?;
    let graph = CitationGraph::from_edge_file(edges_path, &map)?;
    tracing::info!(
        ids = map.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built citation graph"
    );

    let mut bundle = DatasetBundle::from_graph(graph);
    if opts.include_content {
        let table = read_content_table(content_path)?;
        tracing::info!(classes = table.class_names.len(), "read node content");
        bundle.features = Some(table.features);
        bundle.labels = Some(BundleLabels::Classes(table.classes));
    }
    Ok((map, bundle))
}

/// Ingest and persist: writes the `id index` side file and the binary bundle.
pub fn run_ingest(
    content_path: impl AsRef<Path>,
    edges_path: impl AsRef<Path>,
    map_out: impl AsRef<Path>,
    bundle_out: impl AsRef<Path>,
    opts: &IngestOptions,
) -> Result<DatasetBundle> {
    let (map, bundle) = ingest(content_path, edges_path, opts)?;
    map.write_to(map_out)?;
    bundle.save(bundle_out)?;
    Ok(bundle)
}

/// Datasets known to the loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    BlogCatalog,
    Cora,
    Citeseer,
}

impl Dataset {
    pub fn name(self) -> &'static str {
        match self {
            Self::BlogCatalog => "blogcatalog",
            Self::Cora => "cora",
            Self::Citeseer => "citeseer",
        }
    }

    /// `<data_dir>/<name>.data`
    pub fn bundle_path(self, data_dir: impl AsRef<Path>) -> PathBuf {
        data_dir.as_ref().join(format!("{}.data", self.name()))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blogcatalog" => Ok(Self::BlogCatalog),
            "cora" => Ok(Self::Cora),
            "citeseer" => Ok(Self::Citeseer),
            other => Err(Error::UnknownDataset(other.to_string())),
        }
    }
}

/// A loaded dataset: graph, optional node features, binary label matrix.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub graph: CitationGraph,
    pub features: Option<CsrMatrix>,
    pub labels: LabelMatrix,
}

/// Load a named dataset from `data_dir`.
///
/// Citation datasets (cora, citeseer) store class indices and features; the
/// classes are one-hot encoded. BlogCatalog stores an indicator matrix and no
/// features.
pub fn load_dataset(name: &str, data_dir: impl AsRef<Path>) -> Result<LoadedDataset> {
    let dataset: Dataset = name.parse()?;
    let bundle = DatasetBundle::load(dataset.bundle_path(data_dir))?;

    match dataset {
        Dataset::Cora | Dataset::Citeseer => {
            let features = bundle.features.ok_or(Error::MissingField("features"))?;
            let labels = match bundle.labels {
                Some(BundleLabels::Classes(classes)) => LabelMatrix::from_classes(&classes),
                Some(BundleLabels::Indicator(m)) => m,
                None => return Err(Error::MissingField("labels")),
            };
            Ok(LoadedDataset {
                graph: bundle.graph,
                features: Some(features),
                labels,
            })
        }
        Dataset::BlogCatalog => match bundle.labels {
            Some(BundleLabels::Indicator(labels)) => Ok(LoadedDataset {
                graph: bundle.graph,
                features: None,
                labels,
            }),
            _ => Err(Error::MissingField("label indicator matrix")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::SparseLabels;

    fn write_raw(dir: &Path) -> (PathBuf, PathBuf) {
        let content = dir.join("cora.content");
        let edges = dir.join("cora.edges");
        std::fs::write(
            &content,
            "35 0 1 0 Theory\n1033 1 0 0 Neural_Networks\n103482 0 0 1 Theory\n",
        )
        .unwrap();
        std::fs::write(&edges, "35 1033\n1033 103482\n35 1033\n").unwrap();
        (content, edges)
    }

    #[test]
    fn test_ingest_graph_only() {
        let dir = tempfile::tempdir().unwrap();
        let (content, edges) = write_raw(dir.path());

        let (map, bundle) = ingest(&content, &edges, &IngestOptions::default()).unwrap();
        assert_eq!(map.get("103482"), Some(2));
        assert_eq!(bundle.graph.edge_count(), 2);
        assert!(bundle.features.is_none());
        assert!(bundle.labels.is_none());
    }

    #[test]
    fn test_ingest_with_content_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let (content, edges) = write_raw(dir.path());
        let map_out = dir.path().join("map.file");
        let bundle_out = Dataset::Cora.bundle_path(dir.path());

        let opts = IngestOptions::default().with_content(true);
        run_ingest(&content, &edges, &map_out, &bundle_out, &opts).unwrap();

        assert_eq!(
            std::fs::read_to_string(&map_out).unwrap(),
            "35 0\n1033 1\n103482 2\n"
        );

        let loaded = load_dataset("cora", dir.path()).unwrap();
        assert!(loaded.graph.has_edge(1, 2));
        assert_eq!(loaded.features.as_ref().unwrap().nnz(), 3);
        // Neural_Networks < Theory
        assert_eq!(loaded.labels.n_cols(), 2);
        assert_eq!(loaded.labels.row_positives(0), vec![1]);
        assert_eq!(loaded.labels.row_positives(1), vec![0]);
    }

    #[test]
    fn test_graph_only_bundle_is_not_a_cora_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let (content, edges) = write_raw(dir.path());
        let bundle_out = Dataset::Cora.bundle_path(dir.path());
        run_ingest(
            &content,
            &edges,
            dir.path().join("map.file"),
            &bundle_out,
            &IngestOptions::default(),
        )
        .unwrap();

        assert!(matches!(
            load_dataset("cora", dir.path()),
            Err(Error::MissingField("features"))
        ));
    }

    #[test]
    fn test_blogcatalog_indicator() {
        let dir = tempfile::tempdir().unwrap();
        let labels = SparseLabels::new(vec![vec![0, 2], vec![1]], 3).unwrap();
        let bundle = DatasetBundle {
            graph: CitationGraph::from_edges([(0, 1)]),
            features: None,
            labels: Some(BundleLabels::Indicator(LabelMatrix::Sparse(labels))),
        };
        bundle.save(Dataset::BlogCatalog.bundle_path(dir.path())).unwrap();

        let loaded = load_dataset("blogcatalog", dir.path()).unwrap();
        assert!(loaded.features.is_none());
        assert_eq!(loaded.labels.nonzero_per_row(), vec![2, 1]);
    }

    #[test]
    fn test_unknown_dataset() {
        assert!(matches!(
            load_dataset("pubmed", "."),
            Err(Error::UnknownDataset(name)) if name == "pubmed"
        ));
    }
}
