//! Motif-significance helpers.
//!
//! Counting motifs and scoring them against shuffled graphs is delegated to a
//! [`MotifAnalyzer`] backend. Without one, [`MotifToolkit`] reports itself as
//! unavailable and its analysis calls fail with [`Error::MotifUnavailable`];
//! reading and filtering existing `.motifslog` files always works.

use crate::{Error, Result};
use ndarray::Array2;
use nodelab_core::{CitationGraph, NodeIdMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Random-graph model used to generate the shuffled ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleModel {
    /// Degree-preserving, no degree correlations.
    #[default]
    Uncorrelated,
    /// Configuration model.
    Configuration,
    /// Erdos-Renyi with the same edge count.
    Erdos,
}

impl ShuffleModel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uncorrelated => "uncorrelated",
            Self::Configuration => "configuration",
            Self::Erdos => "erdos",
        }
    }
}

impl fmt::Display for ShuffleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShuffleModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uncorrelated" => Ok(Self::Uncorrelated),
            "configuration" => Ok(Self::Configuration),
            "erdos" => Ok(Self::Erdos),
            other => Err(Error::InvalidConfig(format!("unknown shuffle model `{other}`"))),
        }
    }
}

/// A motif as its adjacency matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motif {
    pub adjacency: Array2<u8>,
}

impl Motif {
    pub fn size(&self) -> usize {
        self.adjacency.nrows()
    }
}

/// Motifs found in a graph with one z-score each.
#[derive(Debug, Clone, PartialEq)]
pub struct MotifSignificance {
    pub motifs: Vec<Motif>,
    pub z_scores: Vec<f64>,
}

/// External motif-significance backend.
pub trait MotifAnalyzer {
    /// Z-score every connected `motif_size`-vertex subgraph of `graph`
    /// against `n_shuffles` random graphs drawn from `model`.
    fn motif_significance(
        &self,
        graph: &CitationGraph,
        directed: bool,
        motif_size: usize,
        n_shuffles: usize,
        model: ShuffleModel,
    ) -> Result<MotifSignificance>;
}

/// Parameters of one significance run.
#[derive(Debug, Clone)]
pub struct MotifRun {
    pub directed: bool,
    /// Directory prefix, concatenated as-is with the graph name.
    pub data_loc: String,
    pub motif_size: usize,
    pub n_shuffles: usize,
    pub model: ShuffleModel,
}

impl Default for MotifRun {
    fn default() -> Self {
        Self {
            directed: true,
            data_loc: "../data/".to_string(),
            motif_size: 3,
            n_shuffles: 16,
            model: ShuffleModel::Uncorrelated,
        }
    }
}

impl MotifRun {
    /// `<data_loc><graph>.edges`
    pub fn edges_path(&self, graph: &str) -> PathBuf {
        PathBuf::from(format!("{}{graph}.edges", self.data_loc))
    }

    /// `<data_loc><graph>_<k>m.motifslog`, `um` for undirected runs.
    pub fn output_path(&self, graph: &str) -> PathBuf {
        let kind = if self.directed { "m" } else { "um" };
        PathBuf::from(format!(
            "{}{graph}_{}{kind}.motifslog",
            self.data_loc, self.motif_size
        ))
    }
}

/// Capability-checked entry point for motif analysis.
pub struct MotifToolkit {
    backend: Option<Box<dyn MotifAnalyzer>>,
}

impl MotifToolkit {
    /// Wrap a backend. Passing `None` prints the unavailability warning.
    pub fn new(backend: Option<Box<dyn MotifAnalyzer>>) -> Self {
        if backend.is_none() {
            println!("Warning: motif backend is missing, motif analysis is not available.");
            tracing::warn!("no motif analyzer configured");
        }
        Self { backend }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Score motifs of `<data_loc><graph>.edges` and write the `.motifslog`.
    pub fn run_motif_significance(&self, graph: &str, run: &MotifRun) -> Result<PathBuf> {
        let backend = self.backend.as_ref().ok_or(Error::MotifUnavailable)?;
        let g = load_edge_csv(run.edges_path(graph))?;
        tracing::info!(
            graph,
            nodes = g.node_count(),
            edges = g.edge_count(),
            motif_size = run.motif_size,
            "running motif significance"
        );
        let result =
            backend.motif_significance(&g, run.directed, run.motif_size, run.n_shuffles, run.model)?;
        write_motifs_results(
            run.output_path(graph),
            &result.motifs,
            &result.z_scores,
            run.n_shuffles,
            run.model,
        )
    }
}

/// Read a space-delimited edge list; vertex names are numbered in order of appearance.
pub fn load_edge_csv(path: impl AsRef<Path>) -> Result<CitationGraph> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .quote(b'"')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut names = NodeIdMap::new();
    let mut graph = CitationGraph::new();
    for record in reader.records() {
        let record = record?;
        let (Some(src), Some(dst)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let s = names.get(src).unwrap_or_else(|| names.assign(src));
        let t = names.get(dst).unwrap_or_else(|| names.assign(dst));
        graph.add_edge(s, t);
    }
    Ok(graph)
}

fn format_row(row: ndarray::ArrayView1<'_, u8>) -> String {
    let cells: Vec<String> = row.iter().map(|v| format!("{v}.")).collect();
    format!("[{}]", cells.join(" "))
}

/// Write motifs with their z-scores.
///
/// ```text
/// Number of shuffles: 16 (uncorrelated)
/// Motif 1 - z-score: 3.2
/// [0. 1. 0.]
/// ...
///
/// ```
pub fn write_motifs_results(
    output: impl AsRef<Path>,
    motifs: &[Motif],
    z_scores: &[f64],
    n_shuf: usize,
    model: ShuffleModel,
) -> Result<PathBuf> {
    if motifs.len() != z_scores.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} motifs but {} z-scores",
            motifs.len(),
            z_scores.len()
        )));
    }
    let output = output.as_ref();
    let mut out = BufWriter::new(File::create(output)?);
    writeln!(out, "Number of shuffles: {n_shuf} ({model})")?;
    for (i, (m, z)) in motifs.iter().zip(z_scores).enumerate() {
        writeln!(out, "Motif {} - z-score: {z}", i + 1)?;
        for row in m.adjacency.rows() {
            writeln!(out, "{}", format_row(row))?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(output.to_path_buf())
}

/// A motif read back from a `.motifslog`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedMotif {
    /// 1-based position in the log.
    pub index: usize,
    pub z_score: f64,
    pub motif: Motif,
}

fn parse_row(line: &str) -> Option<Vec<u8>> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    inner
        .split_whitespace()
        .map(|cell| cell.parse::<f64>().ok().map(|v| u8::from(v != 0.0)))
        .collect()
}

fn finish_motif(index: usize, z_score: f64, rows: &[Vec<u8>]) -> Result<LoggedMotif> {
    let n = rows.len();
    let mut adjacency = Array2::<u8>::zeros((n, n));
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n {
            return Err(Error::ShapeMismatch(format!(
                "motif {index} row {i} has {} cells, expected {n}",
                row.len()
            )));
        }
        for (j, &v) in row.iter().enumerate() {
            adjacency[[i, j]] = v;
        }
    }
    Ok(LoggedMotif {
        index,
        z_score,
        motif: Motif { adjacency },
    })
}

/// Parse every motif block of a `.motifslog`.
pub fn read_motifs_log(path: impl AsRef<Path>) -> Result<Vec<LoggedMotif>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut motifs = Vec::new();
    let mut current: Option<(usize, f64, Vec<Vec<u8>>)> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(rest) = line.strip_prefix("Motif") {
            if let Some((index, z, rows)) = current.take() {
                motifs.push(finish_motif(index, z, &rows)?);
            }
            let bad = || {
                Error::Core(nodelab_core::Error::Parse {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    message: format!("malformed motif header `{line}`"),
                })
            };
            let index: usize = rest
                .split_whitespace()
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(bad)?;
            let z: f64 = line
                .split_whitespace()
                .last()
                .and_then(|t| t.parse().ok())
                .ok_or_else(bad)?;
            current = Some((index, z, Vec::new()));
        } else if let Some((_, _, rows)) = current.as_mut() {
            if let Some(row) = parse_row(&line) {
                rows.push(row);
            }
        }
    }
    if let Some((index, z, rows)) = current.take() {
        motifs.push(finish_motif(index, z, &rows)?);
    }
    Ok(motifs)
}

/// Motifs of a `.motifslog` whose z-score exceeds `z_thres`.
pub fn significant_graph(motifslog: impl AsRef<Path>, z_thres: f64) -> Result<Vec<LoggedMotif>> {
    let motifs = read_motifs_log(motifslog)?;
    Ok(motifs.into_iter().filter(|m| m.z_score > z_thres).collect())
}
