//! Error types for nodelab-core.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for ingestion, parsing and splitting.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary bundle (de)serialization error.
    #[error("Bundle encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    /// A line in an input file could not be parsed.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Edge endpoint missing from the node-ID map.
    #[error("Node not found in id map: {0}")]
    UnknownNode(String),

    /// A shuffled node has no label.
    #[error("No label for node: {0}")]
    MissingLabel(String),

    /// Embedding row id outside the declared node count.
    #[error("Embedding row {id} out of range (node count {count})")]
    NodeOutOfRange { id: usize, count: usize },

    /// Vector length differs from the declared dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Dataset name is not one of the known datasets.
    #[error("Dataset not found: {0}")]
    UnknownDataset(String),

    /// Bundle lacks a field the loader needs.
    #[error("Dataset bundle has no {0}")]
    MissingField(&'static str),
}

impl Error {
    pub(crate) fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Result type for nodelab-core operations.
pub type Result<T> = std::result::Result<T, Error>;
