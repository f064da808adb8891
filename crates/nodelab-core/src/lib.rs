#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]

//! Data side of node-classification experiments.
//!
//! - [`NodeIdMap`] - original node ID -> dense index, in scan order
//! - [`CitationGraph`] - directed graph over dense indices
//! - [`dataset`] - binary dataset bundles, ingestion and named loaders
//! - [`embedding`] - `count dim` embedding files
//! - [`labels`] - label files and the multi-label [`LabelMatrix`]
//! - [`sparse`] - the `label idx:val` feature format
//! - [`split`] - seeded 70/10/20 train/val/test partitioning
//!
//! # Example
//!
//! ```rust
//! use nodelab_core::split::SplitConfig;
//!
//! let cfg = SplitConfig::default();
//! assert_eq!(cfg.boundaries(10), (7, 8));
//! ```

pub mod dataset;
pub mod embedding;
mod error;
mod graph;
mod idmap;
pub mod labels;
pub mod sparse;
pub mod split;

pub use dataset::{load_dataset, Dataset, DatasetBundle, LoadedDataset};
pub use embedding::load_embeddings;
pub use error::{Error, Result};
pub use graph::CitationGraph;
pub use idmap::NodeIdMap;
pub use labels::LabelMatrix;

// Re-export petgraph for advanced graph operations
pub use petgraph;
