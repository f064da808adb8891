//! `nodelab`: node-classification experiments over graph embeddings.
//!
//! The pipeline runs in stages, each usable on its own:
//!
//! 1. [`nodelab_core::dataset::run_ingest`] - raw citation files to an `id index` map and a graph bundle
//! 2. [`nodelab_core::split::run_split`] - embeddings + labels to `_train` / `_val` / `_test` feature files
//! 3. [`nodelab_learn::trainer::run_training`] - boosted binary classifier, confusion metrics, metrics log
//! 4. [`nodelab_learn::evaluation::run_embedding_classify_f1`] - multi-label top-k F1 of an embedding
//!
//! ```rust
//! use nodelab::nodelab_core::split::SplitConfig;
//! use nodelab::nodelab_learn::metrics::f1_score;
//!
//! assert_eq!(SplitConfig::default().boundaries(2708), (1895, 2166));
//! assert_eq!(f1_score(0.0, 0.0), 0.0);
//! ```

pub use nodelab_core;
pub use nodelab_learn;

pub use nodelab_core::{
    load_dataset, load_embeddings, CitationGraph, Dataset, DatasetBundle, LabelMatrix,
    LoadedDataset, NodeIdMap,
};
pub use nodelab_learn::{
    run_embedding_classify_f1, run_training, train_booster, BinaryMetrics, ConfusionMatrix,
    TopKRanker,
};
