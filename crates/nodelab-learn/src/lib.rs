#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]

//! Model side of node-classification experiments.
//!
//! - [`boosting`] - leaf-wise gradient-boosted trees for binary labels
//! - [`metrics`] - confusion matrix, accuracy/precision/recall/F1, the metrics log
//! - [`trainer`] - the `<prefix>_train/_val/_test` training stage
//! - [`classifier`] - logistic regression, one-vs-rest and top-k ranking
//! - [`evaluation`] - multi-label F1 over repeated random splits
//! - [`motif`] - motif-significance logs behind a pluggable backend
//! - [`tsne`] - exact t-SNE layouts of embedding files
//!
//! # Example
//!
//! ```rust
//! use nodelab_learn::metrics::{BinaryMetrics, ConfusionMatrix};
//!
//! let m = ConfusionMatrix::from_predictions(&[1.0, 0.0, 1.0, 0.0], &[0.9, 0.1, 0.3, 0.6], 0.5)?;
//! let metrics = BinaryMetrics::from_confusion(&m)?;
//! assert_eq!(metrics.f1, 0.5);
//! # Ok::<(), nodelab_learn::Error>(())
//! ```

pub mod boosting;
pub mod classifier;
mod error;
pub mod evaluation;
pub mod metrics;
pub mod motif;
pub mod trainer;
pub mod tsne;

pub use boosting::{train_booster, BoostDataset, BoostingParams, GbdtModel};
pub use classifier::{LogisticRegression, OneVsRest, ProbabilisticClassifier, TopKRanker};
pub use error::{Error, Result};
pub use evaluation::{run_embedding_classify_f1, Average, EvaluationConfig};
pub use metrics::{BinaryMetrics, ConfusionMatrix};
pub use trainer::{run_training, TrainerConfig};
