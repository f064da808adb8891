//! Gradient-boosted decision trees for binary classification.
//!
//! Trees are grown leaf-wise on binned feature histograms, starting from the
//! log-odds of the training label mean, and optimise binary log-loss. With a
//! validation set, training stops once the validation log-loss has not
//! improved for `early_stopping_rounds` rounds and the model is cut back to
//! its best iteration.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use nodelab_learn::boosting::{train_booster, BoostDataset, BoostingParams};
//!
//! let x = array![[0.0f32], [1.0], [2.0], [3.0]];
//! let train = BoostDataset::new(x, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
//!
//! let params = BoostingParams::default()
//!     .with_min_data_in_leaf(1)
//!     .with_num_boost_round(20);
//! let model = train_booster(&params, &train, None).unwrap();
//! let p = model.predict_proba(train.features());
//! assert!(p[3] > 0.5 && p[0] < 0.5);
//! ```

mod bins;
mod tree;

pub use tree::{Node, Tree};

use crate::{Error, Result};
use bins::BinnedMatrix;
use ndarray::{Array2, ArrayView2};
use nodelab_core::sparse::{to_dense, SparseRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tree::{grow_tree, GrowParams};

/// Training objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Binary log-loss on labels in {0, 1}.
    Binary,
}

/// Booster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Shrinkage applied to every leaf (default: 0.1).
    pub learning_rate: f64,
    /// Maximum leaves per tree (default: 31).
    pub num_leaves: usize,
    /// Objective (default: binary).
    pub objective: Objective,
    /// Upper bound on boosting rounds (default: 2000).
    pub num_boost_round: usize,
    /// Validation patience in rounds (default: 30; None = never stop early).
    pub early_stopping_rounds: Option<usize>,
    /// Minimum rows per leaf (default: 20).
    pub min_data_in_leaf: usize,
    /// Minimum hessian sum per leaf (default: 1e-3).
    pub min_sum_hessian_in_leaf: f64,
    /// Maximum histogram bins per feature (default: 255).
    pub max_bin: usize,
    /// L2 penalty on leaf values (default: 0).
    pub lambda_l2: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            num_leaves: 31,
            objective: Objective::Binary,
            num_boost_round: 2000,
            early_stopping_rounds: Some(30),
            min_data_in_leaf: 20,
            min_sum_hessian_in_leaf: 1e-3,
            max_bin: 255,
            lambda_l2: 0.0,
        }
    }
}

impl BoostingParams {
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_num_leaves(mut self, n: usize) -> Self {
        self.num_leaves = n;
        self
    }

    pub fn with_num_boost_round(mut self, n: usize) -> Self {
        self.num_boost_round = n;
        self
    }

    pub fn with_early_stopping_rounds(mut self, n: Option<usize>) -> Self {
        self.early_stopping_rounds = n;
        self
    }

    pub fn with_min_data_in_leaf(mut self, n: usize) -> Self {
        self.min_data_in_leaf = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.num_leaves < 2 {
            return Err(Error::InvalidConfig("num_leaves must be at least 2".into()));
        }
        if self.max_bin < 2 {
            return Err(Error::InvalidConfig("max_bin must be at least 2".into()));
        }
        Ok(())
    }
}

/// Dense features with binary labels.
#[derive(Debug, Clone)]
pub struct BoostDataset {
    x: Array2<f32>,
    y: Vec<f64>,
}

impl BoostDataset {
    pub fn new(x: Array2<f32>, y: Vec<f64>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if let Some(&bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(Error::InvalidLabel(bad));
        }
        Ok(Self { x, y })
    }

    /// Densify sparse records to `width` columns.
    pub fn from_records(records: &[SparseRecord], width: usize) -> Result<Self> {
        let (x, y) = to_dense(records, width);
        Self::new(x, y)
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn labels(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// A trained ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtModel {
    pub init_score: f64,
    pub trees: Vec<Tree>,
    /// Rounds kept (equals `trees.len()`).
    pub best_iteration: usize,
    /// Validation log-loss at `best_iteration`, when a validation set was used.
    pub best_score: Option<f64>,
}

impl GbdtModel {
    /// Raw (log-odds) scores.
    pub fn predict_raw(&self, x: ArrayView2<'_, f32>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.init_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect()
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Vec<f64> {
        self.predict_raw(x).into_iter().map(sigmoid).collect()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

const EPS: f64 = 1e-15;

/// Mean binary log-loss.
pub fn binary_logloss(labels: &[f64], probs: &[f64]) -> f64 {
    let n = labels.len().max(1) as f64;
    labels
        .iter()
        .zip(probs)
        .map(|(&y, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}

/// Train a binary ensemble, optionally early-stopped on `valid`.
pub fn train_booster(
    params: &BoostingParams,
    train: &BoostDataset,
    valid: Option<&BoostDataset>,
) -> Result<GbdtModel> {
    params.validate()?;
    if train.is_empty() {
        return Err(Error::InvalidConfig("training set is empty".into()));
    }
    let valid = valid.filter(|v| {
        if v.is_empty() {
            tracing::warn!("validation set is empty, early stopping disabled");
        }
        !v.is_empty()
    });

    let mean = (train.y.iter().sum::<f64>() / train.len() as f64).clamp(EPS, 1.0 - EPS);
    let init_score = (mean / (1.0 - mean)).ln();

    let binned = BinnedMatrix::build(train.features(), params.max_bin);
    let grow = GrowParams {
        num_leaves: params.num_leaves,
        min_data_in_leaf: params.min_data_in_leaf,
        min_sum_hessian_in_leaf: params.min_sum_hessian_in_leaf,
        lambda_l2: params.lambda_l2,
        shrinkage: params.learning_rate,
    };

    let mut scores = vec![init_score; train.len()];
    let mut valid_scores = valid.map(|v| vec![init_score; v.len()]);
    let mut grad = vec![0.0; train.len()];
    let mut hess = vec![0.0; train.len()];

    let mut trees = Vec::new();
    let mut best_iteration = 0;
    let mut best_score: Option<f64> = None;

    for round in 0..params.num_boost_round {
        for i in 0..train.len() {
            let p = sigmoid(scores[i]);
            grad[i] = p - train.y[i];
            hess[i] = p * (1.0 - p);
        }

        let tree = grow_tree(&binned, &grad, &hess, &grow);
        if tree.nodes.len() == 1 {
            tracing::info!(round, "no leaf meets the split requirements, stopping");
            break;
        }
        for (s, row) in scores.iter_mut().zip(train.x.rows()) {
            *s += tree.predict_row(row);
        }

        if let (Some(v), Some(vs)) = (valid, valid_scores.as_mut()) {
            for (s, row) in vs.iter_mut().zip(v.x.rows()) {
                *s += tree.predict_row(row);
            }
            let probs: Vec<f64> = vs.iter().map(|&s| sigmoid(s)).collect();
            let loss = binary_logloss(&v.y, &probs);
            tracing::debug!(round = round + 1, valid_logloss = loss);

            trees.push(tree);
            if best_score.map_or(true, |best| loss < best) {
                best_score = Some(loss);
                best_iteration = trees.len();
            } else if let Some(patience) = params.early_stopping_rounds {
                if trees.len() - best_iteration >= patience {
                    tracing::info!(
                        best_iteration,
                        best_logloss = best_score,
                        "early stopping"
                    );
                    break;
                }
            }
        } else {
            trees.push(tree);
            best_iteration = trees.len();
        }
    }

    trees.truncate(best_iteration);
    Ok(GbdtModel {
        init_score,
        trees,
        best_iteration,
        best_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn separable(n: usize) -> BoostDataset {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f32 } else { 1.0 });
        let y = (0..n).map(|i| if i >= n / 2 { 1.0 } else { 0.0 }).collect();
        BoostDataset::new(x, y).unwrap()
    }

    #[test]
    fn test_learns_threshold() {
        let data = separable(100);
        let params = BoostingParams::default().with_num_boost_round(50);
        let model = train_booster(&params, &data, None).unwrap();

        assert_eq!(model.num_trees(), 50);
        let p = model.predict_proba(data.features());
        assert!(p[0] < 0.1);
        assert!(p[99] > 0.9);
    }

    #[test]
    fn test_early_stopping_truncates_to_best() {
        let train = separable(100);
        let valid = separable(40);
        let params = BoostingParams::default().with_early_stopping_rounds(Some(3));
        let model = train_booster(&params, &train, Some(&valid)).unwrap();

        assert!(model.num_trees() < params.num_boost_round);
        assert_eq!(model.num_trees(), model.best_iteration);
        assert!(model.best_score.is_some());
    }

    #[test]
    fn test_empty_validation_runs_all_rounds() {
        let train = separable(100);
        let valid = BoostDataset::new(Array2::zeros((0, 2)), Vec::new()).unwrap();
        let params = BoostingParams::default()
            .with_num_boost_round(40)
            .with_early_stopping_rounds(Some(3));
        let model = train_booster(&params, &train, Some(&valid)).unwrap();

        assert_eq!(model.num_trees(), 40);
        assert!(model.best_score.is_none());
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let x = Array2::<f32>::zeros((2, 1));
        assert!(matches!(
            BoostDataset::new(x, vec![0.0, 2.0]),
            Err(Error::InvalidLabel(v)) if v == 2.0
        ));
    }

    #[test]
    fn test_invalid_params() {
        let data = separable(10);
        let params = BoostingParams::default().with_num_leaves(1);
        assert!(matches!(
            train_booster(&params, &data, None),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = train_booster(
            &BoostingParams::default().with_num_boost_round(3),
            &separable(60),
            None,
        )
        .unwrap();
        model.save_json(&path).unwrap();

        let loaded = GbdtModel::load_json(&path).unwrap();
        assert_eq!(loaded.num_trees(), 3);
        let data = separable(60);
        for (a, b) in loaded
            .predict_proba(data.features())
            .iter()
            .zip(model.predict_proba(data.features()))
        {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_logloss() {
        assert!((binary_logloss(&[1.0, 0.0], &[0.5, 0.5]) - std::f64::consts::LN_2).abs() < 1e-12);
    }
}
