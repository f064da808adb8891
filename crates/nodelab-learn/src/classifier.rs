//! Binary probabilistic classifiers and their multi-label wrappers.
//!
//! [`OneVsRest`] fits one binary estimator per label column; [`TopKRanker`]
//! turns its per-class probabilities into exactly `k` positive labels per row,
//! where `k` is the number of true labels the caller supplies.

use crate::boosting::sigmoid;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2};
use nodelab_core::LabelMatrix;

/// A binary classifier that outputs P(y = 1).
pub trait ProbabilisticClassifier {
    /// Fit on rows of `x` with 0/1 targets `y`.
    fn fit(&mut self, x: ArrayView2<'_, f32>, y: &[f64]) -> Result<()>;

    /// Positive-class probability per row.
    fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>>;
}

/// Logistic regression settings.
#[derive(Debug, Clone)]
pub struct LogisticConfig {
    /// Inverse L2 strength, as in liblinear (default: 1.0).
    pub c: f64,
    /// Gradient step (default: 0.5).
    pub learning_rate: f64,
    /// Iteration cap (default: 500).
    pub max_iter: usize,
    /// Stop once the gradient's max-norm falls below this (default: 1e-5).
    pub tol: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.5,
            max_iter: 500,
            tol: 1e-5,
        }
    }
}

impl LogisticConfig {
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, n: usize) -> Self {
        self.max_iter = n;
        self
    }
}

/// L2-regularised logistic regression fitted by full-batch gradient descent.
///
/// Minimises `||w||^2 / (2 C n) + mean log-loss`; the intercept is not penalised.
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: LogisticConfig,
    weights: Option<(Array1<f64>, f64)>,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            weights: None,
        }
    }

    /// `(coefficients, intercept)` once fitted.
    pub fn coefficients(&self) -> Option<(&Array1<f64>, f64)> {
        self.weights.as_ref().map(|(w, b)| (w, *b))
    }
}

impl ProbabilisticClassifier for LogisticRegression {
    fn fit(&mut self, x: ArrayView2<'_, f32>, y: &[f64]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if !(self.config.c > 0.0) {
            return Err(Error::InvalidConfig(format!("C must be positive, got {}", self.config.c)));
        }
        let n = x.nrows().max(1) as f64;
        let x = x.mapv(f64::from);
        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;
        let penalty = 1.0 / (self.config.c * n);

        for iter in 0..self.config.max_iter {
            let z = x.dot(&w) + b;
            let residual: Array1<f64> = z
                .iter()
                .zip(y)
                .map(|(&z, &t)| sigmoid(z) - t)
                .collect();
            let grad_w = x.t().dot(&residual) / n + &w * penalty;
            let grad_b = residual.sum() / n;

            let norm = grad_w.iter().fold(grad_b.abs(), |m, g| m.max(g.abs()));
            if norm < self.config.tol {
                tracing::debug!(iter, "logistic regression converged");
                break;
            }
            w.scaled_add(-self.config.learning_rate, &grad_w);
            b -= self.config.learning_rate * grad_b;
        }
        self.weights = Some((w, b));
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
        let (w, b) = self.weights.as_ref().ok_or(Error::NotFitted)?;
        if x.ncols() != w.len() {
            return Err(Error::ShapeMismatch(format!(
                "fitted on {} features, got {}",
                w.len(),
                x.ncols()
            )));
        }
        let z = x.mapv(f64::from).dot(w) + *b;
        Ok(z.iter().map(|&z| sigmoid(z)).collect())
    }
}

#[derive(Debug, Clone)]
enum Estimator<C> {
    /// The column was constant in training.
    Constant(f64),
    Fitted(C),
}

/// One binary estimator per label column.
#[derive(Debug, Clone)]
pub struct OneVsRest<C> {
    template: C,
    estimators: Vec<Estimator<C>>,
}

impl<C: ProbabilisticClassifier + Clone> OneVsRest<C> {
    /// Every column gets a fresh clone of `template`.
    pub fn new(template: C) -> Self {
        Self {
            template,
            estimators: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: ArrayView2<'_, f32>, labels: &LabelMatrix) -> Result<()> {
        if x.nrows() != labels.n_rows() {
            return Err(Error::ShapeMismatch(format!(
                "{} feature rows but {} label rows",
                x.nrows(),
                labels.n_rows()
            )));
        }
        let dense = labels.to_dense();
        let mut estimators = Vec::with_capacity(dense.ncols());
        for column in dense.columns() {
            let y: Vec<f64> = column.iter().map(|&v| f64::from(v.min(1))).collect();
            let first = y.first().copied().unwrap_or(0.0);
            if y.iter().all(|&v| v == first) {
                estimators.push(Estimator::Constant(first));
                continue;
            }
            let mut clf = self.template.clone();
            clf.fit(x, &y)?;
            estimators.push(Estimator::Fitted(clf));
        }
        self.estimators = estimators;
        Ok(())
    }

    /// Class labels, one per column seen in `fit`.
    pub fn classes(&self) -> Vec<usize> {
        (0..self.estimators.len()).collect()
    }

    /// `(rows, classes)` matrix of positive-class probabilities.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f64>> {
        if self.estimators.is_empty() {
            return Err(Error::NotFitted);
        }
        let mut probs = Array2::<f64>::zeros((x.nrows(), self.estimators.len()));
        for (j, est) in self.estimators.iter().enumerate() {
            match est {
                Estimator::Constant(v) => probs.column_mut(j).fill(*v),
                Estimator::Fitted(clf) => {
                    for (slot, p) in probs.column_mut(j).iter_mut().zip(clf.predict_proba(x)?) {
                        *slot = p;
                    }
                }
            }
        }
        Ok(probs)
    }
}

/// Rank-based multi-label prediction on top of [`OneVsRest`].
#[derive(Debug, Clone)]
pub struct TopKRanker<C> {
    inner: OneVsRest<C>,
}

impl<C: ProbabilisticClassifier + Clone> TopKRanker<C> {
    pub fn new(template: C) -> Self {
        Self {
            inner: OneVsRest::new(template),
        }
    }

    pub fn fit(&mut self, x: ArrayView2<'_, f32>, labels: &LabelMatrix) -> Result<()> {
        self.inner.fit(x, labels)
    }

    pub fn classes(&self) -> Vec<usize> {
        self.inner.classes()
    }

    /// Mark the `top_k_list[i]` most probable classes of row `i` as 1.
    ///
    /// The output has `num_classes` columns; ties go to the higher class index.
    pub fn predict(
        &self,
        features: ArrayView2<'_, f32>,
        top_k_list: &[usize],
        num_classes: usize,
    ) -> Result<Array2<u8>> {
        if features.nrows() != top_k_list.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} rows but {} top-k counts",
                features.nrows(),
                top_k_list.len()
            )));
        }
        let probs = self.inner.predict_proba(features)?;
        let classes = self.inner.classes();
        if classes.len() > num_classes {
            return Err(Error::ShapeMismatch(format!(
                "{} fitted classes exceed num_classes {num_classes}",
                classes.len()
            )));
        }

        let mut out = Array2::<u8>::zeros((features.nrows(), num_classes));
        for (i, &k) in top_k_list.iter().enumerate() {
            let row = probs.row(i);
            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_by(|&a, &b| row[a].total_cmp(&row[b]));
            for &j in order.iter().rev().take(k) {
                out[[i, classes[j]]] = 1;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Predicts a fixed probability per feature column 0 value.
    #[derive(Debug, Clone, Default)]
    struct Echo;

    impl ProbabilisticClassifier for Echo {
        fn fit(&mut self, _x: ArrayView2<'_, f32>, _y: &[f64]) -> Result<()> {
            Ok(())
        }

        fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
            Ok(x.column(0).iter().map(|&v| f64::from(v)).collect())
        }
    }

    #[test]
    fn test_logistic_separates() {
        let x = array![[-2.0f32], [-1.0], [1.0], [2.0]];
        let mut clf = LogisticRegression::default();
        clf.fit(x.view(), &[0.0, 0.0, 1.0, 1.0]).unwrap();

        let p = clf.predict_proba(x.view()).unwrap();
        assert!(p[0] < 0.5 && p[1] < 0.5);
        assert!(p[2] > 0.5 && p[3] > 0.5);
    }

    #[test]
    fn test_logistic_not_fitted() {
        let clf = LogisticRegression::default();
        assert!(matches!(
            clf.predict_proba(array![[1.0f32]].view()),
            Err(Error::NotFitted)
        ));
    }

    #[test]
    fn test_one_vs_rest_constant_column() {
        let x = array![[0.0f32], [1.0], [2.0]];
        let labels = LabelMatrix::Dense(array![[1u8, 0], [1, 1], [1, 0]]);
        let mut ovr = OneVsRest::new(LogisticRegression::default());
        ovr.fit(x.view(), &labels).unwrap();

        let probs = ovr.predict_proba(x.view()).unwrap();
        assert_eq!(probs.column(0).to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(ovr.classes(), vec![0, 1]);
    }

    #[test]
    fn test_top_k_picks_highest() {
        // each column has both values so Echo is "fitted" for all three
        let labels = LabelMatrix::Dense(array![[1u8, 1, 1], [0, 0, 0]]);
        let x_train = array![[0.0f32], [1.0]];
        let mut ranker = TopKRanker::new(Echo);
        ranker.fit(x_train.view(), &labels).unwrap();

        let x = array![[0.7f32], [0.2]];
        let out = ranker.predict(x.view(), &[2, 0], 3).unwrap();
        // Echo gives the same probability to all classes; ties go high.
        assert_eq!(out.row(0).to_vec(), vec![0, 1, 1]);
        assert_eq!(out.row(1).iter().map(|&v| v as usize).sum::<usize>(), 0);
    }

    #[test]
    fn test_top_k_length_mismatch() {
        let labels = LabelMatrix::from_classes(&[0, 1]);
        let x = array![[0.0f32], [1.0]];
        let mut ranker = TopKRanker::new(LogisticRegression::default());
        ranker.fit(x.view(), &labels).unwrap();
        assert!(matches!(
            ranker.predict(x.view(), &[1], 2),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
