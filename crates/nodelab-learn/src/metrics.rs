//! Binary classification metrics and the append-only metrics log.

use crate::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// 2x2 confusion counts, laid out as `[[tp, fn], [fp, tn]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fn_: usize,
    pub fp: usize,
    pub tn: usize,
}

impl ConfusionMatrix {
    /// Count outcomes by walking labels and predictions in lock-step.
    ///
    /// A positive label is a hit when `|p| >= threshold`, a negative label
    /// when `|p| <= threshold`; a score exactly at the threshold is therefore
    /// counted as correct for either label. Labels other than 0 and 1 are
    /// not counted.
    pub fn from_predictions(labels: &[f64], preds: &[f64], threshold: f64) -> Result<Self> {
        if labels.len() != preds.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} labels but {} predictions",
                labels.len(),
                preds.len()
            )));
        }
        let mut m = Self::default();
        for (&y, &p) in labels.iter().zip(preds) {
            if y == 1.0 {
                if p.abs() >= threshold {
                    m.tp += 1;
                } else {
                    m.fn_ += 1;
                }
            } else if y == 0.0 {
                if p.abs() <= threshold {
                    m.tn += 1;
                } else {
                    m.fp += 1;
                }
            }
        }
        Ok(m)
    }

    pub fn total(&self) -> usize {
        self.tp + self.fn_ + self.fp + self.tn
    }

    pub fn as_matrix(&self) -> [[usize; 2]; 2] {
        [[self.tp, self.fn_], [self.fp, self.tn]]
    }
}

/// Accuracy, precision, recall and F1 derived from a confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl BinaryMetrics {
    /// Derive the metrics. Only F1 guards its zero denominator (it is 0 when
    /// precision + recall = 0); an empty row or column for accuracy,
    /// precision or recall is an error.
    pub fn from_confusion(m: &ConfusionMatrix) -> Result<Self> {
        let accuracy = ratio(m.tp + m.tn, m.total(), "accuracy")?;
        let precision = ratio(m.tp, m.tp + m.fp, "precision")?;
        let recall = ratio(m.tp, m.tp + m.fn_, "recall")?;
        Ok(Self {
            accuracy,
            precision,
            recall,
            f1: f1_score(precision, recall),
        })
    }

    /// `accuracy precision recall f1`
    pub fn summary(&self) -> String {
        format!(
            "{} {} {} {}",
            self.accuracy, self.precision, self.recall, self.f1
        )
    }
}

fn ratio(num: usize, den: usize, metric: &'static str) -> Result<f64> {
    if den == 0 {
        return Err(Error::UndefinedMetric(metric));
    }
    Ok(num as f64 / den as f64)
}

/// Harmonic mean of precision and recall, 0 when both are 0.
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall != 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Mean squared error between raw labels and raw (unthresholded) predictions.
pub fn mean_squared_error(labels: &[f64], preds: &[f64]) -> Result<f64> {
    if labels.len() != preds.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} labels but {} predictions",
            labels.len(),
            preds.len()
        )));
    }
    if labels.is_empty() {
        return Err(Error::UndefinedMetric("mean squared error"));
    }
    let sum: f64 = labels.iter().zip(preds).map(|(y, p)| (y - p).powi(2)).sum();
    Ok(sum / labels.len() as f64)
}

/// Append `accuracy precision recall f1 mse` as one line.
///
/// The file is opened in append mode per call and never truncated.
pub fn append_metrics_log(path: impl AsRef<Path>, metrics: &BinaryMetrics, mse: f64) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{} {}", metrics.summary(), mse)?;
    Ok(())
}
