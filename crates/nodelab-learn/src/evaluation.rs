//! Multi-label node classification scores for an embedding.

use crate::classifier::{ProbabilisticClassifier, TopKRanker};
use crate::{Error, Result};
use ndarray::{ArrayView2, Axis};
use nodelab_core::{load_dataset, load_embeddings};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::path::{Path, PathBuf};

/// Shuffle `0..n` with `seed` and cut it into `(train, test)` row indices.
///
/// The test side gets `ceil(test_size * n)` rows.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::InvalidConfig(format!(
            "test_size {test_size} leaves an empty side for {n} samples"
        )));
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok((train, order))
}

/// How per-label F1 scores are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    /// Global TP/FP/FN counts.
    Micro,
    /// Unweighted mean over labels.
    Macro,
    /// Mean over rows.
    Samples,
    /// Mean over labels weighted by support.
    Weighted,
}

impl Average {
    pub const ALL: [Average; 4] = [Average::Micro, Average::Macro, Average::Samples, Average::Weighted];

    pub fn name(self) -> &'static str {
        match self {
            Self::Micro => "micro",
            Self::Macro => "macro",
            Self::Samples => "samples",
            Self::Weighted => "weighted",
        }
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn f1_from_counts(tp: usize, fp: usize, fn_: usize) -> f64 {
    let den = 2 * tp + fp + fn_;
    if den == 0 {
        0.0
    } else {
        (2 * tp) as f64 / den as f64
    }
}

fn check_shapes(y_true: &ArrayView2<'_, u8>, y_pred: &ArrayView2<'_, u8>) -> Result<()> {
    if y_true.dim() != y_pred.dim() {
        return Err(Error::ShapeMismatch(format!(
            "y_true is {:?} but y_pred is {:?}",
            y_true.dim(),
            y_pred.dim()
        )));
    }
    Ok(())
}

/// Multi-label F1 on binary indicator matrices. Undefined terms count as 0.
pub fn f1_score(y_true: ArrayView2<'_, u8>, y_pred: ArrayView2<'_, u8>, average: Average) -> Result<f64> {
    check_shapes(&y_true, &y_pred)?;

    let per_label: Vec<(usize, usize, usize)> = y_true
        .columns()
        .into_iter()
        .zip(y_pred.columns())
        .map(|(t, p)| counts(t.iter(), p.iter()))
        .collect();

    let score = match average {
        Average::Micro => {
            let (tp, fp, fn_) = per_label
                .iter()
                .fold((0, 0, 0), |acc, c| (acc.0 + c.0, acc.1 + c.1, acc.2 + c.2));
            f1_from_counts(tp, fp, fn_)
        }
        Average::Macro => {
            if per_label.is_empty() {
                0.0
            } else {
                per_label
                    .iter()
                    .map(|&(tp, fp, fn_)| f1_from_counts(tp, fp, fn_))
                    .sum::<f64>()
                    / per_label.len() as f64
            }
        }
        Average::Weighted => {
            let support: usize = per_label.iter().map(|&(tp, _, fn_)| tp + fn_).sum();
            if support == 0 {
                0.0
            } else {
                per_label
                    .iter()
                    .map(|&(tp, fp, fn_)| f1_from_counts(tp, fp, fn_) * (tp + fn_) as f64)
                    .sum::<f64>()
                    / support as f64
            }
        }
        Average::Samples => {
            if y_true.nrows() == 0 {
                0.0
            } else {
                y_true
                    .rows()
                    .into_iter()
                    .zip(y_pred.rows())
                    .map(|(t, p)| {
                        let (tp, fp, fn_) = counts(t.iter(), p.iter());
                        f1_from_counts(tp, fp, fn_)
                    })
                    .sum::<f64>()
                    / y_true.nrows() as f64
            }
        }
    };
    Ok(score)
}

fn counts<'a>(
    truth: impl Iterator<Item = &'a u8>,
    pred: impl Iterator<Item = &'a u8>,
) -> (usize, usize, usize) {
    let (mut tp, mut fp, mut fn_) = (0, 0, 0);
    for (&t, &p) in truth.zip(pred) {
        match (t != 0, p != 0) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    (tp, fp, fn_)
}

/// Subset accuracy: fraction of rows predicted exactly.
pub fn accuracy_score(y_true: ArrayView2<'_, u8>, y_pred: ArrayView2<'_, u8>) -> Result<f64> {
    check_shapes(&y_true, &y_pred)?;
    if y_true.nrows() == 0 {
        return Ok(0.0);
    }
    let exact = y_true
        .rows()
        .into_iter()
        .zip(y_pred.rows())
        .filter(|(t, p)| t == p)
        .count();
    Ok(exact as f64 / y_true.nrows() as f64)
}

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Test fractions to evaluate per run (default: `[0.5]`).
    pub splits_ratio: Vec<f64>,
    /// Repetitions; run `r` splits with seed `r` (default: 2).
    pub num_run: usize,
    /// Also write the report here.
    pub write_to_file: Option<PathBuf>,
    /// Directory holding `<dataset>.data` (default: `./../data/`).
    pub data_dir: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            splits_ratio: vec![0.5],
            num_run: 2,
            write_to_file: None,
            data_dir: PathBuf::from("./../data/"),
        }
    }
}

impl EvaluationConfig {
    pub fn with_splits_ratio(mut self, ratios: Vec<f64>) -> Self {
        self.splits_ratio = ratios;
        self
    }

    pub fn with_num_run(mut self, n: usize) -> Self {
        self.num_run = n;
        self
    }

    pub fn with_write_to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.write_to_file = Some(path.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

/// Scores for one (run, split) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitScores {
    /// 1-based run number.
    pub run: usize,
    pub train_ratio: f64,
    /// F1 per averaging mode, in [`Average::ALL`] order.
    pub f1: Vec<(Average, f64)>,
    pub accuracy: f64,
}

/// Harness output.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    /// `Embedding dim: {dim}, graph: {dataset}`
    pub info: String,
    pub scores: Vec<SplitScores>,
}

impl EvaluationReport {
    /// The per-run blocks, without the info line.
    pub fn render_results(&self) -> String {
        let mut out = String::new();
        let mut last_run = 0;
        for s in &self.scores {
            if s.run != last_run {
                out.push_str(&format!("\nRun number {}:\n", s.run));
                last_run = s.run;
            }
            out.push_str(&format!("Train ratio: {}\n", s.train_ratio));
            for (avg, v) in &s.f1 {
                out.push_str(&format!("{avg}: {v}\n"));
            }
            out.push_str(&format!("Accuracy: {}\n", s.accuracy));
        }
        out
    }

    /// Info line followed by the results, as written to the report file.
    pub fn render(&self) -> String {
        format!("{}{}", self.info, self.render_results())
    }
}

/// Score an embedding on a dataset's labels with repeated top-k ranking.
///
/// For each run and test fraction the rows are split, a [`TopKRanker`] built
/// from `make_clf` is fitted on the train side, and every test row is given
/// exactly as many labels as it truly has.
pub fn run_embedding_classify_f1<C, F>(
    dataset: &str,
    emb_file: impl AsRef<Path>,
    make_clf: F,
    cfg: &EvaluationConfig,
) -> Result<EvaluationReport>
where
    C: ProbabilisticClassifier + Clone,
    F: Fn() -> C,
{
    let labels = load_dataset(dataset, &cfg.data_dir)?.labels;
    let emb = load_embeddings(emb_file)?;
    if emb.nrows() != labels.n_rows() {
        return Err(Error::ShapeMismatch(format!(
            "{} embedding rows but {} labelled nodes",
            emb.nrows(),
            labels.n_rows()
        )));
    }

    let mut scores = Vec::new();
    for run in 0..cfg.num_run {
        for &sr in &cfg.splits_ratio {
            let (train_idx, test_idx) = train_test_split(emb.nrows(), sr, run as u64)?;
            let x_train = emb.select(Axis(0), &train_idx);
            let x_test = emb.select(Axis(0), &test_idx);
            let y_train = labels.select_rows(&train_idx);
            let y_test = labels.select_rows(&test_idx);

            let top_k_list = y_test.nonzero_per_row();
            let mut ranker = TopKRanker::new(make_clf());
            ranker.fit(x_train.view(), &y_train)?;
            let predicted = ranker.predict(x_test.view(), &top_k_list, labels.n_cols())?;

            let truth = y_test.to_dense();
            let mut f1 = Vec::with_capacity(Average::ALL.len());
            for avg in Average::ALL {
                f1.push((avg, f1_score(truth.view(), predicted.view(), avg)?));
            }
            let accuracy = accuracy_score(truth.view(), predicted.view())?;
            tracing::debug!(run = run + 1, test_size = sr, accuracy, "split evaluated");

            scores.push(SplitScores {
                run: run + 1,
                train_ratio: 1.0 - sr,
                f1,
                accuracy,
            });
        }
    }

    let report = EvaluationReport {
        info: format!("Embedding dim: {}, graph: {}", emb.ncols(), dataset),
        scores,
    };
    if let Some(path) = &cfg.write_to_file {
        std::fs::write(path, report.render())?;
    }
    println!("{}", report.info);
    println!("{}", report.render_results());
    Ok(report)
}
