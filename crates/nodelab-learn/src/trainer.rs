//! The classifier-training stage: fit on `<prefix>_train`, early-stop on
//! `<prefix>_val`, score `<prefix>_test`.

use crate::boosting::{train_booster, BoostDataset, BoostingParams, GbdtModel};
use crate::metrics::{append_metrics_log, mean_squared_error, BinaryMetrics, ConfusionMatrix};
use crate::Result;
use nodelab_core::sparse::{read_sparse_file, SparseRecord};
use nodelab_core::split::Partition;
use std::path::{Path, PathBuf};

/// Trainer configuration.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub params: BoostingParams,
    /// Decision threshold on predicted probability (default: 0.5).
    pub threshold: f64,
    /// Append-only metrics log (default: `logging.file`).
    pub log_path: PathBuf,
    /// Where to export the fitted model as JSON, if anywhere.
    pub model_out: Option<PathBuf>,
    /// Widest feature matrix the stage will densify (default: 2^20 columns).
    pub max_features: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            params: BoostingParams::default(),
            threshold: 0.5,
            log_path: PathBuf::from("logging.file"),
            model_out: None,
            max_features: 1 << 20,
        }
    }
}

impl TrainerConfig {
    pub fn with_params(mut self, params: BoostingParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn with_model_out(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_out = Some(path.into());
        self
    }

    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = n;
        self
    }
}

/// Everything one training run produced.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub test_path: PathBuf,
    /// Predicted probabilities, index-aligned with the test file.
    pub predictions: Vec<f64>,
    pub confusion: ConfusionMatrix,
    pub mse: f64,
    pub metrics: BinaryMetrics,
    pub model: GbdtModel,
}

fn width(parts: &[&[SparseRecord]]) -> usize {
    parts
        .iter()
        .flat_map(|records| records.iter())
        .map(SparseRecord::width)
        .max()
        .unwrap_or(0)
}

/// Run the whole stage for a feature-file prefix.
///
/// Prints the test path, the predictions, the confusion matrix, the MSE and
/// the metrics line, then appends `acc precision recall f1 mse` to the log.
pub fn run_training(prefix: impl AsRef<Path>, cfg: &TrainerConfig) -> Result<TrainingReport> {
    let prefix = prefix.as_ref();
    let train_path = Partition::Train.path(prefix);
    let val_path = Partition::Val.path(prefix);
    let test_path = Partition::Test.path(prefix);

    let train_records = read_sparse_file(&train_path)?;
    let val_records = read_sparse_file(&val_path)?;
    let test_records = read_sparse_file(&test_path)?;
    let width = width(&[&train_records, &val_records, &test_records]);
    if width > cfg.max_features {
        return Err(nodelab_core::Error::DimensionMismatch {
            expected: cfg.max_features,
            got: width,
        }
        .into());
    }
    tracing::info!(
        train = train_records.len(),
        val = val_records.len(),
        test = test_records.len(),
        width,
        "loaded feature files"
    );

    let train = BoostDataset::from_records(&train_records, width)?;
    let val = BoostDataset::from_records(&val_records, width)?;
    let model = train_booster(&cfg.params, &train, Some(&val))?;
    if let Some(out) = &cfg.model_out {
        model.save_json(out)?;
    }

    // Labels come straight off the test lines, in file order.
    let labels: Vec<f64> = test_records.iter().map(|r| r.label).collect();
    let test = BoostDataset::from_records(&test_records, width)?;

    println!("{}", test_path.display());
    let predictions = model.predict_proba(test.features());
    println!("{predictions:?}");

    let confusion = ConfusionMatrix::from_predictions(&labels, &predictions, cfg.threshold)?;
    println!("{:?}", confusion.as_matrix());
    let mse = mean_squared_error(&labels, &predictions)?;
    println!("{mse}");

    let metrics = BinaryMetrics::from_confusion(&confusion)?;
    println!("Accuracy, precision, recall, F1: {}\n", metrics.summary());
    append_metrics_log(&cfg.log_path, &metrics, mse)?;

    Ok(TrainingReport {
        test_path,
        predictions,
        confusion,
        mse,
        metrics,
        model,
    })
}
