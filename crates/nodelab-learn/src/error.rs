use thiserror::Error;

/// Errors that can occur in nodelab-learn.
#[derive(Error, Debug)]
pub enum Error {
    /// Data-side error (parsing, loading, splitting).
    #[error(transparent)]
    Core(#[from] nodelab_core::Error),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Two inputs that must line up do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A label the objective cannot use.
    #[error("invalid label {0}: binary objective expects 0 or 1")]
    InvalidLabel(f64),
    /// A metric with a zero denominator.
    #[error("{0} is undefined: zero denominator")]
    UndefinedMetric(&'static str),
    /// The estimator was used before `fit`.
    #[error("estimator is not fitted")]
    NotFitted,
    /// Motif analysis requested without a backend.
    #[error("motif analysis is not available")]
    MotifUnavailable,
}

/// Result type alias for nodelab-learn.
pub type Result<T> = std::result::Result<T, Error>;
