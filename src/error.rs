//! Error taxonomy for a training run.
//!
//! `FitError` is the only recoverable kind: the search driver scores a failed
//! trial as +infinity and keeps going. Everywhere else every variant of
//! `TrainError` aborts the run.

use std::time::Duration;

use thiserror::Error;

/// A single model fit or predict failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("cannot fit on an empty training set")]
    EmptyInput,

    #[error("shape mismatch: expected {expected} columns, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("{rows} feature rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("linear system could not be solved: {0}")]
    Singular(String),

    #[error("non-finite value encountered in {0}")]
    NonFinite(&'static str),

    #[error("invalid hyperparameter `{name}`: {reason}")]
    InvalidHyperparameter { name: String, reason: String },

    #[error("model used before it was fitted")]
    NotFitted,
}

/// Failures raised by external collaborators (warehouse, registry, sinks).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("malformed data: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Fatal errors of a training run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("data validation failed on check `{check}`: {detail}")]
    DataValidation { check: String, detail: String },

    #[error("insufficient data: need at least {required} rows, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("malformed search space: {0}")]
    SearchSpace(String),

    #[error("search exhausted: {failed} of {trials} trials failed, last error: {last_error}")]
    SearchExhausted {
        trials: usize,
        failed: usize,
        #[source]
        last_error: FitError,
    },

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("invalid run parameters: {0}")]
    InvalidParameters(String),

    #[error("run cancelled before stage {stage}")]
    Cancelled { stage: String },
}

impl TrainError {
    pub fn validation(check: impl Into<String>, detail: impl Into<String>) -> Self {
        TrainError::DataValidation {
            check: check.into(),
            detail: detail.into(),
        }
    }
}

impl From<CollaboratorError> for TrainError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Timeout { operation, after } => TrainError::Timeout { operation, after },
            CollaboratorError::Format(msg) => TrainError::validation("warehouse_format", msg),
            other => TrainError::Connection(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrainError>;
