//! Model selection and hyperparameter tuning for a short-horizon price
//! predictor.
//!
//! A run validates time-ordered indicator data, scores a persistence
//! baseline, screens a roster of regression families, tunes one family with
//! time-series cross-validation and promotes the refit model only when it
//! beats the baseline on the held-out split.

pub mod collaborators;
pub mod dataset;
pub mod error;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod preprocessing;
pub mod search;
pub mod training;
pub mod validation;

pub use collaborators::{
    CsvWarehouse, FsModelRegistry, FsTracker, HtmlProfiler, InMemoryWarehouse, ModelRegistry, NullTracker,
    RegisteredModel, ReportGenerator, TrackingConfig, TrackingSink, Warehouse, WarehouseQuery,
};
pub use dataset::{Dataset, Matrix};
pub use error::{CollaboratorError, FitError, Result, TrainError};
pub use models::{FittedPipeline, ModelFamily};
pub use params::TrainingParams;
pub use pipeline::{
    EvaluationReport, FamilySelection, FamilySelector, ModelSelectionPipeline, PipelineConfig, PromotionGate,
    RunOutcome, RunStatus, Stage,
};
pub use search::{CancelToken, Configuration, SearchDriver, SearchSpace, TimeOrderedSplitter};
pub use training::{Collaborators, TrainingRun, run_training, run_training_with_cancel};
