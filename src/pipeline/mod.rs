//! The staged model-selection run.
//!
//! `Validating -> Baselining -> Screening -> Tuning -> Refitting ->
//! FinalEvaluating -> Deciding`, ending in `Promoted` or `Rejected`. The first
//! error ends the run as `Aborted` at the stage that raised it; nothing is
//! retried.

mod promotion;
mod report;
mod screening;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::{FitError, Result, TrainError};
use crate::models::{CurrentValueBaseline, FittedPipeline, ModelFamily};
use crate::search::{
    CancelToken, Fold, ObjectiveEvaluator, Proposer, SearchDriver, SearchStrategy, TimeOrderedSplitter,
};
use crate::validation::{ColumnBound, default_checks, validate};

pub use promotion::{PromotionGate, decide};
pub use report::{EvaluationReport, RunStatus};
pub use screening::{FamilySelection, FamilySelector, FixedFamily, LowestError, ScreeningEntry, ScreeningTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Baselining,
    Screening,
    Tuning,
    Refitting,
    FinalEvaluating,
    Deciding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Baselining => "baselining",
            Stage::Screening => "screening",
            Stage::Tuning => "tuning",
            Stage::Refitting => "refitting",
            Stage::FinalEvaluating => "final_evaluating",
            Stage::Deciding => "deciding",
        };
        f.write_str(name)
    }
}

/// Settings of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub features: Vec<String>,
    /// Column the persistence baseline reads
    pub baseline_column: String,
    pub split_ratio: f64,
    pub trial_budget: usize,
    pub fold_count: usize,
    pub promotion_threshold: f64,
    pub seed: u64,
    pub max_failure_ratio: f64,
    pub strategy: SearchStrategy,
    pub roster: Vec<ModelFamily>,
    pub bounds: Vec<ColumnBound>,
}

impl PipelineConfig {
    pub fn new(features: Vec<String>) -> Self {
        Self {
            features,
            baseline_column: "close".into(),
            split_ratio: 0.8,
            trial_budget: 20,
            fold_count: 5,
            promotion_threshold: 0.0,
            seed: 42,
            max_failure_ratio: 1.0,
            strategy: SearchStrategy::Tpe,
            roster: ModelFamily::ALL.to_vec(),
            bounds: vec![ColumnBound::at_least("close", 0.0)],
        }
    }
}

/// Result of a run. Only `Promoted` carries a model.
#[derive(Debug)]
pub enum RunOutcome {
    Promoted {
        model: FittedPipeline,
        report: EvaluationReport,
    },
    Rejected {
        report: EvaluationReport,
    },
    Aborted {
        stage: Stage,
        error: TrainError,
        report: EvaluationReport,
    },
}

impl RunOutcome {
    pub fn report(&self) -> &EvaluationReport {
        match self {
            RunOutcome::Promoted { report, .. }
            | RunOutcome::Rejected { report }
            | RunOutcome::Aborted { report, .. } => report,
        }
    }

    pub fn model(&self) -> Option<&FittedPipeline> {
        match self {
            RunOutcome::Promoted { model, .. } => Some(model),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TrainError> {
        match self {
            RunOutcome::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_promoted(&self) -> bool {
        matches!(self, RunOutcome::Promoted { .. })
    }
}

/// Builds the tuning proposer from the run seed.
pub type ProposerFactory = Box<dyn Fn(u64) -> Box<dyn Proposer>>;

pub struct ModelSelectionPipeline {
    config: PipelineConfig,
    selector: Box<dyn FamilySelector>,
    proposer: Option<ProposerFactory>,
    cancel: CancelToken,
}

impl ModelSelectionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            selector: FamilySelection::default().selector(),
            proposer: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn FamilySelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the proposer `config.strategy` would build.
    pub fn with_proposer<F>(mut self, factory: F) -> Self
    where
        F: Fn(u64) -> Box<dyn Proposer> + 'static,
    {
        self.proposer = Some(Box::new(factory));
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `data`, which must already carry targets.
    pub fn run(&self, data: &Dataset) -> RunOutcome {
        let mut report = EvaluationReport::default();
        let mut stage = Stage::Validating;
        match self.execute(data, &mut report, &mut stage) {
            Ok(Some(model)) => {
                report.status = RunStatus::Promoted;
                info!(final_mae = ?report.final_mae, "model promoted");
                RunOutcome::Promoted { model, report }
            }
            Ok(None) => {
                report.status = RunStatus::Rejected;
                info!(final_mae = ?report.final_mae, baseline_mae = ?report.baseline_mae, "model rejected");
                RunOutcome::Rejected { report }
            }
            Err(error) => {
                warn!(%stage, %error, "run aborted");
                report.promoted = false;
                report.status = RunStatus::Aborted {
                    stage,
                    reason: error.to_string(),
                };
                RunOutcome::Aborted { stage, error, report }
            }
        }
    }

    fn enter(&self, next: Stage, current: &mut Stage) -> Result<()> {
        *current = next;
        if self.cancel.is_cancelled() {
            return Err(TrainError::Cancelled {
                stage: next.to_string(),
            });
        }
        info!(stage = %next, "stage started");
        Ok(())
    }

    fn execute(
        &self,
        data: &Dataset,
        report: &mut EvaluationReport,
        stage: &mut Stage,
    ) -> Result<Option<FittedPipeline>> {
        let cfg = &self.config;

        self.enter(Stage::Validating, stage)?;
        let mut required = cfg.features.clone();
        if !required.contains(&cfg.baseline_column) {
            required.push(cfg.baseline_column.clone());
        }
        validate(data, &default_checks(&required, &cfg.bounds, cfg.split_ratio))?;
        let (train, test) = data.split_at_ratio(cfg.split_ratio);
        let train_x = train.select_columns(&cfg.features)?;
        let test_x = test.select_columns(&cfg.features)?;
        let y_train = train_x.require_targets()?;
        let y_test = test_x.require_targets()?;
        debug!(train_rows = train.len(), test_rows = test.len(), "split");

        self.enter(Stage::Baselining, stage)?;
        let baseline_mae = CurrentValueBaseline::new(&cfg.baseline_column).score(&test)?;
        report.baseline_mae = Some(baseline_mae);
        info!(baseline_mae, "baseline scored");

        self.enter(Stage::Screening, stage)?;
        for &family in &cfg.roster {
            let fitted = FittedPipeline::fit(
                family,
                &family.default_configuration(),
                &cfg.features,
                train_x.features(),
                y_train,
            )?;
            let mae = stats::mean_absolute_error(y_test, &fitted.predict(test_x.features())?);
            debug!(%family, mae, "family screened");
            report.screening.push(family, mae);
        }
        let family = self.selector.select(&report.screening)?;
        info!(%family, "family selected for tuning");

        self.enter(Stage::Tuning, stage)?;
        report.tuned_family = Some(family);
        let folds: Vec<Fold> = TimeOrderedSplitter::new(cfg.fold_count)?
            .split(train_x.len())?
            .collect();
        let evaluator = ObjectiveEvaluator::new(family, &train_x, folds)?;
        let proposer = match &self.proposer {
            Some(make) => make(cfg.seed),
            None => cfg.strategy.build(cfg.seed),
        };
        let mut driver = SearchDriver::new(proposer, cfg.trial_budget)
            .with_max_failure_ratio(cfg.max_failure_ratio)
            .with_cancel_token(self.cancel.clone());
        driver.enqueue(family.default_configuration());
        let outcome = driver.search(&family.search_space(), |config| evaluator.evaluate(config))?;
        report.trials = outcome.trials.len();
        report.failed_trials = outcome.failed_count();
        report.search_cancelled = outcome.cancelled;
        report.best_cv_score = Some(outcome.best_score());
        report.best_configuration = Some(outcome.best_configuration().clone());

        self.enter(Stage::Refitting, stage)?;
        let model = FittedPipeline::fit(
            family,
            outcome.best_configuration(),
            &cfg.features,
            train_x.features(),
            y_train,
        )?;

        self.enter(Stage::FinalEvaluating, stage)?;
        let final_mae = stats::mean_absolute_error(y_test, &model.predict(test_x.features())?);
        if !final_mae.is_finite() {
            return Err(FitError::NonFinite("test predictions").into());
        }
        report.final_mae = Some(final_mae);
        info!(final_mae, "test split scored");

        self.enter(Stage::Deciding, stage)?;
        let promoted = PromotionGate::new(cfg.promotion_threshold).admits(baseline_mae, final_mae);
        report.promoted = promoted;
        Ok(promoted.then_some(model))
    }
}
