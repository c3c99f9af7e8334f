//! Batch entry point: fetch, profile, run the pipeline, track, register.

use tracing::{info, warn};

use crate::collaborators::{ModelRegistry, RegisteredModel, ReportGenerator, TrackingSink, Warehouse, WarehouseQuery};
use crate::error::{CollaboratorError, TrainError};
use crate::params::TrainingParams;
use crate::pipeline::{EvaluationReport, ModelSelectionPipeline, RunOutcome, RunStatus, Stage};
use crate::search::CancelToken;

/// Rows of input stored alongside a registered model.
const SIGNATURE_ROWS: usize = 5;

/// External services a run talks to.
pub struct Collaborators<'a> {
    pub warehouse: &'a dyn Warehouse,
    pub tracker: &'a dyn TrackingSink,
    pub registry: &'a dyn ModelRegistry,
    pub profiler: &'a dyn ReportGenerator,
}

#[derive(Debug)]
pub struct TrainingRun {
    pub outcome: RunOutcome,
    pub registered: Option<RegisteredModel>,
}

impl TrainingRun {
    pub fn report(&self) -> &EvaluationReport {
        self.outcome.report()
    }
}

pub fn run_training(params: &TrainingParams, collaborators: &Collaborators<'_>) -> TrainingRun {
    run_training_with_cancel(params, collaborators, CancelToken::new())
}

pub fn run_training_with_cancel(
    params: &TrainingParams,
    collaborators: &Collaborators<'_>,
    cancel: CancelToken,
) -> TrainingRun {
    let unregistered = |outcome| TrainingRun {
        outcome,
        registered: None,
    };
    if let Err(error) = params.validate() {
        return unregistered(abort(Stage::Validating, error, EvaluationReport::default()));
    }
    info!(pair = %params.pair, interval = params.interval_seconds, horizon = params.prediction_horizon_seconds, "training run started");

    let query = WarehouseQuery {
        pair: params.pair.clone(),
        interval_seconds: params.interval_seconds,
        lookback_days: params.lookback_days,
    };
    let raw = match collaborators.warehouse.fetch(&query, params.fetch_timeout()) {
        Ok(raw) => raw,
        Err(error) => return unregistered(abort(Stage::Validating, error.into(), EvaluationReport::default())),
    };

    let sample = match params.profiling_rows {
        0 => raw.clone(),
        n => raw.head(n),
    };
    match collaborators.profiler.profile(&sample) {
        Ok(html) => track("profile", collaborators.tracker.log_artifact("profile.html", &html)),
        Err(error) => warn!(%error, "profiling failed"),
    }

    let data = match raw.with_target(&params.target_column, params.target_shift()) {
        Ok(data) => data.drop_missing_targets(),
        Err(error) => return unregistered(abort(Stage::Validating, error, EvaluationReport::default())),
    };
    track("params", collaborators.tracker.log_params(&params.as_tracking_params()));

    let pipeline = ModelSelectionPipeline::new(params.pipeline_config())
        .with_selector(params.family_selection.selector())
        .with_cancel_token(cancel);
    let outcome = pipeline.run(&data);
    log_report(collaborators.tracker, outcome.report());

    match outcome {
        RunOutcome::Promoted { model, report } => {
            let name = params.model_name();
            match collaborators
                .registry
                .push(&model, &data.head(SIGNATURE_ROWS), &name, params.push_timeout())
            {
                Ok(registered) => TrainingRun {
                    outcome: RunOutcome::Promoted { model, report },
                    registered: Some(registered),
                },
                Err(error) => unregistered(abort(Stage::Deciding, error.into(), report)),
            }
        }
        other => unregistered(other),
    }
}

fn abort(stage: Stage, error: TrainError, mut report: EvaluationReport) -> RunOutcome {
    warn!(%stage, %error, "run aborted");
    report.promoted = false;
    report.status = RunStatus::Aborted {
        stage,
        reason: error.to_string(),
    };
    RunOutcome::Aborted { stage, error, report }
}

fn log_report(tracker: &dyn TrackingSink, report: &EvaluationReport) {
    track("metrics", tracker.log_metrics(&report.metrics()));
    match serde_json::to_value(&report.screening) {
        Ok(table) => track("screening", tracker.log_table("screening", &table)),
        Err(error) => warn!(%error, "screening table not serializable"),
    }
    match report.to_json() {
        Ok(json) => track("report", tracker.log_artifact("report.json", json.as_bytes())),
        Err(error) => warn!(%error, "report not serializable"),
    }
}

/// Tracking is best effort; failures are logged and dropped.
fn track(what: &str, result: Result<(), CollaboratorError>) {
    if let Err(error) = result {
        warn!(what, %error, "tracking call failed");
    }
}
