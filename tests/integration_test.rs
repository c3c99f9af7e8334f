use std::fs;
use std::io::Write;
use std::time::Duration;

use price_predictor::collaborators::{InMemoryWarehouse, ModelRegistry, RegisteredModel};
use price_predictor::search::{Domain, RandomProposer, TpeProposer};
use price_predictor::{
    CollaboratorError, Collaborators, Configuration, CsvWarehouse, Dataset, FitError, FsModelRegistry, FsTracker, HtmlProfiler,
    ModelSelectionPipeline, NullTracker, PipelineConfig, RunOutcome, RunStatus, SearchDriver, SearchSpace, Stage,
    TimeOrderedSplitter, TrackingConfig, TrainError, TrainingParams, run_training,
};

/// `n` rows where the target is an exact linear function of `signal` and
/// `close` wanders independently.
fn linear_dataset(n: usize) -> Dataset {
    let signal = |i: usize| ((i * 37) % 101) as f64 / 10.0 - 5.0;
    let rows = (0..n)
        .map(|i| {
            let close = 250.0 + ((i * 13) % 29) as f64;
            (i as i64 * 60_000, vec![close, signal(i)])
        })
        .collect();
    let targets = (0..n).map(|i| 4.0 * signal(i) + 250.0).collect();
    Dataset::from_rows(&["close", "signal"], rows)
        .unwrap()
        .with_targets(targets)
        .unwrap()
}

fn config(trial_budget: usize, fold_count: usize) -> PipelineConfig {
    PipelineConfig {
        trial_budget,
        fold_count,
        split_ratio: 0.8,
        ..PipelineConfig::new(vec!["signal".into()])
    }
}

#[test]
fn test_learnable_dataset_is_promoted() {
    let outcome = ModelSelectionPipeline::new(config(5, 3)).run(&linear_dataset(1000));
    let report = outcome.report().clone();

    assert!(outcome.is_promoted(), "outcome: {:?}", outcome.error());
    assert!(outcome.model().is_some());
    assert_eq!(report.status, RunStatus::Promoted);
    assert_eq!(report.trials, 5);
    let (baseline, final_mae) = (report.baseline_mae.unwrap(), report.final_mae.unwrap());
    assert!(final_mae < baseline, "final {final_mae} baseline {baseline}");
}

#[test]
fn test_too_few_rows_abort_at_tuning() {
    let outcome = ModelSelectionPipeline::new(config(5, 10)).run(&linear_dataset(5));
    match outcome {
        RunOutcome::Aborted { stage, error, report } => {
            assert_eq!(stage, Stage::Tuning);
            assert!(matches!(error, TrainError::InsufficientData { required: 11, got: 4 }));
            assert!(!report.screening.is_empty());
            assert!(report.best_configuration.is_none());
            assert!(report.final_mae.is_none());
            assert!(!report.promoted);
            assert!(matches!(report.status, RunStatus::Aborted { stage: Stage::Tuning, .. }));
        }
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn test_identical_seeded_runs_agree() {
    let data = linear_dataset(400);
    let run = || {
        let outcome = ModelSelectionPipeline::new(config(14, 3)).run(&data);
        let report = outcome.report().clone();
        (report.best_configuration, report.promoted, report.best_cv_score)
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert!(first.0.is_some());
}

#[test]
fn test_splitter_never_leaks_future_rows() {
    for k in 1..8 {
        let splitter = TimeOrderedSplitter::new(k).unwrap();
        for n in 0..60 {
            match splitter.split(n) {
                Ok(folds) => {
                    assert!(n >= k + 1);
                    assert_eq!(folds.len(), k);
                    for fold in folds {
                        assert!(fold.train.end <= fold.validation.start);
                    }
                }
                Err(err) => {
                    assert!(n < k + 1);
                    assert!(matches!(err, TrainError::InsufficientData { .. }));
                }
            }
        }
    }
}

#[test]
fn test_driver_best_is_minimum_of_history() {
    let space = SearchSpace::new()
        .with("a", Domain::float(-3.0, 3.0))
        .with("b", Domain::int(0, 20));
    let objective = |c: &Configuration| -> Result<f64, FitError> {
        let a = c.f64_or("a", 0.0)?;
        let b = c.f64_or("b", 0.0)?;
        Ok((a - 0.5).abs() + (b - 7.0).abs())
    };
    for budget in [1, 5, 25] {
        let outcome = SearchDriver::new(TpeProposer::new(3), budget).search(&space, objective).unwrap();
        assert_eq!(outcome.trials.len(), budget);
        let min = outcome.trials.iter().map(|t| t.score).fold(f64::INFINITY, f64::min);
        let first_min = outcome.trials.iter().position(|t| t.score == min).unwrap();
        assert_eq!(outcome.best().number, first_min);

        let outcome = SearchDriver::new(RandomProposer::new(3), budget).search(&space, objective).unwrap();
        assert_eq!(outcome.trials.len(), budget);
    }
}

/// Indicator CSV where the next close is `close + momentum`.
fn write_indicator_csv(path: &std::path::Path, n: usize) {
    let mut file = fs::File::create(path).unwrap();
    writeln!(file, "pair,candle_seconds,window_start_ms,close,momentum").unwrap();
    let mut close = 1000.0;
    for i in 0..n {
        let momentum = ((i * 7) % 11) as f64 * 0.5 - 2.5;
        writeln!(file, "BTC/USD,60,{},{close},{momentum}", i as i64 * 60_000).unwrap();
        // unrelated pair interleaved
        writeln!(file, "ETH/USD,60,{},{},0", i as i64 * 60_000, 50.0).unwrap();
        close += momentum;
    }
}

fn params() -> TrainingParams {
    let mut params = TrainingParams::new("BTC/USD", 60, 60, &["close", "momentum"]);
    params.trial_budget = 4;
    params.fold_count = 3;
    params.profiling_rows = 50;
    params
}

#[test]
fn test_run_training_registers_promoted_model() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("indicators.csv");
    write_indicator_csv(&csv, 300);

    let warehouse = CsvWarehouse::new(&csv);
    let tracker = FsTracker::new(&TrackingConfig::new(dir.path().join("mlruns"), "BTC/USD_60_60")).unwrap();
    let registry = FsModelRegistry::new(dir.path().join("models"));
    let profiler = HtmlProfiler::new("profile");
    let params = params();

    let run = run_training(
        &params,
        &Collaborators {
            warehouse: &warehouse,
            tracker: &tracker,
            registry: &registry,
            profiler: &profiler,
        },
    );

    assert!(run.outcome.is_promoted(), "{:?}", run.outcome.error());
    let registered = run.registered.expect("promoted model is registered");
    assert_eq!(registered.name, "BTC_USD_60_60");
    assert_eq!(registered.version, 1);
    assert!(registered.location.join("model.json").exists());

    let loaded = registry.load("BTC_USD_60_60", 1).unwrap();
    assert_eq!(Some(&loaded), run.outcome.model());

    let log = fs::read_to_string(tracker.log_path()).unwrap();
    assert!(log.contains("\"final_mae\""));
    assert!(log.contains("\"screening\""));
    assert!(tracker.dir().join("artifacts").join("profile.html").exists());
    assert!(tracker.dir().join("artifacts").join("report.json").exists());
}

#[test]
fn test_rejected_run_registers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("indicators.csv");
    write_indicator_csv(&csv, 300);
    let registry = FsModelRegistry::new(dir.path().join("models"));
    let mut params = params();
    params.features = vec!["momentum".into()];
    params.promotion_threshold = 0.999;

    let run = run_training(
        &params,
        &Collaborators {
            warehouse: &CsvWarehouse::new(&csv),
            tracker: &NullTracker,
            registry: &registry,
            profiler: &HtmlProfiler::new("profile"),
        },
    );

    assert!(matches!(run.outcome, RunOutcome::Rejected { .. }), "{:?}", run.outcome.error());
    assert!(run.registered.is_none());
    assert!(registry.versions("BTC_USD_60_60").unwrap().is_empty());
}

#[test]
fn test_zero_rows_is_validation_failure() {
    let empty = Dataset::from_rows(&["close", "momentum"], Vec::new()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let run = run_training(
        &params(),
        &Collaborators {
            warehouse: &InMemoryWarehouse::new(empty),
            tracker: &NullTracker,
            registry: &FsModelRegistry::new(dir.path()),
            profiler: &HtmlProfiler::new("profile"),
        },
    );
    match run.outcome {
        RunOutcome::Aborted { stage, error, .. } => {
            assert_eq!(stage, Stage::Validating);
            assert!(matches!(error, TrainError::DataValidation { ref check, .. } if check == "non_empty"));
        }
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn test_unreachable_warehouse_aborts_before_fitting() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_training(
        &params(),
        &Collaborators {
            warehouse: &CsvWarehouse::new(dir.path().join("missing.csv")),
            tracker: &NullTracker,
            registry: &FsModelRegistry::new(dir.path()),
            profiler: &HtmlProfiler::new("profile"),
        },
    );
    assert!(matches!(run.outcome.error(), Some(TrainError::Connection(_))));
    assert!(run.report().baseline_mae.is_none());
}

#[test]
fn test_slow_warehouse_times_out() {
    let mut params = params();
    params.fetch_timeout_secs = 1;
    let data = Dataset::from_rows(&["close", "momentum"], vec![(0, vec![1.0, 0.0])]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let run = run_training(
        &params,
        &Collaborators {
            warehouse: &InMemoryWarehouse::new(data).with_delay(Duration::from_secs(3)),
            tracker: &NullTracker,
            registry: &FsModelRegistry::new(dir.path()),
            profiler: &HtmlProfiler::new("profile"),
        },
    );
    assert!(matches!(run.outcome.error(), Some(TrainError::Timeout { .. })));
}

struct StalledRegistry;

impl ModelRegistry for StalledRegistry {
    fn push(
        &self,
        _model: &price_predictor::FittedPipeline,
        _sample_input: &Dataset,
        _model_name: &str,
        timeout: Duration,
    ) -> Result<RegisteredModel, CollaboratorError> {
        Err(CollaboratorError::Timeout {
            operation: "push".into(),
            after: timeout,
        })
    }
}

#[test]
fn test_push_timeout_aborts_at_deciding() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("indicators.csv");
    write_indicator_csv(&csv, 300);

    let run = run_training(
        &params(),
        &Collaborators {
            warehouse: &CsvWarehouse::new(&csv),
            tracker: &NullTracker,
            registry: &StalledRegistry,
            profiler: &HtmlProfiler::new("profile"),
        },
    );

    assert!(run.registered.is_none());
    match run.outcome {
        RunOutcome::Aborted { stage, error, report } => {
            assert_eq!(stage, Stage::Deciding);
            assert!(matches!(error, TrainError::Timeout { ref operation, .. } if operation == "push"));
            assert!(!report.promoted);
            assert!(report.final_mae.is_some());
            assert!(matches!(report.status, RunStatus::Aborted { stage: Stage::Deciding, .. }));
        }
        other => panic!("expected abort at deciding, got {other:?}"),
    }
}
