use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use price_predictor::{
    Collaborators, CsvWarehouse, FsModelRegistry, FsTracker, HtmlProfiler, NullTracker, RunOutcome, TrackingSink,
    run_training,
};

#[path = "entrypoint_helper.rs"]
mod entrypoint_helper;
mod run_config;

use entrypoint_helper::{Cli, Commands};
use run_config::RunConfig;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let run = RunConfig::from_file(&config)?;
            println!("Configuration OK: {}", config.display());
            println!("  Model name: {}", run.params.model_name());
            println!("  Features: {}", run.params.features.join(", "));
            println!(
                "  Trials: {}  Folds: {}  Threshold: {}",
                run.params.trial_budget, run.params.fold_count, run.params.promotion_threshold
            );
            Ok(())
        }
        Commands::Train {
            config,
            trial_budget,
            fold_count,
            seed,
            verbose,
        } => {
            init_logging(verbose);
            let mut run = RunConfig::from_file(&config)?;
            run.apply_overrides(trial_budget, fold_count, seed)?;
            train(&run)
        }
    }
}

fn train(run: &RunConfig) -> Result<()> {
    println!("\n=== TRAINING {} ===", run.params.model_name());
    println!("Data file: {}", run.warehouse.csv.display());
    println!("Registry: {}\n", run.registry.root.display());

    let warehouse = CsvWarehouse::new(&run.warehouse.csv);
    let registry = FsModelRegistry::new(&run.registry.root);
    let profiler = HtmlProfiler::new(&format!("{} profile", run.params.model_name()));
    let tracker: Box<dyn TrackingSink> = match FsTracker::new(&run.tracking) {
        Ok(tracker) => Box::new(tracker),
        Err(error) => {
            tracing::warn!(%error, "experiment tracking unavailable, continuing without it");
            Box::new(NullTracker)
        }
    };

    let result = run_training(
        &run.params,
        &Collaborators {
            warehouse: &warehouse,
            tracker: tracker.as_ref(),
            registry: &registry,
            profiler: &profiler,
        },
    );

    let report = result.report();
    let json = report.to_json().context("Failed to serialize evaluation report")?;
    std::fs::write(&run.output.report, json)
        .with_context(|| format!("Failed to write report: {}", run.output.report.display()))?;

    println!("\nSummary:");
    if let Some(baseline) = report.baseline_mae {
        println!("  Baseline MAE: {:.6}", baseline);
    }
    if !report.screening.is_empty() {
        println!("  Screening (test MAE):");
        for line in report.screening.to_string().lines() {
            println!("    {}", line);
        }
    }
    if let (Some(family), Some(config)) = (report.tuned_family, &report.best_configuration) {
        println!("  Tuned family: {}", family);
        println!("  Best configuration: {}", config);
        println!(
            "  Trials: {} ({} failed), best CV MAE: {:.6}",
            report.trials,
            report.failed_trials,
            report.best_cv_score.unwrap_or(f64::NAN)
        );
    }
    if let Some(final_mae) = report.final_mae {
        println!("  Final test MAE: {:.6}", final_mae);
    }
    println!("  Report: {}", run.output.report.display());

    match &result.outcome {
        RunOutcome::Promoted { .. } => {
            match &result.registered {
                Some(reg) => println!("\nPROMOTED: {} v{} -> {}", reg.name, reg.version, reg.location.display()),
                None => println!("\nPROMOTED"),
            }
            Ok(())
        }
        RunOutcome::Rejected { .. } => {
            println!("\nREJECTED: final error did not clear the baseline");
            Ok(())
        }
        RunOutcome::Aborted { stage, error, .. } => {
            anyhow::bail!("Run aborted at stage {}: {}", stage, error)
        }
    }
}
