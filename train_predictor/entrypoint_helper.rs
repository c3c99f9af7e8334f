use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Model selection and tuning for a short-horizon price predictor
#[derive(Parser, Debug)]
#[command(name = "train_predictor")]
#[command(about = "Validate, screen, tune and promote a price predictor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one training job described by a TOML run file
    Train {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Override the tuning trial budget
        #[arg(short = 'n', long)]
        trial_budget: Option<usize>,

        /// Override the cross-validation fold count
        #[arg(short = 'k', long)]
        fold_count: Option<usize>,

        /// Override the search seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse and validate a run file without training
    Check {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,
    },
}
