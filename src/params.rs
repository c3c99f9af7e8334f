use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::models::ModelFamily;
use crate::pipeline::{FamilySelection, PipelineConfig};
use crate::search::SearchStrategy;
use crate::validation::ColumnBound;

/// Parameters of one training run (one pair, one interval, one horizon).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Trading pair identifier, e.g. `BTC/USD`
    pub pair: String,

    /// Candle interval in seconds
    pub interval_seconds: u64,

    /// How far ahead the target looks; a positive multiple of the interval
    pub prediction_horizon_seconds: u64,

    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    #[serde(default = "default_split_ratio")]
    pub train_test_split_ratio: f64,

    /// Rows handed to the profiler; 0 profiles everything
    #[serde(default = "default_profiling_rows")]
    pub profiling_rows: usize,

    pub features: Vec<String>,

    #[serde(default = "default_trial_budget")]
    pub trial_budget: usize,

    #[serde(default = "default_fold_count")]
    pub fold_count: usize,

    /// Required relative improvement over the baseline
    #[serde(default)]
    pub promotion_threshold: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub family_selection: FamilySelection,

    #[serde(default)]
    pub search_strategy: SearchStrategy,

    /// Failed-trial fraction at which tuning gives up
    #[serde(default = "default_max_failure_ratio")]
    pub max_failure_ratio: f64,

    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub push_timeout_secs: u64,

    /// Column whose future value is predicted; also what the baseline reads
    #[serde(default = "default_target_column")]
    pub target_column: String,

    #[serde(default = "default_bounds")]
    pub bounds: Vec<ColumnBound>,
}

fn default_lookback_days() -> u32 {
    30
}

fn default_split_ratio() -> f64 {
    0.8
}

fn default_profiling_rows() -> usize {
    1000
}

fn default_trial_budget() -> usize {
    20
}

fn default_fold_count() -> usize {
    5
}

fn default_seed() -> u64 {
    42
}

fn default_max_failure_ratio() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_target_column() -> String {
    "close".to_string()
}

fn default_bounds() -> Vec<ColumnBound> {
    vec![ColumnBound::at_least("close", 0.0)]
}

impl TrainingParams {
    /// Parameters with every optional field at its default.
    pub fn new(pair: &str, interval_seconds: u64, prediction_horizon_seconds: u64, features: &[&str]) -> Self {
        Self {
            pair: pair.to_string(),
            interval_seconds,
            prediction_horizon_seconds,
            lookback_days: default_lookback_days(),
            train_test_split_ratio: default_split_ratio(),
            profiling_rows: default_profiling_rows(),
            features: features.iter().map(|f| f.to_string()).collect(),
            trial_budget: default_trial_budget(),
            fold_count: default_fold_count(),
            promotion_threshold: 0.0,
            seed: default_seed(),
            family_selection: FamilySelection::default(),
            search_strategy: SearchStrategy::default(),
            max_failure_ratio: default_max_failure_ratio(),
            fetch_timeout_secs: default_timeout_secs(),
            push_timeout_secs: default_timeout_secs(),
            target_column: default_target_column(),
            bounds: default_bounds(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bail = |msg: String| Err(TrainError::InvalidParameters(msg));
        if self.pair.trim().is_empty() {
            return bail("pair must not be empty".into());
        }
        if self.interval_seconds == 0 {
            return bail("interval_seconds must be greater than 0".into());
        }
        if self.prediction_horizon_seconds == 0 || self.prediction_horizon_seconds % self.interval_seconds != 0 {
            return bail(format!(
                "prediction_horizon_seconds must be a positive multiple of {}, got {}",
                self.interval_seconds, self.prediction_horizon_seconds
            ));
        }
        if self.lookback_days == 0 {
            return bail("lookback_days must be greater than 0".into());
        }
        if !(self.train_test_split_ratio > 0.0 && self.train_test_split_ratio < 1.0) {
            return bail(format!(
                "train_test_split_ratio must be in range (0, 1), got {}",
                self.train_test_split_ratio
            ));
        }
        if self.features.is_empty() {
            return bail("features must list at least one column".into());
        }
        if self.trial_budget == 0 {
            return bail("trial_budget must be greater than 0".into());
        }
        if self.fold_count == 0 {
            return bail("fold_count must be greater than 0".into());
        }
        if !(self.promotion_threshold >= 0.0 && self.promotion_threshold < 1.0) {
            return bail(format!(
                "promotion_threshold must be in range [0, 1), got {}",
                self.promotion_threshold
            ));
        }
        if !(self.max_failure_ratio > 0.0 && self.max_failure_ratio <= 1.0) {
            return bail(format!(
                "max_failure_ratio must be in range (0, 1], got {}",
                self.max_failure_ratio
            ));
        }
        if self.fetch_timeout_secs == 0 || self.push_timeout_secs == 0 {
            return bail("timeouts must be greater than 0".into());
        }
        Ok(())
    }

    /// Rows between an observation and its target.
    pub fn target_shift(&self) -> usize {
        (self.prediction_horizon_seconds / self.interval_seconds) as usize
    }

    /// `{pair}_{interval}_{horizon}` with path separators replaced.
    pub fn model_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.pair.replace('/', "_"),
            self.interval_seconds,
            self.prediction_horizon_seconds
        )
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            features: self.features.clone(),
            baseline_column: self.target_column.clone(),
            split_ratio: self.train_test_split_ratio,
            trial_budget: self.trial_budget,
            fold_count: self.fold_count,
            promotion_threshold: self.promotion_threshold,
            seed: self.seed,
            max_failure_ratio: self.max_failure_ratio,
            strategy: self.search_strategy,
            roster: ModelFamily::ALL.to_vec(),
            bounds: self.bounds.clone(),
        }
    }

    /// Flat key/value view for experiment tracking.
    pub fn as_tracking_params(&self) -> Vec<(String, String)> {
        vec![
            ("pair".into(), self.pair.clone()),
            ("interval_seconds".into(), self.interval_seconds.to_string()),
            ("prediction_horizon_seconds".into(), self.prediction_horizon_seconds.to_string()),
            ("lookback_days".into(), self.lookback_days.to_string()),
            ("train_test_split_ratio".into(), self.train_test_split_ratio.to_string()),
            ("features".into(), self.features.join(",")),
            ("trial_budget".into(), self.trial_budget.to_string()),
            ("fold_count".into(), self.fold_count.to_string()),
            ("promotion_threshold".into(), self.promotion_threshold.to_string()),
            ("seed".into(), self.seed.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TrainingParams {
        TrainingParams::new("BTC/USD", 60, 300, &["close", "rsi_14"])
    }

    #[test]
    fn test_defaults_validate() {
        assert!(params().validate().is_ok());
        assert_eq!(params().target_shift(), 5);
        assert_eq!(params().model_name(), "BTC_USD_60_300");
    }

    #[test]
    fn test_params_validation() {
        let mut p = params();
        p.prediction_horizon_seconds = 90;
        assert!(p.validate().is_err());

        let mut p = params();
        p.train_test_split_ratio = 1.0;
        assert!(p.validate().is_err());

        let mut p = params();
        p.trial_budget = 0;
        assert!(p.validate().is_err());

        let mut p = params();
        p.promotion_threshold = -0.1;
        assert!(matches!(p.validate(), Err(TrainError::InvalidParameters(_))));

        let mut p = params();
        p.features.clear();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_toml_defaults() {
        let p: TrainingParams = toml::from_str(
            r#"
            pair = "ETH/USD"
            interval_seconds = 60
            prediction_horizon_seconds = 60
            features = ["close"]
            family_selection = { policy = "lowest_error" }
            "#,
        )
        .unwrap();
        assert_eq!(p.fold_count, 5);
        assert_eq!(p.profiling_rows, 1000);
        assert_eq!(p.family_selection, FamilySelection::LowestError);
        assert_eq!(p.search_strategy, SearchStrategy::Tpe);
        assert_eq!(p.bounds, vec![ColumnBound::at_least("close", 0.0)]);
    }
}
