use anyhow::{Context, Result};
use price_predictor::{TrackingConfig, TrainingParams};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Run file: training parameters plus where the collaborators live.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub params: TrainingParams,
    pub warehouse: WarehouseSection,
    pub tracking: TrackingConfig,
    pub registry: RegistrySection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseSection {
    /// Indicator CSV with pair,candle_seconds,window_start_ms columns first
    pub csv: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    /// Where the evaluation report is written as JSON
    #[serde(default = "default_report_file")]
    pub report: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            report: default_report_file(),
        }
    }
}

fn default_report_file() -> PathBuf {
    PathBuf::from("evaluation_report.json")
}

impl RunConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: RunConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.tracking.experiment.is_empty() {
            config.tracking.experiment = config.params.model_name();
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, then re-validate
    pub fn apply_overrides(&mut self, trial_budget: Option<usize>, fold_count: Option<usize>, seed: Option<u64>) -> Result<()> {
        if let Some(n) = trial_budget {
            self.params.trial_budget = n;
        }
        if let Some(k) = fold_count {
            self.params.fold_count = k;
        }
        if let Some(s) = seed {
            self.params.seed = s;
        }
        self.validate()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.params.validate().context("Invalid [params] section")?;

        if self.warehouse.csv.as_os_str().is_empty() {
            anyhow::bail!("warehouse.csv must not be empty");
        }

        if self.registry.root.as_os_str().is_empty() {
            anyhow::bail!("registry.root must not be empty");
        }

        if self.tracking.uri.as_os_str().is_empty() {
            anyhow::bail!("tracking.uri must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RUN_FILE: &str = r#"
[params]
pair = "BTC/USD"
interval_seconds = 60
prediction_horizon_seconds = 300
features = ["close", "rsi_14", "ema_21"]
trial_budget = 10
fold_count = 3

[warehouse]
csv = "data/indicators.csv"

[tracking]
uri = "mlruns"
username = "analyst"

[registry]
root = "models"
"#;

    fn write(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_loads_run_file() {
        let file = write(RUN_FILE);
        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.params.trial_budget, 10);
        assert_eq!(config.tracking.experiment, "BTC_USD_60_300");
        assert_eq!(config.tracking.username.as_deref(), Some("analyst"));
        assert_eq!(config.output.report, PathBuf::from("evaluation_report.json"));
    }

    #[test]
    fn test_overrides_are_validated() {
        let file = write(RUN_FILE);
        let mut config = RunConfig::from_file(file.path()).unwrap();
        config.apply_overrides(Some(3), None, Some(7)).unwrap();
        assert_eq!((config.params.trial_budget, config.params.seed), (3, 7));
        assert!(config.apply_overrides(None, Some(0), None).is_err());
    }

    #[test]
    fn test_invalid_horizon_rejected() {
        let file = write(&RUN_FILE.replace("prediction_horizon_seconds = 300", "prediction_horizon_seconds = 90"));
        assert!(RunConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = RunConfig::from_file(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_example_run_file_is_valid() {
        let config: RunConfig = toml::from_str(include_str!("run.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.params.target_shift(), 5);
    }
}
