use serde::{Deserialize, Serialize};

use super::{ScreeningTable, Stage};
use crate::models::ModelFamily;
use crate::search::Configuration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Promoted,
    Rejected,
    Aborted { stage: Stage, reason: String },
}

/// Everything a run measured, filled in stage by stage.
///
/// An aborted run keeps whatever was measured before the failing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub baseline_mae: Option<f64>,
    pub screening: ScreeningTable,
    pub tuned_family: Option<ModelFamily>,
    pub best_configuration: Option<Configuration>,
    pub best_cv_score: Option<f64>,
    pub trials: usize,
    pub failed_trials: usize,
    pub search_cancelled: bool,
    pub final_mae: Option<f64>,
    pub promoted: bool,
    pub status: RunStatus,
}

impl Default for EvaluationReport {
    fn default() -> Self {
        Self {
            baseline_mae: None,
            screening: ScreeningTable::new(),
            tuned_family: None,
            best_configuration: None,
            best_cv_score: None,
            trials: 0,
            failed_trials: 0,
            search_cancelled: false,
            final_mae: None,
            promoted: false,
            status: RunStatus::Running,
        }
    }
}

impl EvaluationReport {
    /// Scalar metrics for an experiment tracker.
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        let mut out = Vec::new();
        if let Some(v) = self.baseline_mae {
            out.push(("baseline_mae", v));
        }
        if let Some(v) = self.best_cv_score {
            out.push(("best_cv_mae", v));
        }
        if let Some(v) = self.final_mae {
            out.push(("final_mae", v));
        }
        out.push(("trials", self.trials as f64));
        out.push(("failed_trials", self.failed_trials as f64));
        out.push(("promoted", if self.promoted { 1.0 } else { 0.0 }));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
