use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::models::ModelFamily;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningEntry {
    pub family: ModelFamily,
    pub mae: f64,
}

/// Test-split errors of every screened family, ascending by error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreeningTable {
    entries: Vec<ScreeningEntry>,
}

impl ScreeningTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping ascending order; equal errors keep insertion order.
    pub fn push(&mut self, family: ModelFamily, mae: f64) {
        let pos = self.entries.partition_point(|e| e.mae.total_cmp(&mae).is_le());
        self.entries.insert(pos, ScreeningEntry { family, mae });
    }

    pub fn entries(&self) -> &[ScreeningEntry] {
        &self.entries
    }

    pub fn get(&self, family: ModelFamily) -> Option<f64> {
        self.entries.iter().find(|e| e.family == family).map(|e| e.mae)
    }

    pub fn best(&self) -> Option<&ScreeningEntry> {
        self.entries.first()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ScreeningTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, entry) in self.entries.iter().enumerate() {
            writeln!(f, "{:>3}  {:<12} {:>14.6}", rank + 1, entry.family.name(), entry.mae)?;
        }
        Ok(())
    }
}

/// Chooses which family to tune once screening has run.
pub trait FamilySelector {
    fn select(&self, table: &ScreeningTable) -> Result<ModelFamily>;
}

/// Always tunes the same family, whatever screening reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFamily(pub ModelFamily);

impl FamilySelector for FixedFamily {
    fn select(&self, _table: &ScreeningTable) -> Result<ModelFamily> {
        Ok(self.0)
    }
}

/// Tunes the family with the lowest screening error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowestError;

impl FamilySelector for LowestError {
    fn select(&self, table: &ScreeningTable) -> Result<ModelFamily> {
        table
            .best()
            .map(|e| e.family)
            .ok_or_else(|| TrainError::InvalidParameters("screening table is empty".into()))
    }
}

/// Serializable choice of [`FamilySelector`] for run parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "family", rename_all = "snake_case")]
pub enum FamilySelection {
    Fixed(ModelFamily),
    LowestError,
}

impl Default for FamilySelection {
    fn default() -> Self {
        FamilySelection::Fixed(ModelFamily::Huber)
    }
}

impl FamilySelection {
    pub fn selector(self) -> Box<dyn FamilySelector> {
        match self {
            FamilySelection::Fixed(family) => Box::new(FixedFamily(family)),
            FamilySelection::LowestError => Box::new(LowestError),
        }
    }
}
