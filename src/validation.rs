//! Declarative data checks run before anything is fitted.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Result, TrainError};

/// Inclusive numeric bounds for one column. Missing values are not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBound {
    pub column: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ColumnBound {
    pub fn at_least(column: &str, min: f64) -> Self {
        Self {
            column: column.to_string(),
            min: Some(min),
            max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationCheck {
    NonEmpty,
    SortedTimestamps,
    ColumnsPresent(Vec<String>),
    ColumnBounds(ColumnBound),
    FiniteTargets,
    SplitFeasible { ratio: f64 },
}

impl ValidationCheck {
    pub fn name(&self) -> String {
        match self {
            ValidationCheck::NonEmpty => "non_empty".to_string(),
            ValidationCheck::SortedTimestamps => "sorted_timestamps".to_string(),
            ValidationCheck::ColumnsPresent(_) => "columns_present".to_string(),
            ValidationCheck::ColumnBounds(b) => format!("{}_bounds", b.column),
            ValidationCheck::FiniteTargets => "finite_targets".to_string(),
            ValidationCheck::SplitFeasible { .. } => "split_feasible".to_string(),
        }
    }

    pub fn run(&self, data: &Dataset) -> Result<()> {
        let fail = |detail: String| Err(TrainError::validation(self.name(), detail));
        match self {
            ValidationCheck::NonEmpty => {
                if data.is_empty() {
                    return fail("dataset has zero rows".to_string());
                }
            }
            ValidationCheck::SortedTimestamps => {
                if let Some(i) = data.timestamps().windows(2).position(|w| w[1] <= w[0]) {
                    return fail(format!(
                        "timestamp {} at row {} does not increase past {}",
                        data.timestamps()[i + 1],
                        i + 1,
                        data.timestamps()[i]
                    ));
                }
            }
            ValidationCheck::ColumnsPresent(names) => {
                if let Some(missing) = names.iter().find(|n| data.column_index(n).is_none()) {
                    return fail(format!("column `{missing}` is missing"));
                }
            }
            ValidationCheck::ColumnBounds(bound) => {
                let Some(values) = data.column(&bound.column) else {
                    return fail(format!("column `{}` is missing", bound.column));
                };
                for (row, &v) in values.iter().enumerate() {
                    if v.is_nan() {
                        continue;
                    }
                    if let Some(min) = bound.min
                        && v < min
                    {
                        return fail(format!("value {v} at row {row} is below {min}"));
                    }
                    if let Some(max) = bound.max
                        && v > max
                    {
                        return fail(format!("value {v} at row {row} is above {max}"));
                    }
                }
            }
            ValidationCheck::FiniteTargets => {
                let targets = data.require_targets()?;
                if let Some(row) = targets.iter().position(|t| !t.is_finite()) {
                    return fail(format!("target at row {row} is not finite"));
                }
            }
            ValidationCheck::SplitFeasible { ratio } => {
                let train = data.train_len(*ratio);
                if train == 0 || train == data.len() {
                    return fail(format!(
                        "ratio {ratio} over {} rows leaves an empty train or test split",
                        data.len()
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The default battery for a run over `features`.
pub fn default_checks(features: &[String], bounds: &[ColumnBound], split_ratio: f64) -> Vec<ValidationCheck> {
    let mut checks = vec![
        ValidationCheck::NonEmpty,
        ValidationCheck::SortedTimestamps,
        ValidationCheck::ColumnsPresent(features.to_vec()),
    ];
    checks.extend(bounds.iter().cloned().map(ValidationCheck::ColumnBounds));
    checks.push(ValidationCheck::FiniteTargets);
    checks.push(ValidationCheck::SplitFeasible { ratio: split_ratio });
    checks
}

/// Run checks in order and stop at the first failure.
pub fn validate(data: &Dataset, checks: &[ValidationCheck]) -> Result<()> {
    for check in checks {
        check.run(data)?;
        tracing::debug!(check = %check.name(), "validation check passed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(closes: &[f64], stamps: &[i64]) -> Dataset {
        let rows = stamps.iter().zip(closes).map(|(&t, &c)| (t, vec![c])).collect();
        let ds = Dataset::from_rows(&["close"], rows).unwrap();
        let targets = ds.column("close").unwrap();
        ds.with_targets(targets).unwrap()
    }

    #[test]
    fn test_negative_close_fails_named_check() {
        let ds = data(&[1.0, -2.0, 3.0], &[1, 2, 3]);
        let err = validate(&ds, &[ValidationCheck::ColumnBounds(ColumnBound::at_least("close", 0.0))])
            .unwrap_err();
        assert!(matches!(err, TrainError::DataValidation { ref check, .. } if check == "close_bounds"));
    }

    #[test]
    fn test_duplicate_timestamp_fails() {
        let ds = data(&[1.0, 2.0, 3.0], &[1, 2, 2]);
        let err = validate(&ds, &[ValidationCheck::SortedTimestamps]).unwrap_err();
        assert!(matches!(err, TrainError::DataValidation { ref check, .. } if check == "sorted_timestamps"));
    }

    #[test]
    fn test_empty_dataset_is_validation_failure() {
        let ds = Dataset::from_rows(&["close"], Vec::new()).unwrap();
        let err = validate(&ds, &[ValidationCheck::NonEmpty]).unwrap_err();
        assert!(matches!(err, TrainError::DataValidation { .. }));
    }

    #[test]
    fn test_split_needs_both_sides() {
        let ds = data(&[1.0, 2.0], &[1, 2]);
        assert!(ValidationCheck::SplitFeasible { ratio: 0.5 }.run(&ds).is_ok());
        // floor(1.98) = 1 leaves one row on each side
        assert!(ValidationCheck::SplitFeasible { ratio: 0.99 }.run(&ds).is_ok());
        // floor(0.8) = 0 training rows
        assert!(ValidationCheck::SplitFeasible { ratio: 0.4 }.run(&ds).is_err());
        // every row trains, none left to test
        assert!(ValidationCheck::SplitFeasible { ratio: 1.0 }.run(&ds).is_err());
        let single = data(&[1.0], &[1]);
        assert!(ValidationCheck::SplitFeasible { ratio: 0.5 }.run(&single).is_err());
    }

    #[test]
    fn test_default_battery_passes_clean_data() {
        let ds = data(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1, 2, 3, 4, 5]);
        let checks = default_checks(&["close".to_string()], &[ColumnBound::at_least("close", 0.0)], 0.8);
        assert!(validate(&ds, &checks).is_ok());
    }
}
