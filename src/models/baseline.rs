use crate::dataset::Dataset;
use crate::error::{FitError, Result, TrainError};

/// Persistence forecast: the next value is the current value of `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentValueBaseline {
    source: String,
}

impl CurrentValueBaseline {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn predict(&self, data: &Dataset) -> Result<Vec<f64>> {
        let values = data.column(&self.source).ok_or_else(|| {
            TrainError::validation("baseline_source", format!("column `{}` not found", self.source))
        })?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite("baseline input").into());
        }
        Ok(values)
    }

    /// Mean absolute error of the persistence forecast against the targets.
    pub fn score(&self, data: &Dataset) -> Result<f64> {
        let predictions = self.predict(data)?;
        let targets = data.require_targets()?;
        Ok(stats::mean_absolute_error(targets, &predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_one_step_persistence() {
        let data = Dataset::from_rows(&["close"], vec![(0, vec![1.0]), (1, vec![2.0]), (2, vec![4.0])])
            .unwrap()
            .with_target("close", 1)
            .unwrap();
        // predictions [1, 2] against targets [2, 4]
        let mae = CurrentValueBaseline::new("close").score(&data).unwrap();
        assert!((mae - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_source_column_is_validation_error() {
        let data = Dataset::from_rows(&["open"], vec![(0, vec![1.0])]).unwrap();
        let err = CurrentValueBaseline::new("close").predict(&data).unwrap_err();
        assert!(matches!(err, TrainError::DataValidation { ref check, .. } if check == "baseline_source"));
    }

    #[test]
    fn test_missing_value_is_fit_error() {
        let data = Dataset::from_rows(&["close"], vec![(0, vec![f64::NAN])]).unwrap();
        let err = CurrentValueBaseline::new("close").predict(&data).unwrap_err();
        assert!(matches!(err, TrainError::Fit(FitError::NonFinite(_))));
    }
}
