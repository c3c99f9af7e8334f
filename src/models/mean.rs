use serde::{Deserialize, Serialize};

use super::{Estimator, check_training_data};
use crate::dataset::Matrix;
use crate::error::FitError;

/// Predicts the training-target mean for every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanRegressor {
    mean: Option<f64>,
}

impl Estimator for MeanRegressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<(), FitError> {
        check_training_data(x, y)?;
        self.mean = Some(stats::mean(y));
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>, FitError> {
        let mean = self.mean.ok_or(FitError::NotFitted)?;
        Ok(vec![mean; x.nrows()])
    }
}
