use serde::{Deserialize, Serialize};

use super::{Estimator, check_training_data, design_matrix};
use crate::dataset::Matrix;
use crate::error::FitError;

/// Keeps the normal equations solvable when a standardized column is constant.
const RIDGE_FLOOR: f64 = 1.0e-10;

/// Least squares with an optional L2 penalty (ridge when `alpha > 0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub alpha: f64,
    pub fit_intercept: bool,
    coef: Vec<f64>,
    intercept: f64,
    fitted: bool,
}

impl LinearRegressor {
    pub fn new(alpha: f64, fit_intercept: bool) -> Result<Self, FitError> {
        if !(alpha >= 0.0) {
            return Err(FitError::InvalidHyperparameter {
                name: "alpha".into(),
                reason: format!("must be non-negative, got {alpha}"),
            });
        }
        Ok(Self {
            alpha,
            fit_intercept,
            coef: Vec::new(),
            intercept: 0.0,
            fitted: false,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Estimator for LinearRegressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<(), FitError> {
        check_training_data(x, y)?;
        let (design, ncols) = design_matrix(x, self.fit_intercept);
        let offset = usize::from(self.fit_intercept);
        let ridge: Vec<f64> = (0..ncols)
            .map(|j| if j < offset { RIDGE_FLOOR } else { self.alpha.max(RIDGE_FLOOR) })
            .collect();

        let solution = matlib::solve_normal_equations(&design, y, None, &ridge, x.nrows(), ncols)
            .map_err(FitError::Singular)?;
        if solution.iter().any(|b| !b.is_finite()) {
            return Err(FitError::NonFinite("linear coefficients"));
        }

        self.intercept = if self.fit_intercept { solution[0] } else { 0.0 };
        self.coef = solution[offset..].to_vec();
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>, FitError> {
        if !self.fitted {
            return Err(FitError::NotFitted);
        }
        super::linear_predict(x, &self.coef, self.intercept)
    }
}
