use serde::{Deserialize, Serialize};

use super::{Estimator, check_training_data, design_matrix, linear_predict};
use crate::dataset::Matrix;
use crate::error::FitError;

/// Consistency constant turning a MAD into a normal standard deviation.
const MAD_TO_SIGMA: f64 = 0.6745;

/// Robust linear regression with the Huber loss.
///
/// Fitted by iteratively reweighted ridge least squares: residuals within
/// `epsilon * scale` keep unit weight, larger ones are down-weighted by
/// `epsilon * scale / |r|`. The scale is re-estimated from the residual MAD
/// on every pass. `alpha` is the L2 penalty on the coefficients (never on the
/// intercept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuberRegressor {
    pub epsilon: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub alpha: f64,
    pub fit_intercept: bool,
    pub warm_start: bool,
    coef: Vec<f64>,
    intercept: f64,
    scale: f64,
    n_iter: usize,
    fitted: bool,
}

impl HuberRegressor {
    pub fn new(
        epsilon: f64,
        max_iter: usize,
        tol: f64,
        alpha: f64,
        fit_intercept: bool,
        warm_start: bool,
    ) -> Result<Self, FitError> {
        if !(epsilon >= 1.0) {
            return Err(invalid("epsilon", format!("must be >= 1.0, got {epsilon}")));
        }
        if max_iter == 0 {
            return Err(invalid("max_iter", "must be positive".into()));
        }
        if !(tol > 0.0) {
            return Err(invalid("tol", format!("must be positive, got {tol}")));
        }
        if !(alpha >= 0.0) {
            return Err(invalid("alpha", format!("must be non-negative, got {alpha}")));
        }
        Ok(Self {
            epsilon,
            max_iter,
            tol,
            alpha,
            fit_intercept,
            warm_start,
            coef: Vec::new(),
            intercept: 0.0,
            scale: 1.0,
            n_iter: 0,
            fitted: false,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn initial_solution(&self, design: &[f64], y: &[f64], ridge: &[f64], nrows: usize) -> Result<Vec<f64>, FitError> {
        let ncols = ridge.len();
        if self.warm_start && self.fitted && self.coef.len() + usize::from(self.fit_intercept) == ncols {
            let mut start = Vec::with_capacity(ncols);
            if self.fit_intercept {
                start.push(self.intercept);
            }
            start.extend_from_slice(&self.coef);
            return Ok(start);
        }
        matlib::solve_normal_equations(design, y, None, ridge, nrows, ncols).map_err(FitError::Singular)
    }
}

impl Estimator for HuberRegressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<(), FitError> {
        check_training_data(x, y)?;
        let nrows = x.nrows();
        let (design, ncols) = design_matrix(x, self.fit_intercept);
        let offset = usize::from(self.fit_intercept);
        let ridge: Vec<f64> = (0..ncols)
            .map(|j| if j < offset { 1.0e-10 } else { self.alpha.max(1.0e-10) })
            .collect();
        let scale_floor = 1.0e-12 * (1.0 + stats::std_dev(y));

        let mut beta = self.initial_solution(&design, y, &ridge, nrows)?;
        let mut weights = vec![1.0; nrows];
        let mut scale = scale_floor;
        let mut n_iter = 0;

        for _ in 0..self.max_iter {
            let resid: Vec<f64> = (0..nrows)
                .map(|i| {
                    let row = &design[i * ncols..(i + 1) * ncols];
                    y[i] - row.iter().zip(&beta).map(|(a, b)| a * b).sum::<f64>()
                })
                .collect();
            scale = (stats::median_abs_deviation(&resid) / MAD_TO_SIGMA).max(scale_floor);
            let cutoff = self.epsilon * scale;
            for (w, r) in weights.iter_mut().zip(&resid) {
                *w = if r.abs() <= cutoff { 1.0 } else { cutoff / r.abs() };
            }

            let next = matlib::solve_normal_equations(&design, y, Some(&weights), &ridge, nrows, ncols)
                .map_err(FitError::Singular)?;
            let change = next
                .iter()
                .zip(&beta)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            beta = next;
            n_iter += 1;
            if change < self.tol {
                break;
            }
        }

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(FitError::NonFinite("huber coefficients"));
        }

        self.intercept = if self.fit_intercept { beta[0] } else { 0.0 };
        self.coef = beta[offset..].to_vec();
        self.scale = scale;
        self.n_iter = n_iter;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>, FitError> {
        if !self.fitted {
            return Err(FitError::NotFitted);
        }
        linear_predict(x, &self.coef, self.intercept)
    }
}

fn invalid(name: &str, reason: String) -> FitError {
    FitError::InvalidHyperparameter {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resists_outliers() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let mut y: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] + 1.0).collect();
        y[5] += 500.0;
        y[30] -= 800.0;
        let x = Matrix::from_rows(&rows).unwrap();

        let mut huber = HuberRegressor::new(1.35, 200, 1e-8, 1e-4, true, false).unwrap();
        huber.fit(&x, &y).unwrap();
        assert!((huber.coefficients()[0] - 2.0).abs() < 0.05, "slope {}", huber.coefficients()[0]);
        assert!((huber.intercept() - 1.0).abs() < 1.0);
    }

    #[test]
    fn test_without_intercept_passes_through_origin() {
        let x = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let mut huber = HuberRegressor::new(1.35, 50, 1e-6, 1e-4, false, false).unwrap();
        huber.fit(&x, &[2.0, 4.0, 6.0]).unwrap();
        assert_eq!(huber.intercept(), 0.0);
        let pred = huber.predict(&Matrix::from_rows(&[vec![0.0]]).unwrap()).unwrap();
        assert_eq!(pred, vec![0.0]);
    }

    #[test]
    fn test_warm_start_reuses_previous_solution() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = [1.0, 3.0, 5.0, 7.0];
        let mut huber = HuberRegressor::new(1.35, 100, 1e-9, 1e-6, true, true).unwrap();
        huber.fit(&x, &y).unwrap();
        let first = huber.coefficients().to_vec();
        huber.fit(&x, &y).unwrap();
        assert!((huber.coefficients()[0] - first[0]).abs() < 1e-6);
        assert!(huber.n_iter() <= 2);
    }

    #[test]
    fn test_hyperparameters_checked() {
        assert!(HuberRegressor::new(0.5, 100, 1e-4, 1e-4, true, false).is_err());
        assert!(HuberRegressor::new(1.35, 0, 1e-4, 1e-4, true, false).is_err());
        assert!(HuberRegressor::new(1.35, 100, 0.0, 1e-4, true, false).is_err());
    }
}
