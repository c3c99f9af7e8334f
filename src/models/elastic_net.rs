use serde::{Deserialize, Serialize};

use super::{Estimator, check_training_data};
use crate::dataset::Matrix;
use crate::error::FitError;

/// Elastic net regression trained by coordinate descent.
///
/// X and y are standardized internally; `lambda` is the penalty strength and
/// `l1_ratio` mixes the L1 (1.0) and L2 (0.0) parts of the penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticNet {
    pub lambda: f64,
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub beta: Vec<f64>,
    pub explained: f64,
    pub xmeans: Vec<f64>,
    pub xscales: Vec<f64>,
    pub ymean: f64,
    pub yscale: f64,
    fitted: bool,
}

impl ElasticNet {
    pub fn new(lambda: f64, l1_ratio: f64, max_iter: usize, tol: f64) -> Result<Self, FitError> {
        if !(lambda >= 0.0) {
            return Err(invalid("lambda", format!("must be non-negative, got {lambda}")));
        }
        if !(0.0..=1.0).contains(&l1_ratio) {
            return Err(invalid("l1_ratio", format!("must lie in [0, 1], got {l1_ratio}")));
        }
        if max_iter == 0 {
            return Err(invalid("max_iter", "must be positive".into()));
        }
        Ok(Self {
            lambda,
            l1_ratio,
            max_iter,
            tol,
            beta: Vec::new(),
            explained: 0.0,
            xmeans: Vec::new(),
            xscales: Vec::new(),
            ymean: 0.0,
            yscale: 1.0,
            fitted: false,
        })
    }

    /// Standardize the training data and return (x, y) in standardized units.
    fn standardize(&mut self, x: &Matrix, y: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let nvars = x.ncols();
        let ncases = x.nrows();
        self.xmeans = vec![0.0; nvars];
        self.xscales = vec![0.0; nvars];
        let mut xs = vec![0.0; ncases * nvars];

        for ivar in 0..nvars {
            let column = x.column(ivar);
            let xm = stats::mean(&column);
            let mut ss = 1.0e-60;
            for &v in &column {
                ss += (v - xm) * (v - xm);
            }
            let scale = (ss / ncases as f64).sqrt();
            self.xmeans[ivar] = xm;
            self.xscales[ivar] = scale;
            for (icase, &v) in column.iter().enumerate() {
                xs[icase * nvars + ivar] = (v - xm) / scale;
            }
        }

        self.ymean = stats::mean(y);
        let mut ss = 1.0e-60;
        for &v in y {
            ss += (v - self.ymean) * (v - self.ymean);
        }
        self.yscale = (ss / ncases as f64).sqrt();
        let ys = y.iter().map(|&v| (v - self.ymean) / self.yscale).collect();

        (xs, ys)
    }
}

impl Estimator for ElasticNet {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<(), FitError> {
        check_training_data(x, y)?;
        let nvars = x.ncols();
        let ncases = x.nrows();
        let (xs, ys) = self.standardize(x, y);

        let s_threshold = self.l1_ratio * self.lambda;
        let update_factor = 1.0 + self.lambda * (1.0 - self.l1_ratio);
        let mut beta = vec![0.0; nvars];
        let mut resid = ys.clone();
        let mut do_active_only = false;

        for _iter in 0..self.max_iter {
            let mut active_set_changed = false;
            let mut max_change: f64 = 0.0;

            for ivar in 0..nvars {
                if do_active_only && beta[ivar] == 0.0 {
                    continue;
                }

                let mut residual_sum = 0.0;
                for icase in 0..ncases {
                    residual_sum += xs[icase * nvars + ivar] * resid[icase];
                }
                let argument = residual_sum / ncases as f64 + beta[ivar];

                // Soft-thresholding operator
                let new_beta = if argument > 0.0 && s_threshold < argument {
                    (argument - s_threshold) / update_factor
                } else if argument < 0.0 && s_threshold < -argument {
                    (argument + s_threshold) / update_factor
                } else {
                    0.0
                };

                let correction = new_beta - beta[ivar];
                max_change = max_change.max(correction.abs());
                if correction != 0.0 {
                    for icase in 0..ncases {
                        resid[icase] -= correction * xs[icase * nvars + ivar];
                    }
                    if (beta[ivar] == 0.0) != (new_beta == 0.0) {
                        active_set_changed = true;
                    }
                    beta[ivar] = new_beta;
                }
            }

            let converged = max_change < self.tol;
            if do_active_only {
                if converged {
                    do_active_only = false;
                }
            } else {
                if converged && !active_set_changed {
                    break;
                }
                do_active_only = true;
            }
        }

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(FitError::NonFinite("elastic net coefficients"));
        }

        let mse = resid.iter().map(|r| r * r).sum::<f64>() / ncases as f64;
        self.explained = 1.0 - mse;
        self.beta = beta;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>, FitError> {
        if !self.fitted {
            return Err(FitError::NotFitted);
        }
        if x.ncols() != self.beta.len() {
            return Err(FitError::ShapeMismatch {
                expected: self.beta.len(),
                got: x.ncols(),
            });
        }
        Ok((0..x.nrows())
            .map(|i| {
                let pred: f64 = x
                    .row(i)
                    .iter()
                    .enumerate()
                    .map(|(ivar, &v)| self.beta[ivar] * (v - self.xmeans[ivar]) / self.xscales[ivar])
                    .sum();
                pred * self.yscale + self.ymean
            })
            .collect())
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

    fn line_data() -> (Matrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64, ((i * 7) % 5) as f64]).collect();
        let y = rows.iter().map(|r| 3.0 * r[0] + 10.0).collect();
        (Matrix::from_rows(&rows).unwrap(), y)
    }

    #[test]
    fn test_small_penalty_fits_line() {
        let (x, y) = line_data();
        let mut model = ElasticNet::new(1e-6, 0.5, 2000, 1e-10).unwrap();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let mae = stats::mean_absolute_error(&y, &pred);
        assert!(mae < 1e-2, "mae = {mae}");
        assert!(model.explained > 0.999);
    }

    #[test]
    fn test_large_penalty_zeroes_everything() {
        let (x, y) = line_data();
        let mut model = ElasticNet::new(10.0, 1.0, 100, 1e-9).unwrap();
        model.fit(&x, &y).unwrap();
        assert!(model.beta.iter().all(|&b| b == 0.0));
        let pred = model.predict(&x).unwrap();
        assert!((pred[0] - stats::mean(&y)).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_mixing() {
        assert!(ElasticNet::new(0.1, 1.5, 100, 1e-6).is_err());
    }
}
