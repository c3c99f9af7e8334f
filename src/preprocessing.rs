//! Mean imputation followed by standardization.
//!
//! Statistics are learned from the rows passed to `fit` only. Callers in the
//! search pass the training fold, never the validation fold.

use serde::{Deserialize, Serialize};

use crate::dataset::Matrix;
use crate::error::FitError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    /// Per-column mean of the observed (non-missing) values
    pub fill_values: Vec<f64>,
    /// Per-column mean after imputation
    pub centers: Vec<f64>,
    /// Per-column population standard deviation after imputation
    pub scales: Vec<f64>,
}

impl Preprocessor {
    pub fn fit(x: &Matrix) -> Result<Self, FitError> {
        if x.nrows() == 0 {
            return Err(FitError::EmptyInput);
        }
        let ncols = x.ncols();
        let mut fill_values = vec![0.0; ncols];
        let mut centers = vec![0.0; ncols];
        let mut scales = vec![1.0; ncols];

        for j in 0..ncols {
            let column = x.column(j);
            let observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if observed.iter().any(|v| !v.is_finite()) {
                return Err(FitError::NonFinite("feature column"));
            }
            // A column with no observations imputes to zero
            let fill = if observed.is_empty() { 0.0 } else { stats::mean(&observed) };
            let imputed: Vec<f64> = column.iter().map(|&v| if v.is_nan() { fill } else { v }).collect();
            let sd = stats::std_dev(&imputed);

            fill_values[j] = fill;
            centers[j] = stats::mean(&imputed);
            scales[j] = if sd > 1.0e-12 { sd } else { 1.0 };
        }

        Ok(Self {
            fill_values,
            centers,
            scales,
        })
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix, FitError> {
        if x.ncols() != self.centers.len() {
            return Err(FitError::ShapeMismatch {
                expected: self.centers.len(),
                got: x.ncols(),
            });
        }
        let mut out = Matrix::zeros(x.nrows(), x.ncols());
        for i in 0..x.nrows() {
            for j in 0..x.ncols() {
                let raw = x.get(i, j);
                let v = if raw.is_nan() { self.fill_values[j] } else { raw };
                out.set(i, j, (v - self.centers[j]) / self.scales[j]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_come_from_fit_rows() {
        let train = Matrix::from_rows(&[vec![1.0], vec![f64::NAN], vec![3.0]]).unwrap();
        let pre = Preprocessor::fit(&train).unwrap();
        assert_eq!(pre.fill_values, vec![2.0]);
        assert_eq!(pre.centers, vec![2.0]);
        // imputed column is [1, 2, 3]
        assert!((pre.scales[0] - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);

        let other = Matrix::from_rows(&[vec![f64::NAN], vec![1000.0]]).unwrap();
        let out = pre.transform(&other).unwrap();
        assert_eq!(out.get(0, 0), 0.0);
        assert!((out.get(1, 0) - 998.0 / pre.scales[0]).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_gets_unit_scale() {
        let x = Matrix::from_rows(&[vec![5.0], vec![5.0]]).unwrap();
        let pre = Preprocessor::fit(&x).unwrap();
        assert_eq!(pre.scales, vec![1.0]);
    }

    #[test]
    fn test_column_count_checked() {
        let pre = Preprocessor::fit(&Matrix::from_rows(&[vec![1.0, 2.0]]).unwrap()).unwrap();
        let bad = Matrix::from_rows(&[vec![1.0]]).unwrap();
        assert!(matches!(pre.transform(&bad), Err(FitError::ShapeMismatch { .. })));
    }
}
