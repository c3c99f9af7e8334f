use serde::{Deserialize, Serialize};

use super::{Estimator, check_training_data};
use crate::dataset::Matrix;
use crate::error::FitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborWeights {
    Uniform,
    Distance,
}

/// k-nearest-neighbours regression under Euclidean distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighborsRegressor {
    pub n_neighbors: usize,
    pub weights: NeighborWeights,
    train_x: Option<Matrix>,
    train_y: Vec<f64>,
}

impl KNeighborsRegressor {
    pub fn new(n_neighbors: usize, weights: NeighborWeights) -> Result<Self, FitError> {
        if n_neighbors == 0 {
            return Err(FitError::InvalidHyperparameter {
                name: "n_neighbors".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(Self {
            n_neighbors,
            weights,
            train_x: None,
            train_y: Vec::new(),
        })
    }
}

impl Estimator for KNeighborsRegressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<(), FitError> {
        check_training_data(x, y)?;
        self.train_x = Some(x.clone());
        self.train_y = y.to_vec();
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>, FitError> {
        let train = self.train_x.as_ref().ok_or(FitError::NotFitted)?;
        if x.ncols() != train.ncols() {
            return Err(FitError::ShapeMismatch {
                expected: train.ncols(),
                got: x.ncols(),
            });
        }
        let k = self.n_neighbors.min(train.nrows());

        let mut out = Vec::with_capacity(x.nrows());
        let mut dist: Vec<(f64, usize)> = Vec::with_capacity(train.nrows());
        for i in 0..x.nrows() {
            let query = x.row(i);
            dist.clear();
            dist.extend((0..train.nrows()).map(|t| {
                let d2: f64 = train.row(t).iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum();
                (d2.sqrt(), t)
            }));
            // Ties broken by training order so predictions are reproducible
            dist.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let nearest = &dist[..k];

            let pred = match self.weights {
                NeighborWeights::Uniform => {
                    nearest.iter().map(|&(_, t)| self.train_y[t]).sum::<f64>() / k as f64
                }
                NeighborWeights::Distance => {
                    // An exact match takes the prediction outright
                    if let Some(&(_, t)) = nearest.iter().find(|(d, _)| *d == 0.0) {
                        self.train_y[t]
                    } else {
                        let wsum: f64 = nearest.iter().map(|(d, _)| 1.0 / d).sum();
                        nearest.iter().map(|&(d, t)| self.train_y[t] / d).sum::<f64>() / wsum
                    }
                }
            };
            out.push(pred);
        }
        Ok(out)
    }
}
