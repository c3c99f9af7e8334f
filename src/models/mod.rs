//! Regression families used for screening and tuning.

mod baseline;
mod elastic_net;
mod huber;
mod knn;
mod linear;
mod mean;
mod pipeline;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::Matrix;
use crate::error::FitError;
use crate::search::{Configuration, Domain, ParamValue, SearchSpace};

pub use baseline::CurrentValueBaseline;
pub use elastic_net::ElasticNet;
pub use huber::HuberRegressor;
pub use knn::{KNeighborsRegressor, NeighborWeights};
pub use linear::LinearRegressor;
pub use mean::MeanRegressor;
pub use pipeline::FittedPipeline;

/// Fit/predict contract shared by every regression family.
pub trait Estimator {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<(), FitError>;
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>, FitError>;
}

/// The roster of regression families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Mean,
    Linear,
    Ridge,
    ElasticNet,
    Huber,
    KNeighbors,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 6] = [
        ModelFamily::Mean,
        ModelFamily::Linear,
        ModelFamily::Ridge,
        ModelFamily::ElasticNet,
        ModelFamily::Huber,
        ModelFamily::KNeighbors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::Mean => "mean",
            ModelFamily::Linear => "linear",
            ModelFamily::Ridge => "ridge",
            ModelFamily::ElasticNet => "elastic_net",
            ModelFamily::Huber => "huber",
            ModelFamily::KNeighbors => "k_neighbors",
        }
    }

    /// Library defaults, used for screening and as the first tuning trial.
    pub fn default_configuration(&self) -> Configuration {
        use ParamValue::*;
        match self {
            ModelFamily::Mean => Configuration::new(),
            ModelFamily::Linear => Configuration::new().with("fit_intercept", Bool(true)),
            ModelFamily::Ridge => Configuration::new()
                .with("alpha", Float(1.0))
                .with("fit_intercept", Bool(true)),
            ModelFamily::ElasticNet => Configuration::new()
                .with("lambda", Float(0.01))
                .with("l1_ratio", Float(0.5))
                .with("max_iter", Int(1000))
                .with("tol", Float(1e-6)),
            ModelFamily::Huber => Configuration::new()
                .with("epsilon", Float(1.35))
                .with("max_iter", Int(100))
                .with("tol", Float(1e-5))
                .with("alpha", Float(1e-4))
                .with("fit_intercept", Bool(true))
                .with("warm_start", Bool(false)),
            ModelFamily::KNeighbors => Configuration::new()
                .with("n_neighbors", Int(5))
                .with("weights", Text("uniform".into())),
        }
    }

    pub fn search_space(&self) -> SearchSpace {
        match self {
            ModelFamily::Mean => SearchSpace::new(),
            ModelFamily::Linear => SearchSpace::new().with("fit_intercept", Domain::boolean()),
            ModelFamily::Ridge => SearchSpace::new()
                .with("alpha", Domain::log_float(1e-4, 100.0))
                .with("fit_intercept", Domain::boolean()),
            ModelFamily::ElasticNet => SearchSpace::new()
                .with("lambda", Domain::log_float(1e-4, 1.0))
                .with("l1_ratio", Domain::float(0.05, 1.0))
                .with("max_iter", Domain::int(100, 2000))
                .with("tol", Domain::log_float(1e-7, 1e-3)),
            ModelFamily::Huber => SearchSpace::new()
                .with("epsilon", Domain::float(1.0, 10.0))
                .with("max_iter", Domain::int(100, 1000))
                .with("tol", Domain::log_float(1e-5, 1.0))
                .with("alpha", Domain::log_float(1e-4, 1.0))
                .with("fit_intercept", Domain::boolean())
                .with("warm_start", Domain::boolean()),
            ModelFamily::KNeighbors => SearchSpace::new()
                .with("n_neighbors", Domain::int(1, 50))
                .with(
                    "weights",
                    Domain::categorical(vec![
                        ParamValue::Text("uniform".into()),
                        ParamValue::Text("distance".into()),
                    ]),
                ),
        }
    }

    /// Build an unfitted model. Absent keys fall back to the family defaults.
    pub fn build(&self, config: &Configuration) -> Result<Model, FitError> {
        let model = match self {
            ModelFamily::Mean => Model::Mean(MeanRegressor::default()),
            ModelFamily::Linear => Model::Linear(LinearRegressor::new(0.0, config.bool_or("fit_intercept", true)?)?),
            ModelFamily::Ridge => Model::Linear(LinearRegressor::new(
                config.f64_or("alpha", 1.0)?,
                config.bool_or("fit_intercept", true)?,
            )?),
            ModelFamily::ElasticNet => Model::ElasticNet(ElasticNet::new(
                config.f64_or("lambda", 0.01)?,
                config.f64_or("l1_ratio", 0.5)?,
                config.usize_or("max_iter", 1000)?,
                config.f64_or("tol", 1e-6)?,
            )?),
            ModelFamily::Huber => Model::Huber(HuberRegressor::new(
                config.f64_or("epsilon", 1.35)?,
                config.usize_or("max_iter", 100)?,
                config.f64_or("tol", 1e-5)?,
                config.f64_or("alpha", 1e-4)?,
                config.bool_or("fit_intercept", true)?,
                config.bool_or("warm_start", false)?,
            )?),
            ModelFamily::KNeighbors => {
                let weights = match config.get("weights") {
                    None => NeighborWeights::Uniform,
                    Some(ParamValue::Text(w)) if w == "uniform" => NeighborWeights::Uniform,
                    Some(ParamValue::Text(w)) if w == "distance" => NeighborWeights::Distance,
                    Some(other) => {
                        return Err(FitError::InvalidHyperparameter {
                            name: "weights".into(),
                            reason: format!("unknown weighting `{other}`"),
                        });
                    }
                };
                Model::KNeighbors(KNeighborsRegressor::new(config.usize_or("n_neighbors", 5)?, weights)?)
            }
        };
        Ok(model)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelFamily::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown model family `{s}`"))
    }
}

/// A model of any family, serializable for the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Model {
    Mean(MeanRegressor),
    Linear(LinearRegressor),
    ElasticNet(ElasticNet),
    Huber(HuberRegressor),
    KNeighbors(KNeighborsRegressor),
}

impl Estimator for Model {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<(), FitError> {
        match self {
            Model::Mean(m) => m.fit(x, y),
            Model::Linear(m) => m.fit(x, y),
            Model::ElasticNet(m) => m.fit(x, y),
            Model::Huber(m) => m.fit(x, y),
            Model::KNeighbors(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>, FitError> {
        match self {
            Model::Mean(m) => m.predict(x),
            Model::Linear(m) => m.predict(x),
            Model::ElasticNet(m) => m.predict(x),
            Model::Huber(m) => m.predict(x),
            Model::KNeighbors(m) => m.predict(x),
        }
    }
}

pub(crate) fn check_training_data(x: &Matrix, y: &[f64]) -> Result<(), FitError> {
    if x.nrows() == 0 {
        return Err(FitError::EmptyInput);
    }
    if x.nrows() != y.len() {
        return Err(FitError::LengthMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    if x.as_slice().iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite("features"));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite("targets"));
    }
    Ok(())
}

/// Row-major design matrix, with a leading column of ones when `intercept`.
pub(crate) fn design_matrix(x: &Matrix, intercept: bool) -> (Vec<f64>, usize) {
    let offset = usize::from(intercept);
    let ncols = x.ncols() + offset;
    let mut design = Vec::with_capacity(x.nrows() * ncols);
    for i in 0..x.nrows() {
        if intercept {
            design.push(1.0);
        }
        design.extend_from_slice(x.row(i));
    }
    (design, ncols)
}

pub(crate) fn linear_predict(x: &Matrix, coef: &[f64], intercept: f64) -> Result<Vec<f64>, FitError> {
    if x.ncols() != coef.len() {
        return Err(FitError::ShapeMismatch {
            expected: coef.len(),
            got: x.ncols(),
        });
    }
    Ok((0..x.nrows())
        .map(|i| intercept + x.row(i).iter().zip(coef).map(|(a, b)| a * b).sum::<f64>())
        .collect())
}
