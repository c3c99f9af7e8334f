use serde::{Deserialize, Serialize};

use super::{Estimator, Model, ModelFamily};
use crate::dataset::{Dataset, Matrix};
use crate::error::{FitError, Result};
use crate::preprocessing::Preprocessor;
use crate::search::Configuration;

/// Imputation and scaling composed with a fitted regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub features: Vec<String>,
    pub family: ModelFamily,
    pub configuration: Configuration,
    pub preprocessor: Preprocessor,
    pub model: Model,
}

impl FittedPipeline {
    /// Learns preprocessing statistics and model parameters from `x` only.
    pub fn fit(
        family: ModelFamily,
        configuration: &Configuration,
        features: &[String],
        x: &Matrix,
        y: &[f64],
    ) -> std::result::Result<Self, FitError> {
        let mut model = family.build(configuration)?;
        let preprocessor = Preprocessor::fit(x)?;
        let xt = preprocessor.transform(x)?;
        model.fit(&xt, y)?;
        Ok(Self {
            features: features.to_vec(),
            family,
            configuration: configuration.clone(),
            preprocessor,
            model,
        })
    }

    pub fn predict(&self, x: &Matrix) -> std::result::Result<Vec<f64>, FitError> {
        let xt = self.preprocessor.transform(x)?;
        self.model.predict(&xt)
    }

    /// Predicts after subsetting `data` to the pipeline's feature columns.
    pub fn predict_dataset(&self, data: &Dataset) -> Result<Vec<f64>> {
        let subset = data.select_columns(&self.features)?;
        Ok(self.predict(subset.features())?)
    }
}
