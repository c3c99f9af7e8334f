use tracing::debug;

use super::{Configuration, Fold};
use crate::dataset::{Dataset, Matrix};
use crate::error::{FitError, Result, TrainError};
use crate::models::{FittedPipeline, ModelFamily};

/// Cross-validated mean absolute error of one model family.
///
/// Holds a frozen feature matrix and its folds. Each call to [`evaluate`]
/// fits imputation, scaling and the model on the training rows of every fold
/// and scores the fold's validation rows.
///
/// [`evaluate`]: ObjectiveEvaluator::evaluate
#[derive(Debug, Clone)]
pub struct ObjectiveEvaluator<'a> {
    family: ModelFamily,
    features: &'a [String],
    x: &'a Matrix,
    y: &'a [f64],
    folds: Vec<Fold>,
}

impl<'a> ObjectiveEvaluator<'a> {
    /// `data` must already be restricted to the feature columns.
    pub fn new(family: ModelFamily, data: &'a Dataset, folds: Vec<Fold>) -> Result<Self> {
        let y = data.require_targets()?;
        if let Some(fold) = folds.iter().find(|f| f.validation.end > data.len()) {
            return Err(TrainError::InsufficientData {
                required: fold.validation.end,
                got: data.len(),
            });
        }
        Ok(Self {
            family,
            features: data.columns(),
            x: data.features(),
            y,
            folds,
        })
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// Per-fold validation MAE, in fold order.
    pub fn fold_scores(&self, config: &Configuration) -> std::result::Result<Vec<f64>, FitError> {
        self.folds
            .iter()
            .map(|fold| {
                let x_train = self.x.rows(fold.train.clone());
                let pipeline = FittedPipeline::fit(
                    self.family,
                    config,
                    self.features,
                    &x_train,
                    &self.y[fold.train.clone()],
                )?;
                let predictions = pipeline.predict(&self.x.rows(fold.validation.clone()))?;
                let mae = stats::mean_absolute_error(&self.y[fold.validation.clone()], &predictions);
                if !mae.is_finite() {
                    return Err(FitError::NonFinite("validation predictions"));
                }
                debug!(fold = fold.index, mae, "fold scored");
                Ok(mae)
            })
            .collect()
    }

    /// Mean of the per-fold errors.
    pub fn evaluate(&self, config: &Configuration) -> std::result::Result<f64, FitError> {
        let scores = self.fold_scores(config)?;
        Ok(stats::mean(&scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{ParamValue, TimeOrderedSplitter};

    fn frame(xs: &[f64], ys: &[f64]) -> Dataset {
        let rows = xs.iter().enumerate().map(|(i, &x)| (i as i64, vec![x])).collect();
        Dataset::from_rows(&["x"], rows).unwrap().with_targets(ys.to_vec()).unwrap()
    }

    #[test]
    fn test_statistics_come_from_training_rows_only() {
        // train x = [1, 3] (mean 2, sd 1), y = 2x
        // validation NaN imputes to 2 -> predicts 4, |5 - 4| = 1
        // validation 100 standardizes to 98 -> predicts 200, |210 - 200| = 10
        let data = frame(&[1.0, 3.0, f64::NAN, 100.0], &[2.0, 6.0, 5.0, 210.0]);
        let folds: Vec<Fold> = TimeOrderedSplitter::new(1).unwrap().split(4).unwrap().collect();
        assert_eq!(folds[0].validation, 2..4);

        let evaluator = ObjectiveEvaluator::new(ModelFamily::Linear, &data, folds).unwrap();
        let config = Configuration::new().with("fit_intercept", ParamValue::Bool(true));
        let score = evaluator.evaluate(&config).unwrap();
        assert!((score - 5.5).abs() < 1e-6, "score {score}");
    }

    #[test]
    fn test_mean_over_folds() {
        let xs: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x + 1.0).collect();
        let data = frame(&xs, &ys);
        let folds: Vec<Fold> = TimeOrderedSplitter::new(3).unwrap().split(12).unwrap().collect();
        let evaluator = ObjectiveEvaluator::new(ModelFamily::Mean, &data, folds).unwrap();
        let per_fold = evaluator.fold_scores(&Configuration::new()).unwrap();
        let score = evaluator.evaluate(&Configuration::new()).unwrap();
        assert_eq!(per_fold.len(), 3);
        assert!((score - stats::mean(&per_fold)).abs() < 1e-12);
    }

    #[test]
    fn test_bad_configuration_surfaces_fit_error() {
        let data = frame(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 4.0]);
        let folds: Vec<Fold> = TimeOrderedSplitter::new(1).unwrap().split(4).unwrap().collect();
        let evaluator = ObjectiveEvaluator::new(ModelFamily::Ridge, &data, folds).unwrap();
        let config = Configuration::new().with("alpha", ParamValue::Float(-1.0));
        assert!(matches!(evaluator.evaluate(&config), Err(FitError::InvalidHyperparameter { .. })));
    }

    #[test]
    fn test_requires_targets() {
        let data = Dataset::from_rows(&["x"], vec![(0, vec![1.0])]).unwrap();
        assert!(ObjectiveEvaluator::new(ModelFamily::Mean, &data, Vec::new()).is_err());
    }
}
