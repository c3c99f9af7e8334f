use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::with_deadline;
use crate::dataset::Dataset;
use crate::error::CollaboratorError;
use crate::models::FittedPipeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModel {
    pub name: String,
    pub version: u32,
    pub location: PathBuf,
}

/// Destination for promoted models.
pub trait ModelRegistry {
    fn push(
        &self,
        model: &FittedPipeline,
        sample_input: &Dataset,
        model_name: &str,
        timeout: Duration,
    ) -> Result<RegisteredModel, CollaboratorError>;
}

#[derive(Serialize)]
struct Signature<'a> {
    inputs: &'a [String],
    sample_rows: Vec<&'a [f64]>,
    sample_predictions: Vec<f64>,
}

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores `<root>/<model_name>/v<N>/{model.json, signature.json}`, with `N`
/// one past the highest existing version.
///
/// Files are written to a hidden staging directory under the deadline and
/// only renamed to `v<N>` once the write finished in time. A push that times
/// out never becomes a version.
#[derive(Debug, Clone)]
pub struct FsModelRegistry {
    root: PathBuf,
    write_delay: Duration,
}

impl FsModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_delay: Duration::ZERO,
        }
    }

    #[cfg(test)]
    fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registered versions of `model_name`, ascending.
    pub fn versions(&self, model_name: &str) -> Result<Vec<u32>, CollaboratorError> {
        list_versions(&self.root.join(model_name))
    }

    pub fn load(&self, model_name: &str, version: u32) -> Result<FittedPipeline, CollaboratorError> {
        let path = self.root.join(model_name).join(format!("v{version}")).join("model.json");
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn list_versions(dir: &Path) -> Result<Vec<u32>, CollaboratorError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut versions: Vec<u32> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.strip_prefix('v')?.parse().ok())
        .collect();
    versions.sort_unstable();
    Ok(versions)
}

impl ModelRegistry for FsModelRegistry {
    fn push(
        &self,
        model: &FittedPipeline,
        sample_input: &Dataset,
        model_name: &str,
        timeout: Duration,
    ) -> Result<RegisteredModel, CollaboratorError> {
        let sample = sample_input
            .select_columns(&model.features)
            .map_err(|e| CollaboratorError::Format(e.to_string()))?;
        let sample_predictions = model
            .predict(sample.features())
            .map_err(|e| CollaboratorError::Format(e.to_string()))?;
        let signature = Signature {
            inputs: &model.features,
            sample_rows: (0..sample.len()).map(|i| sample.features().row(i)).collect(),
            sample_predictions,
        };
        let model_json = serde_json::to_string_pretty(model)?;
        let signature_json = serde_json::to_string_pretty(&signature)?;

        let model_dir = self.root.join(model_name);
        let staging = model_dir.join(format!(
            ".staging-{}-{}",
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let abandoned = Arc::new(AtomicBool::new(false));

        let written = {
            let staging = staging.clone();
            let abandoned = Arc::clone(&abandoned);
            let delay = self.write_delay;
            with_deadline("push", timeout, move || {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                fs::create_dir_all(&staging)?;
                fs::write(staging.join("model.json"), model_json)?;
                fs::write(staging.join("signature.json"), signature_json)?;
                if abandoned.load(Ordering::SeqCst) {
                    let _ = fs::remove_dir_all(&staging);
                }
                Ok(())
            })
        };
        if let Err(err) = written {
            // Either the worker sees the flag after writing, or it finished
            // writing before the flag was set and the removal below catches it.
            abandoned.store(true, Ordering::SeqCst);
            if staging.exists() {
                if let Err(e) = fs::remove_dir_all(&staging) {
                    warn!(path = %staging.display(), error = %e, "could not remove staged model");
                }
            }
            return Err(err);
        }

        let version = list_versions(&model_dir)?.last().map_or(1, |v| v + 1);
        let location = model_dir.join(format!("v{version}"));
        fs::rename(&staging, &location)?;
        let registered = RegisteredModel {
            name: model_name.to_string(),
            version,
            location,
        };
        info!(
            model = %registered.name,
            version = registered.version,
            location = %registered.location.display(),
            "model registered"
        );
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Matrix;
    use crate::models::ModelFamily;

    fn fitted() -> (FittedPipeline, Dataset) {
        let data = Dataset::from_rows(
            &["close", "x"],
            vec![(0, vec![10.0, 1.0]), (1, vec![11.0, 2.0]), (2, vec![12.0, 3.0])],
        )
        .unwrap();
        let x = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let model = FittedPipeline::fit(
            ModelFamily::Linear,
            &ModelFamily::Linear.default_configuration(),
            &["x".to_string()],
            &x,
            &[2.0, 4.0, 6.0],
        )
        .unwrap();
        (model, data)
    }

    #[test]
    fn test_versions_increment() {
        let root = tempfile::tempdir().unwrap();
        let registry = FsModelRegistry::new(root.path());
        let (model, sample) = fitted();
        let first = registry.push(&model, &sample, "BTC_USD_60_300", Duration::from_secs(5)).unwrap();
        let second = registry.push(&model, &sample, "BTC_USD_60_300", Duration::from_secs(5)).unwrap();
        assert_eq!((first.version, second.version), (1, 2));
        assert_eq!(registry.versions("BTC_USD_60_300").unwrap(), vec![1, 2]);
        assert!(second.location.join("signature.json").exists());
    }

    #[test]
    fn test_stored_model_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let registry = FsModelRegistry::new(root.path());
        let (model, sample) = fitted();
        registry.push(&model, &sample, "m", Duration::from_secs(5)).unwrap();
        let loaded = registry.load("m", 1).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_json_keeps_every_float_bit() {
        let values = vec![3.9999999998666667_f64, 0.1 + 0.2, 1.0 / 3.0, -2.2250738585072014e-308];
        let back: Vec<f64> = serde_json::from_str(&serde_json::to_string(&values).unwrap()).unwrap();
        for (a, b) in values.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_timed_out_push_registers_nothing() {
        let root = tempfile::tempdir().unwrap();
        let registry = FsModelRegistry::new(root.path()).with_write_delay(Duration::from_millis(100));
        let (model, sample) = fitted();
        let err = registry.push(&model, &sample, "m", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, CollaboratorError::Timeout { ref operation, .. } if operation == "push"));

        // let the detached writer finish
        std::thread::sleep(Duration::from_millis(400));
        assert!(registry.versions("m").unwrap().is_empty());
        let leftovers: Vec<_> = fs::read_dir(root.path().join("m"))
            .map(|dir| dir.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty(), "{leftovers:?}");

        let next = FsModelRegistry::new(root.path())
            .push(&model, &sample, "m", Duration::from_secs(5))
            .unwrap();
        assert_eq!(next.version, 1);
    }

    #[test]
    fn test_signature_lists_inputs_and_predictions() {
        let root = tempfile::tempdir().unwrap();
        let registry = FsModelRegistry::new(root.path());
        let (model, sample) = fitted();
        let reg = registry.push(&model, &sample, "m", Duration::from_secs(5)).unwrap();
        let text = fs::read_to_string(reg.location.join("signature.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["inputs"], serde_json::json!(["x"]));
        assert_eq!(json["sample_predictions"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_sample_without_features_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let (model, _) = fitted();
        let sample = Dataset::from_rows(&["close"], vec![(0, vec![1.0])]).unwrap();
        let err = FsModelRegistry::new(root.path())
            .push(&model, &sample, "m", Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Format(_)));
    }
}
