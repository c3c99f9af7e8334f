use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Where and as whom a run is tracked. Passed to the sink explicitly; no
/// process environment is read or written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Root directory of the tracking store
    pub uri: PathBuf,
    #[serde(default)]
    pub experiment: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl TrackingConfig {
    pub fn new(uri: impl Into<PathBuf>, experiment: &str) -> Self {
        Self {
            uri: uri.into(),
            experiment: experiment.to_string(),
            username: None,
            password: None,
        }
    }
}

/// Experiment-tracking sink. Callers treat failures as non-fatal.
pub trait TrackingSink {
    fn log_params(&self, params: &[(String, String)]) -> Result<(), CollaboratorError>;
    fn log_metrics(&self, metrics: &[(&str, f64)]) -> Result<(), CollaboratorError>;
    fn log_table(&self, name: &str, table: &serde_json::Value) -> Result<(), CollaboratorError>;
    fn log_artifact(&self, name: &str, bytes: &[u8]) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Start {
        experiment: &'a str,
        user: Option<&'a str>,
    },
    Params {
        values: BTreeMap<&'a str, &'a str>,
    },
    Metric {
        name: &'a str,
        value: f64,
    },
    Table {
        name: &'a str,
        rows: &'a serde_json::Value,
    },
    Artifact {
        name: &'a str,
        path: &'a Path,
        bytes: usize,
    },
}

/// Appends JSON lines to `<uri>/<experiment>/run.jsonl` and stores artifacts
/// under `<uri>/<experiment>/artifacts/`.
#[derive(Debug, Clone)]
pub struct FsTracker {
    dir: PathBuf,
}

impl FsTracker {
    pub fn new(config: &TrackingConfig) -> Result<Self, CollaboratorError> {
        let experiment = if config.experiment.is_empty() { "default" } else { &config.experiment };
        let dir = config.uri.join(experiment.replace('/', "_"));
        fs::create_dir_all(dir.join("artifacts"))?;
        let tracker = Self { dir };
        tracker.append(&Record::Start {
            experiment,
            user: config.username.as_deref(),
        })?;
        Ok(tracker)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("run.jsonl")
    }

    fn append(&self, record: &Record<'_>) -> Result<(), CollaboratorError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut line = serde_json::to_value(record)?;
        if let Some(obj) = line.as_object_mut() {
            obj.insert("ts_ms".into(), serde_json::Value::from(millis as u64));
        }
        let mut file = OpenOptions::new().create(true).append(true).open(self.log_path())?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl TrackingSink for FsTracker {
    fn log_params(&self, params: &[(String, String)]) -> Result<(), CollaboratorError> {
        let values = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.append(&Record::Params { values })
    }

    fn log_metrics(&self, metrics: &[(&str, f64)]) -> Result<(), CollaboratorError> {
        metrics
            .iter()
            .try_for_each(|&(name, value)| self.append(&Record::Metric { name, value }))
    }

    fn log_table(&self, name: &str, table: &serde_json::Value) -> Result<(), CollaboratorError> {
        self.append(&Record::Table { name, rows: table })
    }

    fn log_artifact(&self, name: &str, bytes: &[u8]) -> Result<(), CollaboratorError> {
        let path = self.dir.join("artifacts").join(name);
        fs::write(&path, bytes)?;
        self.append(&Record::Artifact {
            name,
            path: &path,
            bytes: bytes.len(),
        })
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracker;

impl TrackingSink for NullTracker {
    fn log_params(&self, _params: &[(String, String)]) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn log_metrics(&self, _metrics: &[(&str, f64)]) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn log_table(&self, _name: &str, _table: &serde_json::Value) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn log_artifact(&self, _name: &str, _bytes: &[u8]) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
