use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use super::with_deadline;
use crate::dataset::{Dataset, Matrix};
use crate::error::CollaboratorError;

const MS_PER_DAY: i64 = 86_400_000;

/// One pair at one candle interval over a lookback window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseQuery {
    pub pair: String,
    pub interval_seconds: u64,
    pub lookback_days: u32,
}

/// Source of time-ordered indicator rows.
pub trait Warehouse {
    /// May return zero rows; callers treat that as a validation failure.
    fn fetch(&self, query: &WarehouseQuery, timeout: Duration) -> Result<Dataset, CollaboratorError>;
}

/// Reads `pair,candle_seconds,window_start_ms,<feature..>` rows from a CSV file.
///
/// Rows are filtered to the query's pair and interval and to the lookback
/// window ending at the newest matching row, then sorted by window start.
/// Empty feature cells read as missing values.
#[derive(Debug, Clone)]
pub struct CsvWarehouse {
    path: PathBuf,
}

impl CsvWarehouse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Warehouse for CsvWarehouse {
    fn fetch(&self, query: &WarehouseQuery, timeout: Duration) -> Result<Dataset, CollaboratorError> {
        let path = self.path.clone();
        let owned = query.clone();
        let data = with_deadline("fetch", timeout, move || read_indicator_file(&path, &owned))?;
        info!(
            pair = %query.pair,
            interval = query.interval_seconds,
            rows = data.len(),
            "warehouse fetch complete"
        );
        Ok(data)
    }
}

fn read_indicator_file(path: &Path, query: &WarehouseQuery) -> Result<Dataset, CollaboratorError> {
    let file = File::open(path)
        .map_err(|e| CollaboratorError::Connection(format!("cannot open {}: {e}", path.display())))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(CollaboratorError::Format("file has no header".into())),
    };
    let names: Vec<&str> = header.trim().split(',').map(str::trim).collect();
    if names.len() < 3 || names[..3] != ["pair", "candle_seconds", "window_start_ms"] {
        return Err(CollaboratorError::Format(format!(
            "header must start with pair,candle_seconds,window_start_ms, got `{header}`"
        )));
    }
    let features: Vec<String> = names[3..].iter().map(|s| s.to_string()).collect();

    let mut rows: Vec<(i64, Vec<f64>)> = Vec::new();
    for (line_num, line) in lines.enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if fields.len() != names.len() {
            return Err(CollaboratorError::Format(format!(
                "line {}: expected {} fields, got {}",
                line_num + 2,
                names.len(),
                fields.len()
            )));
        }
        let interval: u64 = parse_field(fields[1], line_num)?;
        if fields[0] != query.pair || interval != query.interval_seconds {
            continue;
        }
        let stamp: i64 = parse_field(fields[2], line_num)?;
        let values = fields[3..]
            .iter()
            .map(|f| if f.is_empty() { Ok(f64::NAN) } else { parse_field(f, line_num) })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push((stamp, values));
    }

    if let Some(newest) = rows.iter().map(|(t, _)| *t).max() {
        let oldest = newest - i64::from(query.lookback_days) * MS_PER_DAY;
        rows.retain(|(t, _)| *t >= oldest);
    }
    rows.sort_by_key(|(t, _)| *t);

    let timestamps: Vec<i64> = rows.iter().map(|(t, _)| *t).collect();
    let values = if rows.is_empty() {
        Matrix::zeros(0, features.len())
    } else {
        let values: Vec<Vec<f64>> = rows.into_iter().map(|(_, v)| v).collect();
        Matrix::from_rows(&values).map_err(|e| CollaboratorError::Format(e.to_string()))?
    };
    Dataset::new(features, timestamps, values).map_err(|e| CollaboratorError::Format(e.to_string()))
}

fn parse_field<T: std::str::FromStr>(field: &str, line_num: usize) -> Result<T, CollaboratorError> {
    field
        .parse()
        .map_err(|_| CollaboratorError::Format(format!("line {}: invalid value `{field}`", line_num + 2)))
}

/// Serves a fixed dataset. Useful for tests and dry runs.
#[derive(Debug, Clone)]
pub struct InMemoryWarehouse {
    data: Dataset,
    delay: Duration,
}

impl InMemoryWarehouse {
    pub fn new(data: Dataset) -> Self {
        Self {
            data,
            delay: Duration::ZERO,
        }
    }

    /// Simulated query latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Warehouse for InMemoryWarehouse {
    fn fetch(&self, _query: &WarehouseQuery, timeout: Duration) -> Result<Dataset, CollaboratorError> {
        let data = self.data.clone();
        let delay = self.delay;
        with_deadline("fetch", timeout, move || {
            std::thread::sleep(delay);
            Ok(data)
        })
    }
}
