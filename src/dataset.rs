//! Time-ordered tabular data.
//!
//! Values are stored row-major in a flat buffer with a fixed column stride,
//! missing values are `NaN`. Every transform returns a new `Dataset`.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result, TrainError};

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(nrows: usize, ncols: usize, data: Vec<f64>) -> std::result::Result<Self, FitError> {
        if data.len() != nrows * ncols {
            return Err(FitError::ShapeMismatch {
                expected: nrows * ncols,
                got: data.len(),
            });
        }
        Ok(Self { nrows, ncols, data })
    }

    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    /// Build from row vectors; all rows must have the same width.
    pub fn from_rows(rows: &[Vec<f64>]) -> std::result::Result<Self, FitError> {
        let ncols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * ncols);
        for row in rows {
            if row.len() != ncols {
                return Err(FitError::ShapeMismatch {
                    expected: ncols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            nrows: rows.len(),
            ncols,
            data,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.ncols + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.ncols + j] = value;
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.nrows).map(|i| self.get(i, j)).collect()
    }

    pub fn rows(&self, range: Range<usize>) -> Matrix {
        Matrix {
            nrows: range.len(),
            ncols: self.ncols,
            data: self.data[range.start * self.ncols..range.end * self.ncols].to_vec(),
        }
    }

    pub fn select_columns(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(self.nrows * indices.len());
        for i in 0..self.nrows {
            let row = self.row(i);
            data.extend(indices.iter().map(|&j| row[j]));
        }
        Matrix {
            nrows: self.nrows,
            ncols: indices.len(),
            data,
        }
    }
}

/// An ordered sequence of rows keyed by a strictly increasing timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    timestamps: Vec<i64>,
    values: Matrix,
    targets: Option<Vec<f64>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, timestamps: Vec<i64>, values: Matrix) -> Result<Self> {
        if values.ncols() != columns.len() {
            return Err(TrainError::validation(
                "shape",
                format!("{} column names for {} value columns", columns.len(), values.ncols()),
            ));
        }
        if values.nrows() != timestamps.len() {
            return Err(TrainError::validation(
                "shape",
                format!("{} timestamps for {} rows", timestamps.len(), values.nrows()),
            ));
        }
        Ok(Self {
            columns,
            timestamps,
            values,
            targets: None,
        })
    }

    /// Convenience constructor from `(timestamp, values)` rows.
    pub fn from_rows(columns: &[&str], rows: Vec<(i64, Vec<f64>)>) -> Result<Self> {
        let (timestamps, values): (Vec<i64>, Vec<Vec<f64>>) = rows.into_iter().unzip();
        let values = if values.is_empty() {
            Matrix::zeros(0, columns.len())
        } else {
            Matrix::from_rows(&values)?
        };
        Self::new(columns.iter().map(|c| c.to_string()).collect(), timestamps, values)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        self.column_index(name).map(|j| self.values.column(j))
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn features(&self) -> &Matrix {
        &self.values
    }

    pub fn targets(&self) -> Option<&[f64]> {
        self.targets.as_deref()
    }

    /// Targets or a validation error when none were appended yet.
    pub fn require_targets(&self) -> Result<&[f64]> {
        self.targets()
            .ok_or_else(|| TrainError::validation("target_present", "dataset has no target column"))
    }

    /// Keep only `names`, in the given order.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let idx = self.column_index(name).ok_or_else(|| {
                TrainError::validation("features_present", format!("column `{name}` not found"))
            })?;
            indices.push(idx);
        }
        Ok(Dataset {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            timestamps: self.timestamps.clone(),
            values: self.values.select_columns(&indices),
            targets: self.targets.clone(),
        })
    }

    /// Append a target that is `source` observed `shift` rows later.
    /// The trailing `shift` rows have no future value and are dropped.
    pub fn with_target(&self, source: &str, shift: usize) -> Result<Dataset> {
        let idx = self.column_index(source).ok_or_else(|| {
            TrainError::validation("target_source", format!("column `{source}` not found"))
        })?;
        let keep = self.len().saturating_sub(shift);
        let targets = (0..keep).map(|i| self.values.get(i + shift, idx)).collect();
        let mut out = self.slice(0..keep);
        out.targets = Some(targets);
        Ok(out)
    }

    /// Attach an explicit target vector.
    pub fn with_targets(&self, targets: Vec<f64>) -> Result<Dataset> {
        if targets.len() != self.len() {
            return Err(TrainError::validation(
                "shape",
                format!("{} targets for {} rows", targets.len(), self.len()),
            ));
        }
        let mut out = self.clone();
        out.targets = Some(targets);
        Ok(out)
    }

    /// Drop rows whose target is missing or non-finite.
    pub fn drop_missing_targets(&self) -> Dataset {
        let Some(targets) = &self.targets else {
            return self.clone();
        };
        let keep: Vec<usize> = (0..self.len()).filter(|&i| targets[i].is_finite()).collect();
        if keep.len() == self.len() {
            return self.clone();
        }
        let mut values = Matrix::zeros(keep.len(), self.values.ncols());
        for (out, &i) in keep.iter().enumerate() {
            for j in 0..self.values.ncols() {
                values.set(out, j, self.values.get(i, j));
            }
        }
        Dataset {
            columns: self.columns.clone(),
            timestamps: keep.iter().map(|&i| self.timestamps[i]).collect(),
            values,
            targets: Some(keep.iter().map(|&i| targets[i]).collect()),
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            timestamps: self.timestamps[range.clone()].to_vec(),
            values: self.values.rows(range.clone()),
            targets: self.targets.as_ref().map(|t| t[range].to_vec()),
        }
    }

    pub fn head(&self, n: usize) -> Dataset {
        self.slice(0..n.min(self.len()))
    }

    /// Number of leading rows that go to training for `ratio`.
    pub fn train_len(&self, ratio: f64) -> usize {
        ((self.len() as f64 * ratio).floor() as usize).min(self.len())
    }

    /// Chronological split: the first `floor(n * ratio)` rows train, the rest test.
    pub fn split_at_ratio(&self, ratio: f64) -> (Dataset, Dataset) {
        let cut = self.train_len(ratio);
        (self.slice(0..cut), self.slice(cut..self.len()))
    }
}
