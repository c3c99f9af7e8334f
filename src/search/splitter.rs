use std::ops::Range;

use crate::error::{Result, TrainError};

/// One expanding-window split. Every validation index is later than every
/// training index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

/// Expanding-window splitter over a time-ordered dataset.
///
/// The rows are cut into `n_folds + 1` blocks of `n / (n_folds + 1)` rows
/// (the remainder goes to the first training block). Fold `i` trains on
/// everything before validation block `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOrderedSplitter {
    n_folds: usize,
}

impl TimeOrderedSplitter {
    pub fn new(n_folds: usize) -> Result<Self> {
        if n_folds == 0 {
            return Err(TrainError::InvalidParameters("fold count must be at least 1".into()));
        }
        Ok(Self { n_folds })
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Lazily yields exactly `n_folds` folds over `n_rows` rows.
    pub fn split(&self, n_rows: usize) -> Result<Folds> {
        let required = self.n_folds + 1;
        if n_rows < required {
            return Err(TrainError::InsufficientData { required, got: n_rows });
        }
        let block = n_rows / required;
        Ok(Folds {
            first_start: n_rows - self.n_folds * block,
            block,
            n_folds: self.n_folds,
            next: 0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Folds {
    first_start: usize,
    block: usize,
    n_folds: usize,
    next: usize,
}

impl Iterator for Folds {
    type Item = Fold;

    fn next(&mut self) -> Option<Fold> {
        if self.next >= self.n_folds {
            return None;
        }
        let start = self.first_start + self.next * self.block;
        let fold = Fold {
            index: self.next,
            train: 0..start,
            validation: start..start + self.block,
        };
        self.next += 1;
        Some(fold)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.n_folds - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Folds {}
