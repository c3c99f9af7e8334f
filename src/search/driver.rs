use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::{Configuration, Proposer, SearchSpace};
use crate::error::{FitError, Result, TrainError};

/// Shared cancellation flag, checked between trials and between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One evaluated configuration. Failed trials score +infinity.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub number: usize,
    pub configuration: Configuration,
    pub score: f64,
    pub error: Option<FitError>,
}

impl Trial {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub trials: Vec<Trial>,
    best: usize,
    /// Set when the search stopped early on a cancel request
    pub cancelled: bool,
}

impl SearchOutcome {
    pub fn best(&self) -> &Trial {
        &self.trials[self.best]
    }

    pub fn best_configuration(&self) -> &Configuration {
        &self.best().configuration
    }

    pub fn best_score(&self) -> f64 {
        self.best().score
    }

    pub fn failed_count(&self) -> usize {
        self.trials.iter().filter(|t| t.is_failed()).count()
    }
}

/// Sequential search over a [`SearchSpace`] with a fixed trial budget.
///
/// Enqueued configurations are evaluated first and count against the budget;
/// the proposer supplies the rest. Every proposal is recorded, including
/// failures, and the search never stops before the budget is spent unless
/// cancelled.
pub struct SearchDriver<P: Proposer> {
    proposer: P,
    trial_budget: usize,
    max_failure_ratio: f64,
    queue: VecDeque<Configuration>,
    cancel: Option<CancelToken>,
}

impl<P: Proposer> SearchDriver<P> {
    pub fn new(proposer: P, trial_budget: usize) -> Self {
        Self {
            proposer,
            trial_budget,
            max_failure_ratio: 1.0,
            queue: VecDeque::new(),
            cancel: None,
        }
    }

    /// Fraction of failed trials at which the search is declared exhausted.
    pub fn with_max_failure_ratio(mut self, ratio: f64) -> Self {
        self.max_failure_ratio = ratio;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn enqueue(&mut self, config: Configuration) {
        self.queue.push_back(config);
    }

    pub fn search<F>(&mut self, space: &SearchSpace, mut evaluate: F) -> Result<SearchOutcome>
    where
        F: FnMut(&Configuration) -> std::result::Result<f64, FitError>,
    {
        if self.trial_budget == 0 {
            return Err(TrainError::InvalidParameters("trial budget must be at least 1".into()));
        }
        if !(self.max_failure_ratio > 0.0 && self.max_failure_ratio <= 1.0) {
            return Err(TrainError::InvalidParameters(format!(
                "max failure ratio must lie in (0, 1], got {}",
                self.max_failure_ratio
            )));
        }
        space.validate()?;
        if let Some(config) = self.queue.iter().find(|c| !space.admits(c)) {
            return Err(TrainError::SearchSpace(format!(
                "enqueued configuration {config} lies outside the space"
            )));
        }

        info!(
            proposer = self.proposer.name(),
            budget = self.trial_budget,
            params = space.len(),
            "search started"
        );
        let mut trials: Vec<Trial> = Vec::with_capacity(self.trial_budget);
        let mut best: Option<usize> = None;
        let mut cancelled = false;

        for number in 0..self.trial_budget {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                warn!(completed = number, "search cancelled");
                cancelled = true;
                break;
            }
            let configuration = match self.queue.pop_front() {
                Some(config) => config,
                None => self.proposer.propose(space, &trials),
            };

            let trial = match evaluate(&configuration) {
                Ok(score) if score.is_finite() => {
                    debug!(trial = number, score, config = %configuration, "trial complete");
                    Trial {
                        number,
                        configuration,
                        score,
                        error: None,
                    }
                }
                Ok(_) => failed(number, configuration, FitError::NonFinite("objective score")),
                Err(err) => failed(number, configuration, err),
            };

            // strict less-than keeps the first of equal scores
            if !trial.is_failed() && best.is_none_or(|b| trial.score < trials[b].score) {
                best = Some(number);
            }
            trials.push(trial);
        }

        let failed_count = trials.iter().filter(|t| t.is_failed()).count();
        let last_error = trials.iter().rev().find_map(|t| t.error.clone());
        if let Some(last_error) = last_error {
            let ratio = failed_count as f64 / trials.len() as f64;
            if ratio >= self.max_failure_ratio || best.is_none() {
                return Err(TrainError::SearchExhausted {
                    trials: trials.len(),
                    failed: failed_count,
                    last_error,
                });
            }
        }
        let Some(best) = best else {
            return Err(TrainError::Cancelled {
                stage: "tuning".into(),
            });
        };

        info!(
            trials = trials.len(),
            failed = failed_count,
            best_trial = best,
            best_score = trials[best].score,
            "search finished"
        );
        Ok(SearchOutcome {
            trials,
            best,
            cancelled,
        })
    }
}

fn failed(number: usize, configuration: Configuration, error: FitError) -> Trial {
    warn!(trial = number, config = %configuration, %error, "trial failed");
    Trial {
        number,
        configuration,
        score: f64::INFINITY,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Domain, ParamValue, RandomProposer, TpeProposer};

    fn space() -> SearchSpace {
        SearchSpace::new().with("x", Domain::float(-5.0, 5.0))
    }

    fn quadratic(config: &Configuration) -> std::result::Result<f64, FitError> {
        let x = config.f64_or("x", 0.0)?;
        Ok((x - 1.0).powi(2))
    }

    #[test]
    fn test_records_exactly_budget_trials() {
        let mut driver = SearchDriver::new(RandomProposer::new(1), 17);
        let outcome = driver.search(&space(), quadratic).unwrap();
        assert_eq!(outcome.trials.len(), 17);
        let min = outcome.trials.iter().map(|t| t.score).fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.best_score(), min);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_ties_resolved_by_first_occurrence() {
        let mut driver = SearchDriver::new(RandomProposer::new(1), 6);
        let outcome = driver.search(&space(), |_| Ok(2.0)).unwrap();
        assert_eq!(outcome.best().number, 0);
    }

    #[test]
    fn test_single_failure_is_recovered() {
        let mut calls = 0;
        let mut driver = SearchDriver::new(RandomProposer::new(5), 4);
        let outcome = driver
            .search(&space(), |config| {
                calls += 1;
                if calls == 2 { Err(FitError::Singular("boom".into())) } else { quadratic(config) }
            })
            .unwrap();
        assert_eq!(outcome.trials.len(), 4);
        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(outcome.trials[1].score, f64::INFINITY);
        assert!(outcome.best().error.is_none());
    }

    #[test]
    fn test_pervasive_failure_is_exhausted() {
        let mut driver = SearchDriver::new(RandomProposer::new(5), 3);
        let err = driver.search(&space(), |_| Err(FitError::EmptyInput)).unwrap_err();
        assert!(matches!(
            err,
            TrainError::SearchExhausted { trials: 3, failed: 3, last_error: FitError::EmptyInput }
        ));
    }

    #[test]
    fn test_failure_ratio_threshold() {
        let mut calls = 0;
        let mut driver = SearchDriver::new(RandomProposer::new(5), 4).with_max_failure_ratio(0.5);
        let err = driver
            .search(&space(), |config| {
                calls += 1;
                if calls % 2 == 0 { Err(FitError::NotFitted) } else { quadratic(config) }
            })
            .unwrap_err();
        assert!(matches!(err, TrainError::SearchExhausted { failed: 2, .. }));
    }

    #[test]
    fn test_malformed_space_detected_before_first_trial() {
        let bad = SearchSpace::new().with("x", Domain::float(1.0, -1.0));
        let mut calls = 0;
        let mut driver = SearchDriver::new(RandomProposer::new(5), 3);
        let err = driver
            .search(&bad, |_| {
                calls += 1;
                Ok(0.0)
            })
            .unwrap_err();
        assert!(matches!(err, TrainError::SearchSpace(_)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_enqueued_configurations_run_first() {
        let seeded = Configuration::new().with("x", ParamValue::Float(1.0));
        let mut driver = SearchDriver::new(RandomProposer::new(9), 3);
        driver.enqueue(seeded.clone());
        let outcome = driver.search(&space(), quadratic).unwrap();
        assert_eq!(outcome.trials[0].configuration, seeded);
        assert_eq!(outcome.best().number, 0);
    }

    #[test]
    fn test_enqueued_configuration_must_fit_space() {
        let mut driver = SearchDriver::new(RandomProposer::new(9), 3);
        driver.enqueue(Configuration::new().with("x", ParamValue::Float(50.0)));
        assert!(matches!(driver.search(&space(), quadratic), Err(TrainError::SearchSpace(_))));
    }

    #[test]
    fn test_cancel_returns_best_so_far() {
        let token = CancelToken::new();
        let mut calls = 0;
        let mut driver = SearchDriver::new(RandomProposer::new(2), 10).with_cancel_token(token.clone());
        let outcome = driver
            .search(&space(), |config| {
                calls += 1;
                if calls == 3 {
                    token.cancel();
                }
                quadratic(config)
            })
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.trials.len(), 3);
    }

    #[test]
    fn test_cancel_before_first_trial() {
        let token = CancelToken::new();
        token.cancel();
        let mut driver = SearchDriver::new(RandomProposer::new(2), 10).with_cancel_token(token);
        assert!(matches!(driver.search(&space(), quadratic), Err(TrainError::Cancelled { .. })));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut driver = SearchDriver::new(RandomProposer::new(2), 0);
        assert!(matches!(driver.search(&space(), quadratic), Err(TrainError::InvalidParameters(_))));
    }

    #[test]
    fn test_seeded_search_is_reproducible() {
        let run = || {
            let mut driver = SearchDriver::new(TpeProposer::new(11), 30);
            driver.search(&space(), quadratic).unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.best_configuration(), b.best_configuration());
        assert_eq!(a.trials, b.trials);
    }
}
