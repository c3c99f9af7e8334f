//! Tree-structured Parzen estimator.
//!
//! Completed trials are split into a "good" group (the lowest `gamma` scores)
//! and a "bad" group. Each group gets a per-parameter Parzen density `l(x)`
//! and `g(x)`; candidates are drawn from `l` and the one maximizing
//! `ln l(x) - ln g(x)` is proposed. Parameters are treated independently.

use matlib::Mwc256;

use super::proposer::{sample_domain, sample_space};
use super::{Configuration, Domain, ParamValue, Proposer, SearchSpace, Trial};

const DEFAULT_STARTUP_TRIALS: usize = 10;
const DEFAULT_CANDIDATES: usize = 24;
const MAX_GOOD_TRIALS: usize = 25;

#[derive(Clone)]
pub struct TpeProposer {
    rng: Mwc256,
    n_startup_trials: usize,
    n_candidates: usize,
}

impl TpeProposer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mwc256::with_seed(seed),
            n_startup_trials: DEFAULT_STARTUP_TRIALS,
            n_candidates: DEFAULT_CANDIDATES,
        }
    }

    /// Number of completed trials sampled at random before modelling starts.
    pub fn with_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n.max(1);
        self
    }

    pub fn with_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }

    fn sample_param(&mut self, domain: &Domain, good: &[&ParamValue], bad: &[&ParamValue]) -> ParamValue {
        match domain {
            Domain::Categorical { choices } => self.sample_categorical(choices, good, bad),
            Domain::Float { low, high, log } => {
                let bounds = Bounds::new(*low, *high, *log, false);
                ParamValue::Float(self.sample_numeric(&bounds, good, bad).clamp(*low, *high))
            }
            Domain::Int { low, high, log } => {
                let bounds = Bounds::new(*low as f64, *high as f64, *log, true);
                let v = self.sample_numeric(&bounds, good, bad).round() as i64;
                ParamValue::Int(v.clamp(*low, *high))
            }
        }
    }

    fn sample_numeric(&mut self, bounds: &Bounds, good: &[&ParamValue], bad: &[&ParamValue]) -> f64 {
        let l = Parzen::fit(bounds, good);
        let g = Parzen::fit(bounds, bad);
        let mut best = (f64::NEG_INFINITY, l.sample(&mut self.rng));
        for _ in 0..self.n_candidates {
            let x = l.sample(&mut self.rng);
            let gain = l.log_density(x) - g.log_density(x);
            if gain > best.0 {
                best = (gain, x);
            }
        }
        bounds.to_external(best.1)
    }

    fn sample_categorical(&mut self, choices: &[ParamValue], good: &[&ParamValue], bad: &[&ParamValue]) -> ParamValue {
        let weights = |observed: &[&ParamValue]| -> Vec<f64> {
            let mut w: Vec<f64> = choices
                .iter()
                .map(|c| 1.0 + observed.iter().filter(|v| **v == c).count() as f64)
                .collect();
            let total: f64 = w.iter().sum();
            w.iter_mut().for_each(|x| *x /= total);
            w
        };
        let pl = weights(good);
        let pg = weights(bad);

        let mut best = (f64::NEG_INFINITY, 0);
        for _ in 0..self.n_candidates {
            let idx = draw_index(&pl, &mut self.rng);
            let gain = pl[idx].ln() - pg[idx].ln();
            if gain > best.0 {
                best = (gain, idx);
            }
        }
        choices[best.1].clone()
    }
}

impl Proposer for TpeProposer {
    fn propose(&mut self, space: &SearchSpace, history: &[Trial]) -> Configuration {
        let mut completed: Vec<&Trial> = history.iter().filter(|t| !t.is_failed()).collect();
        if completed.len() < self.n_startup_trials {
            return sample_space(space, &mut self.rng);
        }
        // stable sort keeps trial order among equal scores
        completed.sort_by(|a, b| a.score.total_cmp(&b.score));
        let n_good = good_count(completed.len());
        let (good, bad) = completed.split_at(n_good);

        let mut config = Configuration::new();
        for (name, domain) in space.iter() {
            let good_values = observed(good, name, domain);
            let bad_values = observed(bad, name, domain);
            let value = if good_values.is_empty() {
                sample_domain(domain, &mut self.rng)
            } else {
                self.sample_param(domain, &good_values, &bad_values)
            };
            config.insert(name, value);
        }
        config
    }

    fn name(&self) -> &'static str {
        "tpe"
    }
}

/// Values of `name` in `group` that still lie inside `domain`.
fn observed<'t>(group: &[&'t Trial], name: &str, domain: &Domain) -> Vec<&'t ParamValue> {
    group
        .iter()
        .filter_map(|t| t.configuration.get(name))
        .filter(|v| domain.contains(v))
        .collect()
}

/// Size of the good group: 10% of completed trials, at least 1, at most 25.
fn good_count(n: usize) -> usize {
    ((n as f64 * 0.1).ceil() as usize).clamp(1, MAX_GOOD_TRIALS).min(n)
}

fn draw_index(probabilities: &[f64], rng: &mut Mwc256) -> usize {
    let u = rng.unifrand();
    let mut acc = 0.0;
    for (i, p) in probabilities.iter().enumerate() {
        acc += p;
        if u < acc {
            return i;
        }
    }
    probabilities.len() - 1
}

/// Numeric domain mapped to the space the densities live in.
struct Bounds {
    low: f64,
    high: f64,
    log: bool,
}

impl Bounds {
    fn new(low: f64, high: f64, log: bool, integer: bool) -> Self {
        let (low, high) = if integer { (low - 0.5, high + 0.5) } else { (low, high) };
        let low = if log { low.max(f64::MIN_POSITIVE) } else { low };
        if log {
            Self {
                low: low.ln(),
                high: high.ln(),
                log,
            }
        } else {
            Self { low, high, log }
        }
    }

    fn to_internal(&self, v: f64) -> f64 {
        let v = if self.log { v.max(f64::MIN_POSITIVE).ln() } else { v };
        v.clamp(self.low, self.high)
    }

    fn to_external(&self, v: f64) -> f64 {
        if self.log { v.exp() } else { v }
    }
}

/// Equal-weight mixture of truncated Gaussians plus a flat-ish prior.
struct Parzen {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
    low: f64,
    high: f64,
}

impl Parzen {
    fn fit(bounds: &Bounds, observed: &[&ParamValue]) -> Self {
        let range = bounds.high - bounds.low;
        let mut points: Vec<f64> = observed
            .iter()
            .filter_map(|v| match v {
                ParamValue::Float(x) => Some(*x),
                ParamValue::Int(i) => Some(*i as f64),
                _ => None,
            })
            .map(|v| bounds.to_internal(v))
            .collect();
        points.sort_by(f64::total_cmp);

        let n = points.len();
        let min_sigma = range / (n as f64 + 1.0).min(100.0);
        let mut mus = Vec::with_capacity(n + 1);
        let mut sigmas = Vec::with_capacity(n + 1);
        for (i, &x) in points.iter().enumerate() {
            let left = if i == 0 { bounds.low } else { points[i - 1] };
            let right = if i + 1 == n { bounds.high } else { points[i + 1] };
            mus.push(x);
            sigmas.push((x - left).max(right - x).clamp(min_sigma, range));
        }
        mus.push(0.5 * (bounds.low + bounds.high));
        sigmas.push(range);

        Self {
            mus,
            sigmas,
            low: bounds.low,
            high: bounds.high,
        }
    }

    fn sample(&self, rng: &mut Mwc256) -> f64 {
        let k = rng.below(self.mus.len());
        if self.high <= self.low {
            return self.low;
        }
        for _ in 0..100 {
            let x = self.mus[k] + self.sigmas[k] * rng.normal();
            if x >= self.low && x <= self.high {
                return x;
            }
        }
        self.low + rng.unifrand() * (self.high - self.low)
    }

    fn log_density(&self, x: f64) -> f64 {
        if self.high <= self.low {
            return 0.0;
        }
        let total: f64 = self
            .mus
            .iter()
            .zip(&self.sigmas)
            .map(|(&mu, &sigma)| stats::truncated_normal_pdf(x, mu, sigma, self.low, self.high))
            .sum();
        (total / self.mus.len() as f64).max(1.0e-300).ln()
    }
}
