use matlib::Mwc256;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Configuration, Domain, ParamValue, SearchSpace, TpeProposer, Trial};

/// Strategy that picks the next configuration to evaluate.
///
/// Implementations may keep internal state but must be deterministic for a
/// given seed and history.
pub trait Proposer {
    fn propose(&mut self, space: &SearchSpace, history: &[Trial]) -> Configuration;

    fn name(&self) -> &'static str;
}

impl<P: Proposer + ?Sized> Proposer for Box<P> {
    fn propose(&mut self, space: &SearchSpace, history: &[Trial]) -> Configuration {
        (**self).propose(space, history)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Proposer selection for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    #[default]
    Tpe,
    Random,
}

impl SearchStrategy {
    pub fn build(self, seed: u64) -> Box<dyn Proposer> {
        match self {
            SearchStrategy::Tpe => Box::new(TpeProposer::new(seed)),
            SearchStrategy::Random => Box::new(RandomProposer::new(seed)),
        }
    }
}

/// Independent uniform draws from every domain.
#[derive(Clone)]
pub struct RandomProposer {
    rng: Mwc256,
}

impl RandomProposer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mwc256::with_seed(seed),
        }
    }
}

impl Proposer for RandomProposer {
    fn propose(&mut self, space: &SearchSpace, _history: &[Trial]) -> Configuration {
        sample_space(space, &mut self.rng)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

pub(crate) fn sample_space(space: &SearchSpace, rng: &mut Mwc256) -> Configuration {
    let mut config = Configuration::new();
    for (name, domain) in space.iter() {
        config.insert(name, sample_domain(domain, rng));
    }
    config
}

/// Uniform (or log-uniform) draw from one domain.
pub(crate) fn sample_domain(domain: &Domain, rng: &mut Mwc256) -> ParamValue {
    match domain {
        Domain::Float { low, high, log: false } => ParamValue::Float(low + rng.unifrand() * (high - low)),
        Domain::Float { low, high, log: true } => {
            let (a, b) = (low.ln(), high.ln());
            ParamValue::Float((a + rng.unifrand() * (b - a)).exp().clamp(*low, *high))
        }
        Domain::Int { low, high, log: false } => ParamValue::Int(rng.gen_range(*low..=*high)),
        Domain::Int { low, high, log: true } => {
            let (a, b) = ((*low as f64 - 0.5).max(0.5).ln(), (*high as f64 + 0.5).ln());
            let v = (a + rng.unifrand() * (b - a)).exp().round() as i64;
            ParamValue::Int(v.clamp(*low, *high))
        }
        Domain::Categorical { choices } => choices[rng.below(choices.len())].clone(),
    }
}
