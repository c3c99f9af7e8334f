use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result, TrainError};

/// A concrete hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x:.6}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Domain descriptor of one hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    Float {
        low: f64,
        high: f64,
        #[serde(default)]
        log: bool,
    },
    Int {
        low: i64,
        high: i64,
        #[serde(default)]
        log: bool,
    },
    Categorical {
        choices: Vec<ParamValue>,
    },
}

impl Domain {
    pub fn float(low: f64, high: f64) -> Self {
        Domain::Float { low, high, log: false }
    }

    pub fn log_float(low: f64, high: f64) -> Self {
        Domain::Float { low, high, log: true }
    }

    pub fn int(low: i64, high: i64) -> Self {
        Domain::Int { low, high, log: false }
    }

    pub fn categorical(choices: Vec<ParamValue>) -> Self {
        Domain::Categorical { choices }
    }

    pub fn boolean() -> Self {
        Domain::Categorical {
            choices: vec![ParamValue::Bool(true), ParamValue::Bool(false)],
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        let bad = |reason: String| Err(TrainError::SearchSpace(format!("`{name}`: {reason}")));
        match self {
            Domain::Float { low, high, log } => {
                if !low.is_finite() || !high.is_finite() {
                    return bad("bounds must be finite".into());
                }
                if low > high {
                    return bad(format!("inverted range [{low}, {high}]"));
                }
                if *log && *low <= 0.0 {
                    return bad(format!("log scale needs a positive lower bound, got {low}"));
                }
            }
            Domain::Int { low, high, log } => {
                if low > high {
                    return bad(format!("inverted range [{low}, {high}]"));
                }
                if *log && *low <= 0 {
                    return bad(format!("log scale needs a positive lower bound, got {low}"));
                }
            }
            Domain::Categorical { choices } => {
                if choices.is_empty() {
                    return bad("empty categorical set".into());
                }
            }
        }
        Ok(())
    }

    /// Whether `value` lies in this domain.
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Domain::Float { low, high, .. }, ParamValue::Float(x)) => x >= low && x <= high,
            (Domain::Int { low, high, .. }, ParamValue::Int(i)) => i >= low && i <= high,
            (Domain::Categorical { choices }, v) => choices.contains(v),
            _ => false,
        }
    }
}

/// Named hyperparameter domains, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    domains: BTreeMap<String, Domain>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, domain: Domain) -> Self {
        self.domains.insert(name.to_string(), domain);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Domain)> {
        self.domains.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Reject malformed domains before any trial runs.
    pub fn validate(&self) -> Result<()> {
        self.domains.iter().try_for_each(|(name, domain)| domain.check(name))
    }

    /// Whether `config` assigns an in-domain value to every entry.
    pub fn admits(&self, config: &Configuration) -> bool {
        self.domains
            .iter()
            .all(|(name, domain)| config.get(name).is_some_and(|v| domain.contains(v)))
    }
}

/// Concrete assignment of values to hyperparameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, ParamValue>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    /// Numeric value, falling back to `default` when absent.
    pub fn f64_or(&self, name: &str, default: f64) -> std::result::Result<f64, FitError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(x)) => Ok(*x),
            Some(ParamValue::Int(i)) => Ok(*i as f64),
            Some(other) => Err(mistyped(name, "a number", other)),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> std::result::Result<usize, FitError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(i)) if *i >= 0 => Ok(*i as usize),
            Some(other) => Err(mistyped(name, "a non-negative integer", other)),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> std::result::Result<bool, FitError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(other) => Err(mistyped(name, "a boolean", other)),
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn mistyped(name: &str, expected: &str, got: &ParamValue) -> FitError {
    FitError::InvalidHyperparameter {
        name: name.to_string(),
        reason: format!("expected {expected}, got {got}"),
    }
}
