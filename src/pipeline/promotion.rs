use serde::{Deserialize, Serialize};

/// Promotes a model only when it beats the baseline by a relative margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionGate {
    threshold: f64,
}

impl PromotionGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn admits(&self, baseline_error: f64, final_error: f64) -> bool {
        decide(baseline_error, final_error, self.threshold)
    }
}

/// `final_error <= baseline_error * (1 - threshold)`. Non-finite errors never promote.
pub fn decide(baseline_error: f64, final_error: f64, threshold: f64) -> bool {
    if !baseline_error.is_finite() || !final_error.is_finite() {
        return false;
    }
    final_error <= baseline_error * (1.0 - threshold)
}
