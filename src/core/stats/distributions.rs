use std::f64::consts::PI;

// ============================================================================
// Normal PDF
// ============================================================================

pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

// ============================================================================
// Normal CDF - Accurate to 7.5e-8
// ============================================================================

pub fn normal_cdf(z: f64) -> f64 {
    let zz = z.abs();
    let pdf = normal_pdf(zz);
    let t = 1.0 / (1.0 + zz * 0.2316419);
    let poly = ((((1.330274429 * t - 1.821255978) * t + 1.781477937) * t
        - 0.356563782) * t
        + 0.319381530)
        * t;
    if z > 0.0 {
        1.0 - pdf * poly
    } else {
        pdf * poly
    }
}

// ============================================================================
// Truncated normal
// ============================================================================

/// Probability mass of N(mu, sigma) inside [low, high].
pub fn normal_mass(mu: f64, sigma: f64, low: f64, high: f64) -> f64 {
    normal_cdf((high - mu) / sigma) - normal_cdf((low - mu) / sigma)
}

/// Density at `x` of N(mu, sigma) truncated to [low, high].
/// Returns 0 outside the interval.
pub fn truncated_normal_pdf(x: f64, mu: f64, sigma: f64, low: f64, high: f64) -> f64 {
    if x < low || x > high {
        return 0.0;
    }
    let mass = normal_mass(mu, sigma, low, high).max(1.0e-300);
    normal_pdf((x - mu) / sigma) / (sigma * mass)
}
