/*
Descriptive statistics over slices. Empty input yields NaN so callers can
decide whether that is an error.
*/

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation (divides by n).
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let m = mean(data);
    let ss: f64 = data.iter().map(|&x| (x - m) * (x - m)).sum();
    (ss / data.len() as f64).sqrt()
}

pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Median absolute deviation from the median.
pub fn median_abs_deviation(data: &[f64]) -> f64 {
    let med = median(data);
    let devs: Vec<f64> = data.iter().map(|&x| (x - med).abs()).collect();
    median(&devs)
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(&a, &p)| (a - p).abs())
        .sum::<f64>()
        / n as f64
}

pub fn find_min_max(data: &[f64]) -> (f64, f64) {
    let mut min_val = f64::INFINITY;
    let mut max_val = f64::NEG_INFINITY;

    for &val in data {
        if val < min_val {
            min_val = val;
        }
        if val > max_val {
            max_val = val;
        }
    }

    (min_val, max_val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&x) - 5.0).abs() < 1e-12);
        assert!((std_dev(&x) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_mad() {
        let x = [1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        assert_eq!(median_abs_deviation(&x), 1.0);
    }

    #[test]
    fn test_mean_absolute_error() {
        let mae = mean_absolute_error(&[1.0, 2.0, 3.0], &[2.0, 2.0, 1.0]);
        assert!((mae - 1.0).abs() < 1e-12);
    }
}
