//! Descriptive statistics over flux samples
//!
//! Conventions are fixed so extracted columns match the fitted scaler:
//! - variance / std are population moments (divide by n)
//! - skewness is the biased Fisher-Pearson coefficient `m3 / m2^1.5`
//! - kurtosis is the biased excess kurtosis `m4 / m2^2 - 3`
//! - percentiles interpolate linearly at rank `p / 100 * (n - 1)`
//!
//! All functions return 0.0 for an empty slice. Callers in this crate only
//! pass validated, non-empty series.

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    central_moment(values, 2)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between the two closest ranks.
///
/// `p` is clamped to `[0, 100]`.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, p)
}

/// Percentile over an already ascending slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Biased sample skewness. Zero for a degenerate (constant) series.
pub fn skewness(values: &[f64]) -> f64 {
    let m2 = central_moment(values, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(values, 3) / m2.powf(1.5)
}

/// Biased excess kurtosis (normal distribution = 0). Zero for a constant series.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let m2 = central_moment(values, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(values, 4) / (m2 * m2) - 3.0
}

fn central_moment(values: &[f64], order: i32) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    values.iter().map(|v| (v - mu).powi(order)).sum::<f64>() / values.len() as f64
}
