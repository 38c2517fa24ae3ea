//! Descriptive statistics and kernel density utilities.
//!
//! Pure functions. Empty input yields `None`; constant samples have zero spread.
//! Bandwidths never drop below [`BANDWIDTH_FLOOR`] so the kernels stay finite.

use std::f64::consts::PI;

/// Smallest bandwidth component handed to a kernel.
pub const BANDWIDTH_FLOOR: f64 = 1e-3;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance.
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((sum_sq / values.len() as f64).max(0.0))
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Median; the mean of the two central values for even-length input.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Quantile by linear interpolation on the 1-based rank `p * (n + 1)`, clamped to `[1, n]`.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || p.is_nan() {
        return None;
    }
    let sorted = sorted(values);
    let n = sorted.len();
    let rank = (p.clamp(0.0, 1.0) * (n as f64 + 1.0)).clamp(1.0, n as f64);
    let lower = rank.floor() as usize;
    let frac = rank - lower as f64;
    let lo = sorted[lower - 1];
    if lower >= n {
        return Some(lo);
    }
    Some(lo + frac * (sorted[lower] - lo))
}

/// Interquartile range.
pub fn iqr(values: &[f64]) -> Option<f64> {
    Some(quantile(values, 0.75)? - quantile(values, 0.25)?)
}

/// Standard normal density.
pub fn gaussian_kernel(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Silverman's rule of thumb for a univariate bandwidth.
pub fn silverman_bandwidth(values: &[f64]) -> Option<f64> {
    let std = std_dev(values)?;
    let spread = iqr(values)? / 1.34;
    let scale = if spread > 0.0 { std.min(spread) } else { std };
    let h = 0.9 * scale * (values.len() as f64).powf(-0.2);
    Some(h.max(BANDWIDTH_FLOOR))
}

/// Per-dimension Scott bandwidth: `n^(-1/(d+4)) * std_i`.
///
/// Returns the diagonal of the bandwidth matrix. Samples must share a dimension.
pub fn scott_bandwidth(samples: &[Vec<f64>]) -> Option<Vec<f64>> {
    let first = samples.first()?;
    let d = first.len();
    if d == 0 || samples.iter().any(|s| s.len() != d) {
        return None;
    }
    let factor = (samples.len() as f64).powf(-1.0 / (d as f64 + 4.0));
    let mut column = Vec::with_capacity(samples.len());
    let mut bandwidth = Vec::with_capacity(d);
    for i in 0..d {
        column.clear();
        column.extend(samples.iter().map(|s| s[i]));
        let std = std_dev(&column)?;
        bandwidth.push((factor * std).max(BANDWIDTH_FLOOR));
    }
    Some(bandwidth)
}

/// Multivariate Gaussian kernel with diagonal bandwidth `h` (covariance `diag(h_i^2)`).
pub fn multivariate_gaussian_kernel(x: &[f64], bandwidth: &[f64]) -> Option<f64> {
    if x.len() != bandwidth.len() || x.is_empty() {
        return None;
    }
    let d = x.len() as f64;
    let mut log_det = 0.0;
    let mut mahalanobis = 0.0;
    for (xi, hi) in x.iter().zip(bandwidth) {
        let h = hi.abs().max(BANDWIDTH_FLOOR);
        log_det += 2.0 * h.ln();
        mahalanobis += (xi / h).powi(2);
    }
    let log_norm = -0.5 * d * (2.0 * PI).ln() - 0.5 * log_det;
    Some((log_norm - 0.5 * mahalanobis).exp())
}

/// Kernel density estimate at `point` over `samples`.
pub fn kernel_density(point: &[f64], samples: &[Vec<f64>], bandwidth: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut diff = vec![0.0; point.len()];
    let mut total = 0.0;
    for sample in samples {
        if sample.len() != point.len() {
            return None;
        }
        for ((d, p), s) in diff.iter_mut().zip(point).zip(sample) {
            *d = p - s;
        }
        total += multivariate_gaussian_kernel(&diff, bandwidth)?;
    }
    Some(total / samples.len() as f64)
}

/// Edit distance between two sequences.
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, x) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(x != y);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FLAT: [f64; 4] = [10.0, 10.0, 10.0, 10.0];
    const MIXED: [f64; 7] = [10.0, 0.0, 2.0, 3.0, 12.0, 5.0, 17.0];

    fn round2(x: f64) -> f64 {
        (x * 100.0).round() / 100.0
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&FLAT), Some(10.0));
        assert_eq!(mean(&MIXED), Some(7.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_variance_and_std() {
        assert_eq!(variance(&FLAT), Some(0.0));
        assert_eq!(round2(variance(&MIXED).unwrap()), 32.57);
        assert_eq!(std_dev(&FLAT), Some(0.0));
        let v = variance(&MIXED).unwrap();
        assert_eq!(std_dev(&MIXED), Some(v.sqrt()));
        assert_eq!(variance(&[3.0]), Some(0.0));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0, 5.0]), Some(3.0));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
    }

    #[test]
    fn test_iqr() {
        assert_eq!(iqr(&[1.0, 2.0, 3.0, 4.0, 5.0]), Some(3.0));
        assert_eq!(iqr(&FLAT), Some(0.0));
        assert_eq!(iqr(&[4.0]), Some(0.0));
    }

    #[test]
    fn test_gaussian_kernel_peak() {
        assert!((gaussian_kernel(0.0) - 1.0 / (2.0 * PI).sqrt()).abs() < 1e-12);
        assert!(gaussian_kernel(3.0) < gaussian_kernel(1.0));
    }

    #[test]
    fn test_multivariate_matches_univariate() {
        let k = multivariate_gaussian_kernel(&[0.5], &[1.0]).unwrap();
        assert!((k - gaussian_kernel(0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_scott_bandwidth_constant_column_floors() {
        let samples = vec![vec![1.0, 0.0], vec![1.0, 2.0], vec![1.0, 4.0]];
        let h = scott_bandwidth(&samples).unwrap();
        assert_eq!(h[0], BANDWIDTH_FLOOR);
        let expected = 3f64.powf(-1.0 / 6.0) * std_dev(&[0.0, 2.0, 4.0]).unwrap();
        assert!((h[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_density_is_finite_for_identical_samples() {
        let samples = vec![vec![2.0, 2.0]; 5];
        let h = scott_bandwidth(&samples).unwrap();
        let density = kernel_density(&[2.0, 2.0], &samples, &h).unwrap();
        assert!(density.is_finite());
        assert!(density > 0.0);
    }

    #[test]
    fn test_silverman_positive() {
        assert!(silverman_bandwidth(&MIXED).unwrap() > 0.0);
        assert_eq!(silverman_bandwidth(&FLAT), Some(BANDWIDTH_FLOOR));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein(b"kitten", b"sitting"), 3);
        assert_eq!(levenshtein::<u8>(b"", b"abc"), 3);
        assert_eq!(levenshtein(b"same", b"same"), 0);
    }

    proptest! {
        #[test]
        fn prop_variance_non_negative(values in prop::collection::vec(-1e6f64..1e6, 1..50)) {
            let v = variance(&values).unwrap();
            prop_assert!(v >= 0.0);
            prop_assert!((std_dev(&values).unwrap() - v.sqrt()).abs() < 1e-9);
        }

        #[test]
        fn prop_median_within_range(values in prop::collection::vec(-1e3f64..1e3, 1..50)) {
            let m = median(&values).unwrap();
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(m >= lo && m <= hi);
        }
    }
}
