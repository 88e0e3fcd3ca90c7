// src/analysis/robust_stats.rs
//
// Small order statistics used by the flow estimator and the motion windows.
// Landmark flow is noisy: single anchors regularly jump when the tracker
// locks onto background texture, so aggregates are medians, and the
// per-frame flow median is re-taken after an IQR fence.

/// Multiplier applied to the IQR when fencing outliers
pub const IQR_FENCE: f32 = 1.5;

const MIN_IQR: f32 = 1e-6;

fn sorted(values: &[f32]) -> Vec<f32> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v
}

fn median_of_sorted(v: &[f32]) -> f32 {
    let n = v.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) * 0.5
    }
}

/// Linear-interpolated percentile of already sorted data, `p` in [0, 100]
fn percentile_of_sorted(v: &[f32], p: f32) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (v.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    v[lo] + (v[hi] - v[lo]) * (rank - lo as f32)
}

/// Median; the mean of the two middle values for even counts. Empty → 0.
pub fn median(values: &[f32]) -> f32 {
    median_of_sorted(&sorted(values))
}

pub fn percentile(values: &[f32], p: f32) -> f32 {
    percentile_of_sorted(&sorted(values), p)
}

/// Median after discarding samples farther than 1.5×IQR from the raw median.
/// Falls back to the raw median if the fence rejects everything.
pub fn robust_median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let v = sorted(values);
    let med = median_of_sorted(&v);
    let q1 = percentile_of_sorted(&v, 25.0);
    let q3 = percentile_of_sorted(&v, 75.0);
    let iqr = (q3 - q1).max(MIN_IQR);
    let fence = IQR_FENCE * iqr;

    let kept: Vec<f32> = v.into_iter().filter(|x| (x - med).abs() <= fence).collect();
    if kept.is_empty() {
        med
    } else {
        median_of_sorted(&kept)
    }
}

/// True when at least `min_count` samples are strictly positive, or at
/// least `min_count` are strictly negative.
pub fn consistent_sign<'a, I>(values: I, min_count: usize) -> bool
where
    I: IntoIterator<Item = &'a f32>,
{
    let mut pos = 0;
    let mut neg = 0;
    for &v in values {
        if v > 0.0 {
            pos += 1;
        } else if v < 0.0 {
            neg += 1;
        }
    }
    (pos + neg) > 0 && (pos >= min_count || neg >= min_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 25.0), 2.0);
        assert_eq!(percentile(&v, 75.0), 4.0);
        // rank 0.75 between 1 and 2
        assert!((percentile(&[1.0, 2.0], 75.0) - 1.75).abs() < 1e-6);
    }

    #[test]
    fn test_robust_median_drops_extreme_outlier() {
        let deltas = [2.0, 2.1, 1.9, 2.0, 2.2, 1.8, 2.0, 2.1, 500.0];
        let plain_mean = deltas.iter().sum::<f32>() / deltas.len() as f32;
        let robust = robust_median(&deltas);
        assert!((robust - 2.0).abs() < 0.11, "robust={}", robust);
        assert!(plain_mean > 50.0);
    }

    #[test]
    fn test_robust_median_identical_values() {
        assert_eq!(robust_median(&[3.0, 3.0, 3.0]), 3.0);
        assert_eq!(robust_median(&[7.5]), 7.5);
        assert_eq!(robust_median(&[]), 0.0);
    }

    #[test]
    fn test_consistent_sign() {
        assert!(consistent_sign(&[1.0, 2.0, 0.5, 3.0], 4));
        assert!(!consistent_sign(&[1.0, 2.0, -0.5, 3.0], 4));
        assert!(consistent_sign(&[-1.0, -2.0, -0.5, -3.0], 4));
        assert!(!consistent_sign(&[0.0, 0.0, 0.0, 0.0], 4));
        assert!(!consistent_sign(&[1.0, 1.0, 1.0], 4));
    }
}
