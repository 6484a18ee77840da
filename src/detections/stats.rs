//! Small order statistics over `f64` slices.
//!
//! Ties are always resolved on the **first** occurrence, which is what the cluster
//! filters rely on when several detections share the same energy or time.

use itertools::Itertools;

/// Index of the first maximum.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Index of the first minimum.
pub fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v >= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Stable ascending argsort.
pub fn argsort(values: &[f64]) -> Vec<usize> {
    (0..values.len())
        .sorted_by(|&a, &b| values[a].total_cmp(&values[b]))
        .collect()
}

/// Percentile with linear interpolation between the closest ranks.
///
/// Arguments
/// ---------
/// * `values`: samples, in any order
/// * `q`: percentile in `[0, 100]`
///
/// Return
/// ------
/// * `None` for an empty slice
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted: Vec<f64> = values.iter().copied().sorted_by(f64::total_cmp).collect();

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Median (mean of the two central values for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (one delta degree of freedom).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Peak to peak amplitude.
pub fn ptp(values: &[f64]) -> Option<f64> {
    let (min, max) = values.iter().copied().minmax_by(f64::total_cmp).into_option()?;
    Some(max - min)
}

#[cfg(test)]
mod stats_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_occurrence() {
        let v = [1.0, 3.0, 2.0, 3.0, 0.5, 0.5];
        assert_eq!(argmax(&v), Some(1));
        assert_eq!(argmin(&v), Some(4));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argsort_is_stable() {
        let v = [2.0, 1.0, 2.0, 0.0, 1.0];
        assert_eq!(argsort(&v), vec![3, 1, 4, 0, 2]);
    }

    #[test]
    fn test_percentile_linear() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(percentile(&v, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&v, 100.0).unwrap(), 4.0);
        assert_relative_eq!(percentile(&v, 90.0).unwrap(), 3.7);
        assert_relative_eq!(median(&v).unwrap(), 2.5);
        assert_relative_eq!(median(&[5.0, 1.0, 3.0]).unwrap(), 3.0);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_moments() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v).unwrap(), 5.0);
        assert_relative_eq!(sample_std(&v).unwrap(), (32.0_f64 / 7.0).sqrt());
        assert_eq!(sample_std(&[1.0]), None);
        assert_relative_eq!(ptp(&v).unwrap(), 7.0);
        assert_eq!(ptp(&[]), None);
    }
}
