//! Peak and fitness flags.
//!
//! Within one (cluster, satellite) light curve:
//!
//! - [`mark_higher_energies`] keeps a single detection per time step, the one with the
//!   highest energy (`is_peak_for_time`),
//! - [`mark_bad_points`] walks the time ordered peaks forward and backward with
//!   [`energy_filter`] and clears `fitness` on the points that are a sudden energy drop in
//!   both directions.
//!
//! Rises are never flagged so that the onset of a bright event is preserved.

use ahash::AHashMap;

use crate::constants::{
    Joule, ENERGY_FILTER_MAX_DROP, ENERGY_FILTER_MIN_DIFF, ENERGY_FILTER_WIDTH,
};
use crate::detections::stats::{argsort, ptp};
use crate::detections::DetectionSet;

/// Walking direction of [`energy_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

/// Flag the sudden energy drops of a light curve.
///
/// The curve is walked in `direction`. A running mean of the absolute energy difference
/// between consecutive valid points is maintained over `filter_width` points, seeded with
/// the peak to peak amplitude of the first `filter_width` points. A point whose drop from
/// the last valid point exceeds `max_valid_drop` times that mean is flagged; the mean is
/// doubled when the flagged point is more than `filter_width` steps away from the last valid
/// point, so that a genuine level change is eventually accepted.
///
/// Arguments
/// ---------
/// * `energies`: light curve, sorted by time
/// * `direction`: walking direction
/// * `filter_width`: length of the running mean
/// * `max_valid_drop`: ratio between a drop and the running mean above which a point is
///   flagged
///
/// Return
/// ------
/// * `true` for valid points, co-indexed with `energies`
pub fn energy_filter(
    energies: &[Joule],
    direction: ScanDirection,
    filter_width: usize,
    max_valid_drop: f64,
) -> Vec<bool> {
    let n = energies.len();
    let mut fitness = vec![true; n];
    if n <= 1 {
        return fitness;
    }

    let walk: Vec<usize> = match direction {
        ScanDirection::Forward => (0..n).collect(),
        ScanDirection::Backward => (0..n).rev().collect(),
    };

    let seed: Vec<f64> = walk
        .iter()
        .take(filter_width.max(1))
        .map(|&i| energies[i])
        .collect();
    let mut last_diff = ptp(&seed).unwrap_or(0.0);
    let mut last_checked = 0;

    for step in 1..n {
        let point = walk[step];
        let delta = energies[point] - energies[walk[last_checked]];

        if delta < 0.0 && delta.abs() > max_valid_drop * last_diff {
            fitness[point] = false;
            if step - last_checked > filter_width {
                last_diff *= 2.0;
            }
        } else {
            last_checked = step;
            let width = filter_width as f64;
            last_diff = (((width - 1.0) * last_diff + delta.abs()) / width).max(ENERGY_FILTER_MIN_DIFF);
        }
    }
    fitness
}

/// Flag, per (cluster, satellite) and per distinct time, the highest energy detection.
///
/// Ties are resolved on the first detection in set order. Flags of detections outside the
/// live clusters are left untouched.
pub fn mark_higher_energies(set: &mut DetectionSet) {
    for cluster in set.live_cluster_ids() {
        let indices = set.cluster_indices(cluster);
        for sat in set.satellites_of(&indices) {
            let curve = set.indices_for_satellite(&indices, sat);

            let mut best: AHashMap<u64, usize> = AHashMap::with_capacity(curve.len());
            for &i in &curve {
                let d = &set.detections()[i];
                best.entry(d.time.to_bits())
                    .and_modify(|current| {
                        if d.energy > set.detections()[*current].energy {
                            *current = i;
                        }
                    })
                    .or_insert(i);
            }

            let detections = set.detections_mut();
            for &i in &curve {
                detections[i].is_peak_for_time = false;
            }
            for &i in best.values() {
                detections[i].is_peak_for_time = true;
            }
        }
    }
}

/// Clear the fitness of the peak detections that are a sudden energy drop in both walking
/// directions (see [`energy_filter`]).
///
/// Must run after [`mark_higher_energies`]; detections that are not peaks keep their fitness.
pub fn mark_bad_points(set: &mut DetectionSet) {
    for cluster in set.live_cluster_ids() {
        let indices = set.cluster_indices(cluster);
        for sat in set.satellites_of(&indices) {
            let peaks: Vec<usize> = set
                .indices_for_satellite(&indices, sat)
                .into_iter()
                .filter(|&i| set.detections()[i].is_peak_for_time)
                .collect();
            if peaks.is_empty() {
                continue;
            }

            let times: Vec<f64> = peaks.iter().map(|&i| set.detections()[i].time).collect();
            let ordered: Vec<usize> = argsort(&times).into_iter().map(|k| peaks[k]).collect();
            let energies: Vec<f64> = ordered.iter().map(|&i| set.detections()[i].energy).collect();

            let forward = energy_filter(
                &energies,
                ScanDirection::Forward,
                ENERGY_FILTER_WIDTH,
                ENERGY_FILTER_MAX_DROP,
            );
            let backward = energy_filter(
                &energies,
                ScanDirection::Backward,
                ENERGY_FILTER_WIDTH,
                ENERGY_FILTER_MAX_DROP,
            );

            let detections = set.detections_mut();
            for (k, &i) in ordered.iter().enumerate() {
                detections[i].fitness = forward[k] || backward[k];
            }
        }
    }
}
