//! Cluster ranking.
//!
//! The rank of a cluster is the length of the longest run of consecutive samples of its light
//! curve above a minimum energy, once the curve background has been removed. A meteor gives
//! a long continuous curve, lightning a few short bursts.

use log::debug;
use serde::Serialize;

use crate::constants::{ClusterId, Joule, RANK_BASELINE_FRACTION};
use crate::detections::stats::{argsort, median};
use crate::detections::DetectionSet;

/// Rank of one live cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterRank {
    pub cluster: ClusterId,
    pub rank: usize,
}

/// Length of the longest run of values strictly above `threshold`.
///
/// A run survives `max_mistakes` values at or below the threshold; the next one ends it. With
/// `max_mistakes == 0` any such value ends the run.
///
/// Arguments
/// ---------
/// * `values`: samples sorted by time
/// * `threshold`: minimum value
/// * `max_mistakes`: number of tolerated misses per run
pub fn continuous_above_min(values: &[f64], threshold: f64, max_mistakes: usize) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut mistakes = 0;

    for &v in values {
        if v > threshold {
            current += 1;
            longest = longest.max(current);
        } else if mistakes < max_mistakes {
            mistakes += 1;
        } else {
            mistakes = 0;
            current = 0;
        }
    }
    longest
}

/// Background level of a light curve: median of its lowest 10 % samples (at least one).
pub fn light_curve_baseline(energies: &[Joule]) -> Option<Joule> {
    let sorted: Vec<f64> = argsort(energies).into_iter().map(|i| energies[i]).collect();
    let count = (sorted.len() as f64 * RANK_BASELINE_FRACTION).ceil() as usize;
    median(&sorted[..count.min(sorted.len())])
}

/// Rank every live cluster.
///
/// For each satellite of a cluster, the fit peak detections (see
/// [`peak_fitness`](crate::filters::peak_fitness)) are sorted by time and their baseline
/// corrected energies are scored with [`continuous_above_min`] without tolerated misses.
/// Satellites contributing fewer than two such detections are ignored. The best satellite
/// gives the cluster rank.
///
/// Arguments
/// ---------
/// * `set`: the detection set
/// * `min_energy`: minimum baseline corrected energy of a run sample
///
/// Return
/// ------
/// * one entry per live cluster, in ascending cluster id
pub fn rank_clusters(set: &DetectionSet, min_energy: Joule) -> Vec<ClusterRank> {
    set.live_cluster_ids()
        .into_iter()
        .map(|cluster| {
            let indices = set.cluster_indices(cluster);
            let rank = set
                .satellites_of(&indices)
                .iter()
                .filter_map(|&sat| {
                    let curve: Vec<usize> = set
                        .indices_for_satellite(&indices, sat)
                        .into_iter()
                        .filter(|&i| {
                            let d = &set.detections()[i];
                            d.is_peak_for_time && d.fitness
                        })
                        .collect();
                    if curve.len() < 2 {
                        return None;
                    }

                    let times: Vec<f64> = curve.iter().map(|&i| set.detections()[i].time).collect();
                    let energies: Vec<f64> = argsort(&times)
                        .into_iter()
                        .map(|k| set.detections()[curve[k]].energy)
                        .collect();
                    let baseline = light_curve_baseline(&energies)?;
                    let corrected: Vec<f64> = energies.iter().map(|e| e - baseline).collect();
                    Some(continuous_above_min(&corrected, min_energy, 0))
                })
                .max()
                .unwrap_or(0);

            debug!("cluster {cluster} rank: {rank}");
            ClusterRank { cluster, rank }
        })
        .collect()
}
