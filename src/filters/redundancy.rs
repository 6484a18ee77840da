//! Cross-window deduplication.
//!
//! Consecutive runs are requested every half file and each loads two files: the one holding
//! the target time plus the neighbour on the side of the target (previous file for a target
//! in the first half, next file otherwise). Any cluster is therefore visible in two runs and
//! exactly one of them must report it.
//!
//! 1. Clusters touching the outer boundary of the loaded files are rejected: they may be
//!    truncated. The boundary is `cluster_time` wide, plus half a file on the side that the
//!    neighbouring window owns.
//! 2. The remaining clusters are bucketed against the midpoint of the loaded files. With a
//!    target in the latter half a cluster belongs to the first file when it *starts* before
//!    `mid + cluster_time`; with a target in the first half it belongs to the second file
//!    when it *ends* after `mid - cluster_time`.
//! 3. The bucket owned by the neighbouring window is rejected: the second file bucket for a
//!    target in the latter half, the first file bucket otherwise.
//!
//! The half of the **target time** decides the bucketing of every cluster, not the position
//! of the cluster itself.

use ahash::AHashSet;
use log::debug;

use crate::constants::{ClusterId, Second, UnixSeconds};
use crate::detections::DetectionSet;
use crate::time::in_file_latter_half;

/// Reject the clusters another processing window is responsible for.
///
/// Arguments
/// ---------
/// * `set`: the detection set, mutated in place
/// * `target_time`: the requested event time (Unix seconds)
/// * `cluster_time`: the clustering time distance in seconds
/// * `process_interval`: length of one GLM file in seconds
/// * `process_time_size`: length of the processing window in seconds
pub fn mark_redundant_clusters(
    set: &mut DetectionSet,
    target_time: UnixSeconds,
    cluster_time: Second,
    process_interval: Second,
    process_time_size: Second,
) {
    let latter_half = in_file_latter_half(target_time, process_interval);
    let base = set.base_time();
    let (files_start, files_end) = (set.files_start(), set.files_end());
    let half_window = process_time_size / 2.0;

    let is_outer = |t: UnixSeconds| {
        if latter_half {
            t <= files_start + cluster_time || t >= files_end - half_window - cluster_time
        } else {
            t <= files_start + half_window + cluster_time || t >= files_end - cluster_time
        }
    };

    let outer: AHashSet<ClusterId> = set
        .detections()
        .iter()
        .filter(|d| is_outer(base + d.time))
        .filter_map(|d| d.cluster.live_id())
        .collect();
    for &cluster in &outer {
        set.reject_cluster(cluster);
    }

    let file_mid = (files_start + files_end) / 2.0;
    let mut redundant = vec![];
    for cluster in set.live_cluster_ids() {
        let times = set
            .cluster_indices(cluster)
            .into_iter()
            .map(|i| base + set.detections()[i].time);

        let owned_by_neighbour = if latter_half {
            let start = times.fold(f64::INFINITY, f64::min);
            start >= file_mid + cluster_time
        } else {
            let end = times.fold(f64::NEG_INFINITY, f64::max);
            end <= file_mid - cluster_time
        };
        if owned_by_neighbour {
            redundant.push(cluster);
        }
    }
    for &cluster in &redundant {
        set.reject_cluster(cluster);
    }

    debug!(
        "redundancy filter: {} boundary clusters and {} redundant clusters rejected ({} remain)",
        outer.len(),
        redundant.len(),
        set.count_live_clusters()
    );
}
