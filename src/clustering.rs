//! # Clustering engine
//!
//! Incremental connected-components clustering of GLM groups.
//!
//! ## Algorithm
//!
//! Detections are visited in ascending time order with a running cluster counter:
//!
//! 1. an unassigned detection opens a new cluster,
//! 2. every detection, except the last one in time, collects the candidates that are
//!    - within `[t, t + time_distance]`,
//!    - inside a coarse lat/lon box (`3 ×` the cluster distance in latitude, `7.5 ×` in
//!      longitude, at 111 km per degree scaled by `cos(lat)`),
//!    - not already in its cluster,
//! 3. each candidate whose line of sight segment passes within `cluster_distance` of the
//!    current one (see [`closest_distance_between_segments`]) joins the current cluster. If the
//!    candidate already belongs to a cluster, that whole cluster is relabeled.
//!
//! The relation is chained: if A joins B and B joins C, A and C share a cluster even when
//! A and C are farther apart than `cluster_distance`.
//!
//! The coarse box does not wrap across the antimeridian.

use log::debug;

use crate::constants::{
    Meter, Second, METERS_PER_DEGREE_LAT, ROUGH_LAT_DISTANCE_FACTOR, ROUGH_LON_DISTANCE_FACTOR,
};
use crate::detections::stats::argsort;
use crate::detections::{ClusterLabel, DetectionSet};
use crate::geodesy::closest_distance_between_segments;

/// Assign a live cluster to every unassigned detection of `set`.
///
/// Detections already carrying a live label keep it (possibly merged into another cluster);
/// new cluster ids start after the largest existing one. Rejected detections are neither
/// assigned nor merged.
///
/// Arguments
/// ---------
/// * `set`: the detection set, mutated in place
/// * `cluster_distance`: maximum line of sight separation in meters
/// * `time_distance`: maximum forward time separation in seconds
pub fn cluster_detections(set: &mut DetectionSet, cluster_distance: Meter, time_distance: Second) {
    if set.is_empty() {
        return;
    }

    let rough_lat = ROUGH_LAT_DISTANCE_FACTOR * cluster_distance / METERS_PER_DEGREE_LAT;
    let rough_lon_distance = ROUGH_LON_DISTANCE_FACTOR * cluster_distance;

    let times: Vec<f64> = set.detections().iter().map(|d| d.time).collect();
    let order = argsort(&times);
    let sorted_times: Vec<f64> = order.iter().map(|&i| times[i]).collect();

    let mut next_id = set.max_cluster_id();
    let last = order.len() - 1;

    for (rank, &current) in order.iter().enumerate() {
        if set.detections()[current].cluster == ClusterLabel::Unassigned {
            next_id += 1;
            set.detections_mut()[current].cluster = ClusterLabel::Live(next_id);
        }
        if rank == last {
            continue;
        }

        let cur = &set.detections()[current];
        let Some(current_id) = cur.cluster.live_id() else {
            continue;
        };
        let (t, lat, lon) = (cur.time, cur.lat, cur.lon);
        let (cur_far, cur_near) = (cur.far_point, cur.near_point);

        let rough_lon = rough_lon_distance / (lat.to_radians().cos() * METERS_PER_DEGREE_LAT);
        let lo = sorted_times.partition_point(|&s| s < t);
        let hi = sorted_times.partition_point(|&s| s <= t + time_distance);

        let mut window: Vec<usize> = order[lo..hi]
            .iter()
            .copied()
            .filter(|&j| {
                let c = &set.detections()[j];
                (lat - rough_lat..=lat + rough_lat).contains(&c.lat)
                    && (lon - rough_lon..=lon + rough_lon).contains(&c.lon)
                    && !c.cluster.is_live(current_id)
            })
            .collect();
        window.sort_unstable();

        for j in window {
            let candidate = &set.detections()[j];
            let approach = closest_distance_between_segments(
                &candidate.far_point,
                &candidate.near_point,
                &cur_far,
                &cur_near,
            );
            if approach.distance > cluster_distance {
                continue;
            }

            let label = candidate.cluster;
            match label {
                ClusterLabel::Live(other) => set.relabel_cluster(other, current_id),
                ClusterLabel::Unassigned => {
                    set.detections_mut()[j].cluster = ClusterLabel::Live(current_id)
                }
                ClusterLabel::Rejected => {}
            }
        }
    }

    debug!(
        "{} clusters created from {} detections",
        set.count_live_clusters(),
        set.len()
    );
}
