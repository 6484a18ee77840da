//! Low altitude rejection of stereo clusters.
//!
//! Lightning stays below the cloud tops while bolides peak well above them. When a cluster
//! is seen by a valid [`stereo_pair`], the emission near the peak energy is triangulated and
//! the cluster is rejected when the estimate is below the altitude threshold.
//!
//! ## Triangulation
//!
//! 1. the peak energy detection of the pair gives the reference satellite and time,
//! 2. for each of the two satellites, up to `max_num_comparisons` detections closest in time
//!    to the peak are collected, the reference satellite first,
//! 3. the first reference sample having a partner closer than half a GLM sample period
//!    (see [`STEREO_TIME_MATCH_WINDOW`]) is triangulated.
//!
//! The triangulated point is stored as the cluster stereo location whatever the outcome.

use log::debug;

use crate::constants::{ClusterId, Meter, SatelliteId, STEREO_TIME_MATCH_WINDOW};
use crate::detections::stats::{argmax, argsort};
use crate::detections::DetectionSet;
use crate::geodesy::{ecef_to_geodetic, Ecef};
use crate::stereo::{stereo_pair, triangulate};

/// Detections of each satellite of a stereo pair closest in time to the pair peak energy.
///
/// Arguments
/// ---------
/// * `set`: the detection set
/// * `pair_indices`: detections of the cluster seen by the two satellites
/// * `pair`: the two satellites
/// * `max_num_comparisons`: maximum number of detections kept per satellite
///
/// Return
/// ------
/// * two index lists sorted by distance to the peak time, the satellite holding the peak
///   energy first
pub fn subset_by_top_energies(
    set: &DetectionSet,
    pair_indices: &[usize],
    pair: (SatelliteId, SatelliteId),
    max_num_comparisons: usize,
) -> [Vec<usize>; 2] {
    let detections = set.detections();
    let energies: Vec<f64> = pair_indices.iter().map(|&i| detections[i].energy).collect();
    let Some(peak) = argmax(&energies).map(|k| &detections[pair_indices[k]]) else {
        return [vec![], vec![]];
    };

    let other = if peak.satellite_id == pair.0 { pair.1 } else { pair.0 };
    [peak.satellite_id, other].map(|sat| {
        let indices = set.indices_for_satellite(pair_indices, sat);
        let offsets: Vec<f64> = indices
            .iter()
            .map(|&i| (detections[i].time - peak.time).abs())
            .collect();
        argsort(&offsets)
            .into_iter()
            .take(max_num_comparisons)
            .map(|k| indices[k])
            .collect()
    })
}

/// Triangulate the first time-matched pair of lines of sight.
///
/// Return
/// ------
/// * the closest approach midpoint, `None` when no sample of the first list has a partner
///   in the second list within [`STEREO_TIME_MATCH_WINDOW`]
pub fn first_stereo_location(set: &DetectionSet, samples: &[Vec<usize>; 2]) -> Option<Ecef> {
    let detections = set.detections();
    samples[0].iter().find_map(|&i| {
        let t = detections[i].time;
        samples[1]
            .iter()
            .find(|&&j| (detections[j].time - t).abs() < STEREO_TIME_MATCH_WINDOW)
            .map(|&j| triangulate(&detections[i], &detections[j]))
    })
}

fn stereo_location(set: &DetectionSet, cluster: ClusterId, max_num_comparisons: usize) -> Option<Ecef> {
    let indices = set.cluster_indices(cluster);
    let pair = stereo_pair(set, &indices)?;
    let pair_indices: Vec<usize> = indices
        .into_iter()
        .filter(|&i| {
            let sat = set.detections()[i].satellite_id;
            sat == pair.0 || sat == pair.1
        })
        .collect();

    let samples = subset_by_top_energies(set, &pair_indices, pair, max_num_comparisons);
    first_stereo_location(set, &samples)
}

/// Estimate the altitude of every stereo cluster and reject the low ones.
///
/// Arguments
/// ---------
/// * `set`: the detection set, mutated in place
/// * `max_num_comparisons`: samples collected per satellite around the peak energy
/// * `altitude_threshold`: clusters estimated below this altitude (meters) are rejected
pub fn mark_low_altitude_stereo_events(
    set: &mut DetectionSet,
    max_num_comparisons: usize,
    altitude_threshold: Meter,
) {
    let mut rejected = 0;
    for cluster in set.live_cluster_ids() {
        let Some(location) = stereo_location(set, cluster, max_num_comparisons) else {
            continue;
        };
        set.set_stereo_location(cluster, location);

        let altitude = ecef_to_geodetic(&location).alt;
        debug!("cluster {cluster}: estimated stereo altitude {altitude:.0} m");
        if altitude < altitude_threshold {
            debug!("cluster {cluster} filtered out due to low altitude");
            set.reject_cluster(cluster);
            rejected += 1;
        }
    }
    debug!(
        "low altitude filter: {rejected} clusters rejected ({} remain)",
        set.count_live_clusters()
    );
}
