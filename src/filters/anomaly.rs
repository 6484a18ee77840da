//! Known sensor anomalies.
//!
//! GOES-19 repeatedly reports spurious flashes at a few fixed locations. Clusters whose
//! estimated location falls inside a small lat/lon box around one of them are rejected.

use log::debug;

use crate::constants::{ANOMALY_LAT_LONS, ANOMALY_SATELLITE, ANOMALY_TOLERANCE, Degree};
use crate::detections::DetectionSet;
use crate::geodesy::ecef_to_geodetic;

/// Return true if `(lat, lon)` is strictly within [`ANOMALY_TOLERANCE`] of a known anomaly,
/// on both coordinates.
pub fn near_known_anomaly(lat: Degree, lon: Degree) -> bool {
    ANOMALY_LAT_LONS.iter().any(|&(anomaly_lat, anomaly_lon)| {
        (lat - anomaly_lat).abs() < ANOMALY_TOLERANCE && (lon - anomaly_lon).abs() < ANOMALY_TOLERANCE
    })
}

/// Reject the clusters located on a known anomaly of [`ANOMALY_SATELLITE`].
///
/// Only clusters with at least two fit peak detections from that satellite are checked. The
/// cluster location is the stereo estimate when one was stored, otherwise the line of sight
/// of the first of those detections (intensities are not calibrated yet) pierced at the
/// default altitude (see [`DetectionSet::cluster_location`]).
///
/// Must run after the peak and fitness marking.
pub fn mark_sensor_anomalies(set: &mut DetectionSet) {
    let mut rejected = 0;
    for cluster in set.live_cluster_ids() {
        let indices: Vec<usize> = set
            .indices_for_satellite(&set.cluster_indices(cluster), ANOMALY_SATELLITE)
            .into_iter()
            .filter(|&i| {
                let d = &set.detections()[i];
                d.is_peak_for_time && d.fitness
            })
            .collect();
        if indices.len() < 2 {
            continue;
        }

        let Some(location) = set.cluster_location(cluster, &indices) else {
            continue;
        };
        let position = ecef_to_geodetic(&location);
        if near_known_anomaly(position.lat, position.lon) {
            debug!(
                "cluster {cluster} at ({:.2}, {:.2}) matches a known sensor anomaly",
                position.lat, position.lon
            );
            set.reject_cluster(cluster);
            rejected += 1;
        }
    }
    debug!(
        "sensor anomaly filter: {rejected} clusters rejected ({} remain)",
        set.count_live_clusters()
    );
}
