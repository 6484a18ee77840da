use log::debug;

use crate::constants::Second;
use crate::detections::stats::ptp;
use crate::detections::DetectionSet;

/// Reject the clusters lasting more than `duration_limit` seconds.
///
/// Bolides are brief; long clusters are lightning storms or sensor drift. A cluster lasting
/// exactly `duration_limit` is kept.
pub fn mark_long_durations(set: &mut DetectionSet, duration_limit: Second) {
    let mut rejected = 0;
    for cluster in set.live_cluster_ids() {
        let times: Vec<f64> = set
            .cluster_indices(cluster)
            .into_iter()
            .map(|i| set.detections()[i].time)
            .collect();
        let Some(duration) = ptp(&times) else {
            continue;
        };
        debug!("cluster {cluster} duration: {duration} s");

        if duration > duration_limit {
            debug!("cluster {cluster} beyond duration limit");
            set.reject_cluster(cluster);
            rejected += 1;
        }
    }
    debug!(
        "duration filter: {rejected} clusters rejected ({} remain)",
        set.count_live_clusters()
    );
}
