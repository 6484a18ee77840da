//! Lightning rejection from the spatial extent of the brightest groups.
//!
//! A bolide is a point source: its GLM groups stay a few pixels wide even at peak
//! brightness, while lightning lights up wide pixel groups. For each (cluster, satellite),
//! the groups above the 90th energy percentile are inspected and the fraction of them made
//! of more than [`GROUP_SIZE_LIMIT`] pixel events is the satellite metric. A cluster whose
//! best satellite metric exceeds [`GROUP_SIZE_METRIC_THRESHOLD`] is rejected.
//!
//! The three constants come from a grid search on labeled training data.

use log::debug;

use crate::constants::{
    ClusterId, GROUP_SIZE_ENERGY_PERCENTILE, GROUP_SIZE_LIMIT, GROUP_SIZE_METRIC_THRESHOLD,
};
use crate::detections::stats::percentile;
use crate::detections::DetectionSet;

/// Largest fraction, across the satellites of `cluster`, of wide groups among the groups
/// above the energy percentile. 0 when no satellite has a group above it.
pub fn group_size_metric(set: &DetectionSet, cluster: ClusterId) -> f64 {
    let group_sizes = set.group_sizes();
    let indices = set.cluster_indices(cluster);

    set.satellites_of(&indices)
        .iter()
        .filter_map(|&sat| {
            let curve = set.indices_for_satellite(&indices, sat);
            let energies: Vec<f64> = curve.iter().map(|&i| set.detections()[i].energy).collect();
            let threshold = percentile(&energies, GROUP_SIZE_ENERGY_PERCENTILE)?;

            let sizes: Vec<usize> = curve
                .iter()
                .map(|&i| &set.detections()[i])
                .filter(|d| d.energy > threshold)
                .map(|d| group_sizes.get(&d.group_key()).copied().unwrap_or(0))
                .collect();
            if sizes.is_empty() {
                return None;
            }
            let wide = sizes.iter().filter(|&&size| size > GROUP_SIZE_LIMIT).count();
            Some(wide as f64 / sizes.len() as f64)
        })
        .fold(0.0, f64::max)
}

/// Keep the clusters of `clusters` whose brightest groups look like a point source.
///
/// Return
/// ------
/// * the surviving cluster ids, in input order
pub fn omit_large_group_size_clusters(set: &DetectionSet, clusters: &[ClusterId]) -> Vec<ClusterId> {
    let kept: Vec<ClusterId> = clusters
        .iter()
        .copied()
        .filter(|&cluster| {
            let metric = group_size_metric(set, cluster);
            debug!("cluster {cluster}: wide group fraction {metric:.2}");
            metric <= GROUP_SIZE_METRIC_THRESHOLD
        })
        .collect();

    debug!(
        "{} weak clusters filtered as lightning ({} remain)",
        clusters.len() - kept.len(),
        kept.len()
    );
    kept
}

#[cfg(test)]
mod group_size_test {
    use super::*;
    use crate::detections::ClusterLabel::Live;
    use crate::detections::Detection;
    use crate::filters::fixtures::{detection, with_groups};

    /// Ten detections with energies 1..=10 (× 1e-15); `wide` lists the 1-based energies whose
    /// group is 8 pixels wide.
    fn cluster(satellite: u16, id: u32, wide: &[usize]) -> (Vec<Detection>, Vec<usize>) {
        (1..=10)
            .map(|k| {
                let pixels = if wide.contains(&k) { 8 } else { 2 };
                (detection(satellite, Live(id), k as f64 * 0.01, k as f64 * 1e-15), pixels)
            })
            .unzip()
    }

    fn set(clusters: Vec<(Vec<Detection>, Vec<usize>)>) -> DetectionSet {
        let (detections, pixels): (Vec<Vec<Detection>>, Vec<Vec<usize>>) = clusters.into_iter().unzip();
        let (detections, events) = with_groups(detections.concat(), &pixels.concat());
        DetectionSet::from_parts(detections, events, 0.0, 0.0, 40.0)
    }

    #[test]
    fn test_wide_bright_groups_are_rejected() {
        let s = set(vec![
            // the brightest group is wide
            cluster(16, 1, &[10]),
            // only dim groups are wide
            cluster(16, 2, &[1, 2, 3]),
            // wide on the second satellite only
            cluster(16, 3, &[]),
            cluster(18, 3, &[10]),
        ]);

        assert_eq!(group_size_metric(&s, 1), 1.0);
        assert_eq!(group_size_metric(&s, 2), 0.0);
        assert_eq!(group_size_metric(&s, 3), 1.0);
        assert_eq!(omit_large_group_size_clusters(&s, &[1, 2, 3]), vec![2]);
    }
}
