use approx::assert_relative_eq;
use glm_trigger::clustering::cluster_detections;
use glm_trigger::detections::{ClusterLabel, DetectionSet, GroupKey};
use glm_trigger::geodesy::closest_distance_between_segments;

mod common;
use common::{detection, detection_set, file_record, SyntheticGroup, FILE_LENGTH, FILE_START};

const CLUSTER_DISTANCE: f64 = 25e3;
const CLUSTER_TIME: f64 = 2.0;

fn labels(set: &DetectionSet) -> Vec<ClusterLabel> {
    set.detections().iter().map(|d| d.cluster).collect()
}

fn segment_distance(set: &DetectionSet, i: usize, j: usize) -> f64 {
    let (a, b) = (&set.detections()[i], &set.detections()[j]);
    closest_distance_between_segments(&a.far_point, &a.near_point, &b.far_point, &b.near_point).distance
}

#[test]
fn test_close_pair_is_one_cluster() {
    // about 5 m apart at lat 10, half a second apart
    let mut set = detection_set(vec![
        detection(16, 10.0, -75.2, 0.0, 1e-14),
        detection(16, 10.0, -75.199955, 0.5, 1e-14),
    ]);
    assert!(segment_distance(&set, 0, 1) < 10.0);

    cluster_detections(&mut set, CLUSTER_DISTANCE, CLUSTER_TIME);
    assert_eq!(labels(&set), vec![ClusterLabel::Live(1), ClusterLabel::Live(1)]);
}

#[test]
fn test_distant_pair_stays_apart() {
    // about 50 km apart
    let mut set = detection_set(vec![
        detection(16, 10.0, -75.2, 0.0, 1e-14),
        detection(16, 10.0, -74.744, 0.5, 1e-14),
    ]);
    assert!(segment_distance(&set, 0, 1) > 40e3);

    cluster_detections(&mut set, CLUSTER_DISTANCE, CLUSTER_TIME);
    assert_eq!(labels(&set), vec![ClusterLabel::Live(1), ClusterLabel::Live(2)]);
}

#[test]
fn test_chained_detections_share_a_cluster() {
    // A-B and B-C are about 20 km apart, A-C about 40 km apart
    let mut set = detection_set(vec![
        detection(16, 10.0, -75.2, 0.0, 1e-14),
        detection(16, 10.0, -75.02, 0.5, 1e-14),
        detection(16, 10.0, -74.84, 1.0, 1e-14),
    ]);
    assert!(segment_distance(&set, 0, 1) < CLUSTER_DISTANCE);
    assert!(segment_distance(&set, 1, 2) < CLUSTER_DISTANCE);
    assert!(segment_distance(&set, 0, 2) > CLUSTER_DISTANCE);

    cluster_detections(&mut set, CLUSTER_DISTANCE, CLUSTER_TIME);
    let labels = labels(&set);
    assert!(labels.iter().all(|l| *l == labels[0]));
    assert_eq!(set.count_live_clusters(), 1);
}

#[test]
fn test_chain_order_does_not_matter() {
    // the bridging detection comes last in time
    let mut set = detection_set(vec![
        detection(16, 10.0, -75.2, 0.0, 1e-14),
        detection(16, 10.0, -74.84, 0.5, 1e-14),
        detection(16, 10.0, -75.02, 1.0, 1e-14),
    ]);
    cluster_detections(&mut set, CLUSTER_DISTANCE, CLUSTER_TIME);
    assert_eq!(set.count_live_clusters(), 1);
}

#[test]
fn test_records_stay_co_indexed_after_trim_and_prune() {
    // target 1_700_000_010 lies in the latter half of its file: the window loads this file
    // and the next one, and keeps the detections before 30 s
    let groups = |file: usize| -> Vec<SyntheticGroup> {
        (1..=19)
            .map(|k| SyntheticGroup {
                lat: 30.0 + 0.01 * k as f64,
                lon: -80.0,
                time_offset: k as f64,
                energy: (k + 100 * file) as f64 * 1e-15,
                pixels: 2,
            })
            .collect()
    };
    let first = file_record(16, FILE_START, &groups(0));
    let second = file_record(16, FILE_START + FILE_LENGTH, &groups(1));

    let mut set = DetectionSet::load(&[&first, &second]).unwrap();
    let removed = set.trim_to_window(FILE_START, FILE_START + FILE_LENGTH, FILE_LENGTH);
    assert_eq!(removed, 10);
    assert_eq!(set.len(), 28);

    for d in set.detections() {
        let k = d.group_id as f64;
        assert!(d.time < 30.0);
        assert_relative_eq!(d.energy, (k + 100.0 * d.source_file as f64) * 1e-15, epsilon = 1e-24);
        assert_relative_eq!(d.lat, 30.0 + 0.01 * k, epsilon = 1e-12);
        assert_relative_eq!(d.time, k + FILE_LENGTH * d.source_file as f64, epsilon = 1e-9);
    }

    cluster_detections(&mut set, CLUSTER_DISTANCE, CLUSTER_TIME);
    let cluster = set.detections()[0].cluster.live_id().unwrap();
    set.prune_events_to_clusters(&[cluster]);

    let members: Vec<GroupKey> = set
        .cluster_indices(cluster)
        .into_iter()
        .map(|i| set.detections()[i].group_key())
        .collect();
    assert!(!members.is_empty());
    assert_eq!(set.events().len(), 2 * members.len());
    assert!(set.events().iter().all(|e| members.contains(&e.parent)));
}
