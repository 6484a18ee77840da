//! # Stereo geometry
//!
//! Two GLM instruments looking at the same flash from sufficiently different vantage points
//! give two line of sight segments whose closest approach triangulates the flash in 3-D.
//!
//! ## Overview
//!
//! - [`stereo_pair`] picks the pair of satellites of a cluster to triangulate with,
//! - [`triangulate`] returns the closest approach midpoint of two detections,
//! - [`velocity`] fits a constant velocity trajectory through a time series of
//!   triangulated points.
//!
//! Satellites parked close to each other in longitude (GOES-17 and GOES-18 for instance)
//! see almost the same line of sight: pairs whose position vectors are closer than
//! [`PARALLEL_THRESHOLD`](crate::constants::PARALLEL_THRESHOLD) are never used.

pub mod velocity;

use crate::constants::{SatelliteId, PARALLEL_THRESHOLD};
use crate::detections::{Detection, DetectionSet};
use crate::geodesy::{closest_distance_between_segments, Ecef};

/// Angle between two satellite position vectors, computed from the cross product so that it
/// stays in `[0, π/2]`.
pub fn satellite_separation(p1: &Ecef, p2: &Ecef) -> f64 {
    let norms = p1.norm() * p2.norm();
    if norms == 0.0 {
        return 0.0;
    }
    (p1.cross(p2).norm() / norms).clamp(0.0, 1.0).asin()
}

/// Select the satellites of a cluster used for stereo triangulation.
///
/// Satellites are visited in ascending id order and every pair `(i, j)`, `i < j`, is
/// compared. Among the pairs separated by more than [`PARALLEL_THRESHOLD`] the last one in
/// that order is returned.
///
/// Arguments
/// ---------
/// * `set`: the detection set
/// * `indices`: detections of the cluster
///
/// Return
/// ------
/// * `Some((first, second))` with `first < second`, or `None` for single satellite
///   clusters and clusters only seen from near-parallel viewpoints
pub fn stereo_pair(set: &DetectionSet, indices: &[usize]) -> Option<(SatelliteId, SatelliteId)> {
    let satellites: Vec<(SatelliteId, Ecef)> = set
        .satellites_of(indices)
        .iter()
        .filter_map(|&sat| {
            indices
                .iter()
                .map(|&i| &set.detections()[i])
                .find(|d| d.satellite_id == sat)
                .map(|d| (sat, d.satellite_position))
        })
        .collect();

    let mut selected = None;
    for (i, (sat1, pos1)) in satellites.iter().enumerate() {
        for (sat2, pos2) in &satellites[i + 1..] {
            if satellite_separation(pos1, pos2) > PARALLEL_THRESHOLD {
                selected = Some((*sat1, *sat2));
            }
        }
    }
    selected
}

/// Closest approach midpoint between the lines of sight of two detections.
pub fn triangulate(first: &Detection, second: &Detection) -> Ecef {
    closest_distance_between_segments(
        &first.near_point,
        &first.far_point,
        &second.near_point,
        &second.far_point,
    )
    .midpoint()
}

#[cfg(test)]
mod stereo_test {
    use super::*;
    use crate::geodesy::{ecef_to_geodetic, geodetic_to_ecef};
    use approx::assert_relative_eq;

    const GEO_HEIGHT: f64 = 35_786_023.0;

    fn detection(satellite_id: SatelliteId, subpoint_lon: f64, lat: f64, lon: f64) -> Detection {
        let satellite = geodetic_to_ecef(0.0, subpoint_lon, GEO_HEIGHT);
        Detection::from_cloud_top(satellite_id, satellite, lat, lon, 1.0, 1e-14).unwrap()
    }

    fn set(detections: Vec<Detection>) -> DetectionSet {
        DetectionSet::from_parts(detections, vec![], 0.0, 0.0, 20.0)
    }

    #[test]
    fn test_separation() {
        let east = geodetic_to_ecef(0.0, -75.2, GEO_HEIGHT);
        let west = geodetic_to_ecef(0.0, -137.2, GEO_HEIGHT);
        assert_relative_eq!(satellite_separation(&east, &west), 62f64.to_radians(), epsilon = 1e-9);
        assert_relative_eq!(satellite_separation(&east, &east), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stereo_pair_selection() {
        let s = set(vec![
            detection(18, -137.0, 20.0, -105.0),
            detection(16, -75.2, 20.0, -105.0),
            detection(17, -137.2, 20.0, -105.0),
        ]);

        // 16-17 and 16-18 qualify, 17-18 is near-parallel: the last qualifying pair is 16-18
        assert_eq!(stereo_pair(&s, &[0, 1, 2]), Some((16, 18)));
        assert_eq!(stereo_pair(&s, &[1, 2]), Some((16, 17)));
        assert_eq!(stereo_pair(&s, &[0, 2]), None);
        assert_eq!(stereo_pair(&s, &[1]), None);
    }

    #[test]
    fn test_pair_below_threshold_is_rejected() {
        // about 0.1 rad apart
        let s = set(vec![
            detection(16, -75.2, 20.0, -80.0),
            detection(19, -80.93, 20.0, -80.0),
        ]);
        assert_eq!(stereo_pair(&s, &[0, 1]), None);
    }

    #[test]
    fn test_triangulate_recovers_altitude() {
        let a = detection(16, -75.2, 25.0, -100.0);
        // lat/lon seen by the second satellite for the same point at cloud-top
        let b = detection(18, -137.2, 25.0, -100.0);
        let location = triangulate(&a, &b);
        let geodetic = ecef_to_geodetic(&location);
        // the cloud-top ellipsoid sits ~12 km above the surface at this latitude
        assert_relative_eq!(geodetic.lat, 25.0, epsilon = 0.1);
        assert_relative_eq!(geodetic.lon, -100.0, epsilon = 1e-6);
        assert!(geodetic.alt > 10e3 && geodetic.alt < 15e3);
    }
}
