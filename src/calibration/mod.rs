//! # Energy calibration
//!
//! Conversion of the GLM pixel event energies (J) into calibrated source intensities (W/sr).
//!
//! ## Overview
//!
//! Calibration runs on the accepted clusters only, once the pixel events have been pruned to
//! them. For every (cluster, satellite, orientation) subset:
//!
//! 1. the calibration set of the satellite orientation is picked in the [`CalibrationCatalog`],
//! 2. the geolocation tables are reduced to the cells within ±2° of the median group position
//!    ([`CalibrationTables::cells_near`]),
//! 3. each pixel event is mapped back to its focal plane pixel
//!    ([`pixel_search::lat_lon_to_pixel`]) and its lookup value is read,
//! 4. the event intensity is `1.16e-6 · range² · energy · lut`, `range` being the distance
//!    from the satellite to the event at the cloud-top altitude,
//! 5. the group intensity is the sum of its event intensities.
//!
//! Missing tables and uncovered clusters are data gaps: they are logged and the subset keeps a
//! zero intensity.
//!
//! ## Table selection
//!
//! GOES-16 and GOES-18 are never yaw flipped and have a single calibration set. GOES-17 and
//! GOES-19 have one set per orientation. Detections recorded while the satellite is
//! transitioning have no usable set.

pub mod lookup_table;
pub mod pixel_search;

use std::collections::BTreeMap;

use ahash::AHashMap;
use log::{debug, warn};

use crate::constants::{
    ClusterId, SatelliteId, CALIBRATION_LONGITUDE_UPPER, GLM_CLOUD_TOP_ALTITUDE,
    SPECTRAL_TO_INTEGRATED_IRRADIANCE,
};
use crate::detections::stats::median;
use crate::detections::{DetectionSet, GroupKey, Orientation};
use crate::geodesy::{adjusted_geodetic_to_ecef, wrap_longitude, Ecef};
use crate::trigger_errors::TriggerError;

pub use lookup_table::{CalibrationTables, MaskedGrid, TableCell};
pub use pixel_search::lat_lon_to_pixel;

/// Calibration sets by satellite and orientation.
///
/// A `None` orientation marks a set valid for every orientation of the satellite.
#[derive(Debug, Clone, Default)]
pub struct CalibrationCatalog {
    tables: BTreeMap<(SatelliteId, Option<Orientation>), CalibrationTables>,
}

impl CalibrationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single calibration set of a satellite that is never flipped.
    pub fn insert_single(&mut self, satellite: SatelliteId, tables: CalibrationTables) {
        self.tables.insert((satellite, None), tables);
    }

    /// Register the calibration set of one orientation of a satellite.
    pub fn insert_oriented(
        &mut self,
        satellite: SatelliteId,
        orientation: Orientation,
        tables: CalibrationTables,
    ) {
        self.tables.insert((satellite, Some(orientation)), tables);
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Calibration set of `satellite` in `orientation`.
    ///
    /// An orientation specific set takes precedence over a single set.
    ///
    /// Return
    /// ------
    /// * [`TriggerError::NoCalibrationTable`] for transitional orientations and unknown
    ///   satellites
    pub fn select(
        &self,
        satellite: SatelliteId,
        orientation: Orientation,
    ) -> Result<&CalibrationTables, TriggerError> {
        let missing = TriggerError::NoCalibrationTable {
            satellite,
            orientation,
        };
        if orientation == Orientation::Transitional {
            return Err(missing);
        }
        self.tables
            .get(&(satellite, Some(orientation)))
            .or_else(|| self.tables.get(&(satellite, None)))
            .ok_or(missing)
    }
}

/// Calibrated intensity of one pixel event (W/sr).
///
/// Arguments
/// ---------
/// * `energy`: event energy in joules
/// * `lut_value`: lookup table value of the event pixel
/// * `satellite_position`: ECEF position of the satellite
/// * `source`: ECEF position of the event at the cloud-top altitude
pub fn event_intensity(energy: f64, lut_value: f64, satellite_position: &Ecef, source: &Ecef) -> f64 {
    let range = (satellite_position - source).norm();
    SPECTRAL_TO_INTEGRATED_IRRADIANCE * range * range * energy * lut_value
}

/// Cloud-top ECEF position of a pixel event, in the calibration longitude convention.
fn event_cloud_top(lat: f64, lon: f64) -> (f64, Ecef) {
    let lon = wrap_longitude(lon, CALIBRATION_LONGITUDE_UPPER);
    let position = adjusted_geodetic_to_ecef(lat, lon, 0.0, GLM_CLOUD_TOP_ALTITUDE, GLM_CLOUD_TOP_ALTITUDE);
    (lon, position)
}

/// Calibrate the detections `indices`, all from one satellite orientation.
fn calibrate_subset(
    set: &mut DetectionSet,
    tables: &CalibrationTables,
    cluster: ClusterId,
    indices: &[usize],
    events_by_group: &AHashMap<GroupKey, Vec<usize>>,
) -> Result<(), TriggerError> {
    let lats: Vec<f64> = indices.iter().map(|&i| set.detections()[i].lat).collect();
    let lons: Vec<f64> = indices.iter().map(|&i| set.detections()[i].lon).collect();
    let (Some(lat), Some(lon)) = (median(&lats), median(&lons)) else {
        return Ok(());
    };

    let cells = tables.cells_near(lat, wrap_longitude(lon, CALIBRATION_LONGITUDE_UPPER));
    if cells.is_empty() {
        return Err(TriggerError::NoCalibrationCoverage(cluster));
    }

    let satellite_position = set.detections()[indices[0]].satellite_position;
    let mut event_intensities: Vec<(usize, f64)> = Vec::new();
    let mut group_intensities: Vec<(usize, f64)> = Vec::with_capacity(indices.len());
    for &i in indices {
        let group = set.detections()[i].group_key();
        let mut group_intensity = 0.0;

        for &e in events_by_group.get(&group).map(Vec::as_slice).unwrap_or_default() {
            let event = set.events()[e];
            let (event_lon, source) = event_cloud_top(event.lat, event.lon);
            let Some((x, y)) = lat_lon_to_pixel(&cells, event.lat, event_lon) else {
                continue;
            };
            let intensity = event_intensity(event.energy, tables.lut_value(x, y)?, &satellite_position, &source);

            event_intensities.push((e, intensity));
            group_intensity += intensity;
        }
        group_intensities.push((i, group_intensity));
    }

    // written only once every lookup succeeded
    for (e, intensity) in event_intensities {
        set.events_mut()[e].intensity = intensity;
    }
    for (i, intensity) in group_intensities {
        set.detections_mut()[i].intensity = intensity;
    }
    Ok(())
}

/// Calibrate the detections and pixel events of `clusters`.
///
/// Detection intensities are the sums of their pixel event intensities. Subsets without a
/// calibration set or without table coverage are logged and skipped.
///
/// Arguments
/// ---------
/// * `set`: the detection set, pixel events already pruned to `clusters`
/// * `catalog`: the available calibration sets
/// * `clusters`: accepted cluster ids
pub fn calibrate_clusters(set: &mut DetectionSet, catalog: &CalibrationCatalog, clusters: &[ClusterId]) {
    let mut events_by_group: AHashMap<GroupKey, Vec<usize>> = AHashMap::new();
    for (e, event) in set.events().iter().enumerate() {
        events_by_group.entry(event.parent).or_default().push(e);
    }

    for &cluster in clusters {
        let indices = set.cluster_indices(cluster);
        let mut subsets: BTreeMap<(SatelliteId, Orientation), Vec<usize>> = BTreeMap::new();
        for &i in &indices {
            let d = &set.detections()[i];
            subsets.entry((d.satellite_id, d.orientation)).or_default().push(i);
        }

        for ((satellite, orientation), subset) in subsets {
            let outcome = catalog
                .select(satellite, orientation)
                .and_then(|tables| calibrate_subset(set, tables, cluster, &subset, &events_by_group));
            match outcome {
                Ok(()) => debug!(
                    "cluster {cluster}: calibrated {} groups of satellite {satellite}",
                    subset.len()
                ),
                Err(err) => warn!("cluster {cluster}, satellite {satellite}: calibration skipped ({err})"),
            }
        }
    }
}

#[cfg(test)]
mod calibration_test {
    use super::lookup_table::lookup_table_test::regular_tables;
    use super::*;
    use crate::detections::ClusterLabel::Live;
    use crate::detections::Detection;
    use crate::filters::fixtures::{located, with_groups};
    use approx::assert_relative_eq;

    fn catalog() -> CalibrationCatalog {
        let mut catalog = CalibrationCatalog::new();
        catalog.insert_single(16, regular_tables());
        catalog.insert_oriented(17, Orientation::Upright, regular_tables());
        catalog
    }

    #[test]
    fn test_select() {
        let catalog = catalog();
        assert!(catalog.select(16, Orientation::Upright).is_ok());
        assert!(catalog.select(16, Orientation::Inverted).is_ok());
        assert!(catalog.select(17, Orientation::Upright).is_ok());
        assert_eq!(
            catalog.select(17, Orientation::Inverted).err(),
            Some(TriggerError::NoCalibrationTable {
                satellite: 17,
                orientation: Orientation::Inverted
            })
        );
        assert!(catalog.select(16, Orientation::Transitional).is_err());
        assert!(catalog.select(19, Orientation::Upright).is_err());
    }

    #[test]
    fn test_event_intensity() {
        let satellite = Ecef::new(1000.0, 0.0, 0.0);
        let source = Ecef::new(0.0, 0.0, 0.0);
        assert_relative_eq!(event_intensity(2.0, 3.0, &satellite, &source), 1.16e-6 * 1e6 * 6.0);
    }

    fn detections() -> DetectionSet {
        let detections = vec![
            located(16, Live(1), 21.0, -99.0, 1.0, 4e-15),
            located(16, Live(1), 21.5, -98.7, 1.1, 2e-15),
            // outside the table coverage
            located(16, Live(2), 45.0, -99.0, 1.0, 4e-15),
        ];
        let (detections, events) = with_groups(detections, &[2, 1, 1]);
        DetectionSet::from_parts(detections, events, 0.0, 0.0, 20.0)
    }

    #[test]
    fn test_calibrate_clusters() {
        let mut set = detections();
        calibrate_clusters(&mut set, &catalog(), &[1, 2]);

        let satellite = set.detections()[0].satellite_position;
        let expected = |lat: f64, lon: f64, energy: f64, lut: f64| {
            let (_, source) = event_cloud_top(lat, lon);
            event_intensity(energy, lut, &satellite, &source)
        };

        // two pixels of 2e-15 J at pixel (10, 10)
        let first = expected(21.0, -99.0, 2e-15, 1011.0);
        assert_relative_eq!(set.events()[0].intensity, first, max_relative = 1e-12);
        assert_relative_eq!(set.events()[1].intensity, first, max_relative = 1e-12);
        assert_relative_eq!(set.detections()[0].intensity, 2.0 * first, max_relative = 1e-12);

        // pixel (13, 15)
        let second = expected(21.5, -98.7, 2e-15, 1514.0);
        assert_relative_eq!(set.detections()[1].intensity, second, max_relative = 1e-12);

        // no coverage: left uncalibrated
        assert_eq!(set.detections()[2].intensity, 0.0);
    }

    #[test]
    fn test_positive_longitudes_are_wrapped() {
        let detections = vec![located(16, Live(1), 21.0, 261.0, 1.0, 4e-15)];
        let (detections, events) = with_groups(detections, &[1]);
        let mut set = DetectionSet::from_parts(detections, events, 0.0, 0.0, 20.0);
        calibrate_clusters(&mut set, &catalog(), &[1]);
        assert!(set.detections()[0].intensity > 0.0);
    }

    #[test]
    fn test_failed_lookup_leaves_subset_untouched() {
        use nalgebra::DMatrix;

        // regular geolocation, lookup table without a single valid value
        let tables = CalibrationTables::new(
            MaskedGrid::unmasked(DMatrix::from_fn(40, 40, |x, _| -100.0 + 0.1 * x as f64)),
            MaskedGrid::unmasked(DMatrix::from_fn(40, 40, |_, y| 20.0 + 0.1 * y as f64)),
            MaskedGrid::unmasked(DMatrix::zeros(40, 40)),
        )
        .unwrap();
        let mut catalog = CalibrationCatalog::new();
        catalog.insert_single(16, tables);

        // the first group has no pixel, so it is done before the second one fails
        let detections = vec![
            located(16, Live(1), 21.0, -99.0, 1.0, 4e-15),
            located(16, Live(1), 21.5, -98.7, 1.1, 2e-15),
        ];
        let (detections, events) = with_groups(detections, &[0, 1]);
        let mut set = DetectionSet::from_parts(detections, events, 0.0, 0.0, 20.0);
        set.detections_mut()[0].intensity = 7.0;

        calibrate_clusters(&mut set, &catalog, &[1]);
        assert_eq!(set.detections()[0].intensity, 7.0);
        assert_eq!(set.detections()[1].intensity, 0.0);
        assert_eq!(set.events()[0].intensity, 0.0);
    }

    #[test]
    fn test_missing_table_is_skipped() {
        let mut set = detections();
        calibrate_clusters(&mut set, &CalibrationCatalog::new(), &[1]);
        assert!(set.detections().iter().all(|d| d.intensity == 0.0));
    }
}
