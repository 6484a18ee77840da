#![allow(dead_code)]

use std::f64::consts::PI;

use approx::assert_relative_eq;
use glm_trigger::calibration::{CalibrationTables, MaskedGrid};
use glm_trigger::constants::{GroupId, SatelliteId, UnixSeconds, GOES_PRODUCT_EPOCH};
use glm_trigger::detections::{
    Detection, DetectionSet, EventRecords, GlmFileRecord, GroupRecords, PackedEnergy, PackedType,
    PixelEvent,
};
use glm_trigger::geodesy::{ecef_to_geodetic, geodetic_to_ecef, Ecef};
use nalgebra::DMatrix;

pub const GEO_HEIGHT_KM: f64 = 35786.023;
pub const FILE_LENGTH: f64 = 20.0;
/// Start of a 20 s file (1_700_000_000 is a multiple of 20)
pub const FILE_START: UnixSeconds = 1_700_000_000.0;
/// Energy of one pixel event, raw count 10 at 1e-15 J per count
pub const PIXEL_ENERGY: f64 = 1e-14;

/// Sub-satellite longitude of the GOES-R satellites.
pub fn subpoint_lon(satellite_id: SatelliteId) -> f64 {
    match satellite_id {
        17 | 18 => -137.2,
        _ => -75.2,
    }
}

pub fn satellite_position(satellite_id: SatelliteId) -> Ecef {
    geodetic_to_ecef(0.0, subpoint_lon(satellite_id), GEO_HEIGHT_KM * 1e3)
}

/// One GLM group of a synthetic file.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticGroup {
    pub lat: f64,
    pub lon: f64,
    pub time_offset: f64,
    pub energy: f64,
    pub pixels: usize,
}

/// A GLM file of `satellite_id` covering `[file_start, file_start + 20]`.
///
/// Group ids are 1-based positions in `groups`; every group gets `pixels` events at the
/// group position, each of energy [`PIXEL_ENERGY`].
pub fn file_record(satellite_id: SatelliteId, file_start: UnixSeconds, groups: &[SyntheticGroup]) -> GlmFileRecord {
    let ids: Vec<GroupId> = (1..=groups.len() as GroupId).collect();

    let mut events = EventRecords {
        lat: vec![],
        lon: vec![],
        time_offset: vec![],
        energy: PackedEnergy {
            raw: vec![],
            fill_value: Some(-1),
            scale_factor: 1e-15,
            add_offset: 0.0,
            packed_type: PackedType::I16,
            unsigned: true,
        },
        parent_group_id: vec![],
    };
    for (g, &id) in groups.iter().zip(&ids) {
        for _ in 0..g.pixels {
            events.lat.push(g.lat);
            events.lon.push(g.lon);
            events.time_offset.push(g.time_offset);
            events.energy.raw.push(10);
            events.parent_group_id.push(id);
        }
    }

    GlmFileRecord {
        satellite_id,
        file_start,
        file_end: file_start + FILE_LENGTH,
        product_time: file_start - GOES_PRODUCT_EPOCH,
        subpoint_lat: 0.0,
        subpoint_lon: subpoint_lon(satellite_id),
        satellite_height_km: GEO_HEIGHT_KM,
        yaw_flip_flag: 0,
        groups: GroupRecords {
            id: ids,
            lat: groups.iter().map(|g| g.lat).collect(),
            lon: groups.iter().map(|g| g.lon).collect(),
            time_offset: groups.iter().map(|g| g.time_offset).collect(),
            energy: groups.iter().map(|g| g.energy).collect(),
            quality_flag: vec![0; groups.len()],
        },
        events,
    }
}

/// A bolide-like light curve of `n` groups sampled every 20 ms from `start_offset`.
///
/// The energy follows a half sine from 1e-14 J up to 5e-14 J and back, every group is
/// two pixels wide.
pub fn bolide_groups(n: usize, start_offset: f64, lat: f64, lon: f64) -> Vec<SyntheticGroup> {
    (0..n)
        .map(|k| SyntheticGroup {
            lat,
            lon,
            time_offset: start_offset + 0.02 * k as f64,
            energy: 1e-14 + 4e-14 * (PI * k as f64 / (n - 1) as f64).sin(),
            pixels: 2,
        })
        .collect()
}

/// An unclustered detection seen from the nominal position of `satellite_id`.
pub fn detection(satellite_id: SatelliteId, lat: f64, lon: f64, time: f64, energy: f64) -> Detection {
    Detection::from_cloud_top(satellite_id, satellite_position(satellite_id), lat, lon, time, energy)
        .unwrap()
}

/// A detection of `satellite_id` whose line of sight passes through `target`.
///
/// The segment spans 50 km on each side of the target.
pub fn looking_at(satellite_id: SatelliteId, satellite: Ecef, target: &Ecef, time: f64, energy: f64) -> Detection {
    let geodetic = ecef_to_geodetic(target);
    let direction = (target - satellite).normalize();
    let range = (target - satellite).norm();
    Detection {
        near_point: satellite + direction * (range - 50e3),
        far_point: satellite + direction * (range + 50e3),
        ..Detection::from_cloud_top(satellite_id, satellite, geodetic.lat, geodetic.lon, time, energy).unwrap()
    }
}

/// A set of detections with distinct group ids and no pixel event.
pub fn detection_set(detections: Vec<Detection>) -> DetectionSet {
    with_pixels(detections, 0)
}

/// A set of detections with distinct group ids, each group made of `pixels` events.
pub fn with_pixels(mut detections: Vec<Detection>, pixels: usize) -> DetectionSet {
    let mut events = vec![];
    for (i, d) in detections.iter_mut().enumerate() {
        d.group_id = i as GroupId + 1;
        events.extend((0..pixels).map(|_| PixelEvent {
            time: d.time,
            lat: d.lat,
            lon: d.lon,
            energy: d.energy / pixels as f64,
            intensity: 0.0,
            parent: d.group_key(),
        }));
    }
    DetectionSet::from_parts(detections, events, FILE_START, FILE_START, FILE_START + FILE_LENGTH)
}

/// Regular 40 × 40 calibration tables covering lat `[28, 32)` and lon `[-82, -78)`.
pub fn calibration_tables(lut_value: f64) -> CalibrationTables {
    let lon = DMatrix::from_fn(40, 40, |x, _| -82.0 + 0.1 * x as f64);
    let lat = DMatrix::from_fn(40, 40, |_, y| 28.0 + 0.1 * y as f64);
    let lut = DMatrix::from_element(40, 40, lut_value);
    CalibrationTables::new(
        MaskedGrid::unmasked(lon),
        MaskedGrid::unmasked(lat),
        MaskedGrid::unmasked(lut),
    )
    .unwrap()
}

pub fn assert_ecef_close(actual: &Ecef, expected: &Ecef, epsilon: f64) {
    assert_relative_eq!(actual.x, expected.x, epsilon = epsilon);
    assert_relative_eq!(actual.y, expected.y, epsilon = epsilon);
    assert_relative_eq!(actual.z, expected.z, epsilon = epsilon);
}
