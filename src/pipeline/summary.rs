//! # Accepted cluster summaries
//!
//! Everything the pipeline hands over for one accepted cluster, once calibrated:
//!
//! - a [`ClusterSummary`]: trigger time, location, velocity, total radiated energy and the
//!   group level and pixel level [`PointSource`] records, grouped by satellite,
//! - a [`TriggerMessage`]: the compact notification published for the cluster, with one
//!   [`SatellitePeak`] per viewing satellite.
//!
//! All times are absolute Unix seconds and intensities are in kW/sr. Every struct derives
//! [`serde::Serialize`]; the wire format belongs to the caller.

use std::collections::BTreeMap;

use ahash::AHashSet;
use log::debug;
use serde::Serialize;

use crate::constants::{
    ClusterId, GroupId, Joule, SatelliteId, UnixSeconds, MESSAGE_LONGITUDE_UPPER,
};
use crate::detections::stats::argmax;
use crate::detections::{Detection, DetectionSet, GroupKey, PixelEvent};
use crate::geodesy::{cloud_top_line_of_sight, wrap_longitude, Ecef};
use crate::time::unix_to_iso_utc;

const WATT_PER_KILOWATT: f64 = 1000.0;

/// One point source seen by a satellite: a GLM group or a single pixel event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSource {
    pub time: UnixSeconds,
    pub intensity_kw_per_sr: f64,
    /// Number of pixels of the source (1 for a pixel event)
    pub cluster_size: usize,
    pub satellite_position: Ecef,
    pub near_point: Ecef,
    pub far_point: Ecef,
}

/// Final description of one accepted cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: ClusterId,
    /// Time of the most energetic group
    pub trigger_time: UnixSeconds,
    /// Stereo location, or the single satellite estimate at the default altitude
    pub location: Option<Ecef>,
    /// Velocity in m/s, zero when no estimate exists
    pub velocity: Ecef,
    pub total_radiated_energy: Joule,
    pub group_point_sources: BTreeMap<SatelliteId, Vec<PointSource>>,
    pub event_point_sources: BTreeMap<SatelliteId, Vec<PointSource>>,
}

/// Brightest measurement of one satellite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatellitePeak {
    pub satellite_id: SatelliteId,
    pub group_id: GroupId,
    pub time: UnixSeconds,
    pub intensity_kw_per_sr: f64,
    pub satellite_position: Ecef,
    pub near_point: Ecef,
    pub far_point: Ecef,
}

/// Notification of one accepted cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerMessage {
    pub cluster: ClusterId,
    /// Latest of the satellite peak times, ISO-8601 UTC
    pub approx_trigger_time_iso_utc: String,
    pub measurements: Vec<SatellitePeak>,
    pub peak_brightness_position: Option<Ecef>,
    pub peak_brightness_velocity: Ecef,
    pub approx_total_radiated_energy: Joule,
}

fn group_point_source(set: &DetectionSet, detection: &Detection, cluster_size: usize) -> PointSource {
    PointSource {
        time: set.base_time() + detection.time,
        intensity_kw_per_sr: detection.intensity / WATT_PER_KILOWATT,
        cluster_size,
        satellite_position: detection.satellite_position,
        near_point: detection.near_point,
        far_point: detection.far_point,
    }
}

/// Pixel level point sources of one group.
///
/// The pixel lines of sight are derived from the pixel lat/lon, the longitude wrapped to
/// `[-180, 180)`. Pixels without a line of sight are skipped.
fn pixel_point_sources(
    set: &DetectionSet,
    detection: &Detection,
    events: &[&PixelEvent],
) -> Vec<PointSource> {
    let group = detection.group_key();
    events
        .iter()
        .filter_map(|e| {
            let lon = wrap_longitude(e.lon, MESSAGE_LONGITUDE_UPPER);
            let Some((near_point, far_point)) =
                cloud_top_line_of_sight(&detection.satellite_position, e.lat, lon)
            else {
                debug!("pixel of group {} has no line of sight, skipped", group.group_id);
                return None;
            };
            Some(PointSource {
                time: set.base_time() + e.time,
                intensity_kw_per_sr: e.intensity / WATT_PER_KILOWATT,
                cluster_size: 1,
                satellite_position: detection.satellite_position,
                near_point,
                far_point,
            })
        })
        .collect()
}

/// Summarize an accepted, calibrated cluster.
///
/// Return
/// ------
/// * `None` when `cluster` has no live detection
pub fn summarize_cluster(set: &DetectionSet, cluster: ClusterId) -> Option<ClusterSummary> {
    let indices = set.cluster_indices(cluster);
    let energies: Vec<f64> = indices.iter().map(|&i| set.detections()[i].energy).collect();
    let peak = &set.detections()[indices[argmax(&energies)?]];

    let group_sizes = set.group_sizes();
    let groups: AHashSet<GroupKey> = indices.iter().map(|&i| set.detections()[i].group_key()).collect();
    let events_by_group = set.events_by_group(&groups);

    let mut group_point_sources: BTreeMap<SatelliteId, Vec<PointSource>> = BTreeMap::new();
    let mut event_point_sources: BTreeMap<SatelliteId, Vec<PointSource>> = BTreeMap::new();
    for &i in &indices {
        let d = &set.detections()[i];
        let size = group_sizes.get(&d.group_key()).copied().unwrap_or(0);
        group_point_sources
            .entry(d.satellite_id)
            .or_default()
            .push(group_point_source(set, d, size));
        event_point_sources
            .entry(d.satellite_id)
            .or_default()
            .extend(pixel_point_sources(
                set,
                d,
                events_by_group.get(&d.group_key()).map(Vec::as_slice).unwrap_or_default(),
            ));
    }

    Some(ClusterSummary {
        cluster,
        trigger_time: set.base_time() + peak.time,
        location: set.cluster_location(cluster, &indices),
        velocity: set.velocity(cluster).unwrap_or_else(Ecef::zeros),
        total_radiated_energy: set.total_radiated_energy(&indices),
        group_point_sources,
        event_point_sources,
    })
}

/// Build the notification of an accepted, calibrated cluster.
///
/// Each satellite reports its most intense group; the approximate trigger time is the latest
/// of those peaks.
///
/// Return
/// ------
/// * `None` when `cluster` has no live detection
pub fn trigger_message(set: &DetectionSet, cluster: ClusterId) -> Option<TriggerMessage> {
    let indices = set.cluster_indices(cluster);

    let measurements: Vec<SatellitePeak> = set
        .satellites_of(&indices)
        .iter()
        .filter_map(|&sat| {
            let curve = set.indices_for_satellite(&indices, sat);
            let intensities: Vec<f64> = curve.iter().map(|&i| set.detections()[i].intensity).collect();
            let d = &set.detections()[curve[argmax(&intensities)?]];
            Some(SatellitePeak {
                satellite_id: d.satellite_id,
                group_id: d.group_id,
                time: set.base_time() + d.time,
                intensity_kw_per_sr: d.intensity / WATT_PER_KILOWATT,
                satellite_position: d.satellite_position,
                near_point: d.near_point,
                far_point: d.far_point,
            })
        })
        .collect();
    let peak_time = measurements.iter().map(|m| m.time).reduce(f64::max)?;

    Some(TriggerMessage {
        cluster,
        approx_trigger_time_iso_utc: unix_to_iso_utc(peak_time),
        measurements,
        peak_brightness_position: set.cluster_location(cluster, &indices),
        peak_brightness_velocity: set.velocity(cluster).unwrap_or_else(Ecef::zeros),
        approx_total_radiated_energy: set.total_radiated_energy(&indices),
    })
}
