//! # Detection set
//!
//! The in-memory working set of one processing window: every GLM **group** (the unit the
//! clustering engine works on) and every GLM pixel **event** loaded from the window files.
//!
//! ## Overview
//!
//! A [`DetectionSet`] is created empty, bulk-populated once by [`DetectionSet::load`], then
//! mutated in place by each pipeline stage (cluster assignment, fitness marking, calibration)
//! and dropped at the end of the window. Only the cluster summaries outlive it.
//!
//! Each detection is one [`Detection`] value: all of its attributes live in the same struct, so
//! trimming or pruning the set can never misalign two attributes of the same detection.
//!
//! Per-cluster artifacts with an independent lifetime are kept in explicit maps:
//!
//! - stereo location ([`DetectionSet::stereo_location`]), set by the low altitude filter,
//! - velocity ([`DetectionSet::velocity`]), set by the velocity estimator,
//! - classifier probability per (cluster, satellite) ([`DetectionSet::rocket_probabilities`]).
//!
//! ## Line of sight
//!
//! GLM reports each group at the cloud-top ellipsoid. The loader re-navigates that lat/lon on
//! the inflated ellipsoid, then pierces the satellite line of sight at 100 km (`near_point`)
//! and at the surface (`far_point`). The segment between those two points bounds where the
//! emission can be in 3-D and is what the clustering and stereo stages compare.

pub mod cluster_label;
pub mod file_record;
pub mod stats;

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use log::{debug, error, warn};
use smallvec::SmallVec;

use crate::constants::{
    ClusterId, Degree, GroupId, Joule, SatelliteId, Second, UnixSeconds,
    DEFAULT_NON_STEREO_ALTITUDE, STERADIAN_TO_ENERGY,
};
use crate::geodesy::{cloud_top_line_of_sight, find_pierce_at_altitude, Ecef};
use crate::time::{in_file_latter_half, product_time_to_unix, time_offset_scale};
use crate::trigger_errors::TriggerError;

pub use cluster_label::{ClusterLabel, ClusterSatKey};
pub use file_record::{
    select_records_for_window, EventRecords, GlmFileRecord, GroupRecords, Orientation,
    PackedEnergy, PackedType,
};

/// Satellites seen by one cluster, sorted and unique.
pub type SatelliteList = SmallVec<[SatelliteId; 4]>;

/// Identity of a GLM group inside a window: group ids are only unique per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub source_file: u32,
    pub group_id: GroupId,
}

/// One GLM group.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub group_id: GroupId,
    /// Index of the file in the window load order
    pub source_file: u32,
    pub satellite_id: SatelliteId,
    pub orientation: Orientation,
    pub lat: Degree,
    pub lon: Degree,
    pub satellite_position: Ecef,
    /// Line of sight pierce point at 100 km
    pub near_point: Ecef,
    /// Line of sight pierce point at the surface
    pub far_point: Ecef,
    /// Seconds after the window base time
    pub time: Second,
    pub energy: Joule,
    /// Calibrated source intensity (W/sr)
    pub intensity: f64,
    pub quality_flag: u16,
    pub fitness: bool,
    pub is_peak_for_time: bool,
    pub cluster: ClusterLabel,
}

impl Detection {
    /// Build an unclustered detection from a GLM cloud-top lat/lon.
    ///
    /// The line of sight is derived with
    /// [`cloud_top_line_of_sight`](crate::geodesy::cloud_top_line_of_sight). Identity fields
    /// (`group_id`, `source_file`, `orientation`, `quality_flag`) take neutral values and are
    /// meant to be overridden with struct update syntax.
    ///
    /// Return
    /// ------
    /// * `None` when the line of sight does not intersect the 100 km or the surface shell
    pub fn from_cloud_top(
        satellite_id: SatelliteId,
        satellite_position: Ecef,
        lat: Degree,
        lon: Degree,
        time: Second,
        energy: Joule,
    ) -> Option<Self> {
        let (near_point, far_point) = cloud_top_line_of_sight(&satellite_position, lat, lon)?;
        Some(Detection {
            group_id: 0,
            source_file: 0,
            satellite_id,
            orientation: Orientation::Upright,
            lat,
            lon,
            satellite_position,
            near_point,
            far_point,
            time,
            energy,
            intensity: 0.0,
            quality_flag: 0,
            fitness: true,
            is_peak_for_time: false,
            cluster: ClusterLabel::Unassigned,
        })
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            source_file: self.source_file,
            group_id: self.group_id,
        }
    }
}

/// One GLM pixel event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelEvent {
    pub time: Second,
    pub lat: Degree,
    pub lon: Degree,
    pub energy: Joule,
    /// Calibrated source intensity (W/sr)
    pub intensity: f64,
    pub parent: GroupKey,
}

/// Working set of one processing window.
#[derive(Debug, Clone, Default)]
pub struct DetectionSet {
    detections: Vec<Detection>,
    events: Vec<PixelEvent>,
    group_sizes: AHashMap<GroupKey, usize>,
    base_time: UnixSeconds,
    files_start: UnixSeconds,
    files_end: UnixSeconds,
    stereo_locations: BTreeMap<ClusterId, Ecef>,
    velocities: BTreeMap<ClusterId, Ecef>,
    rocket_probabilities: BTreeMap<ClusterSatKey, f64>,
}

fn count_group_sizes(events: &[PixelEvent]) -> AHashMap<GroupKey, usize> {
    let mut sizes = AHashMap::new();
    for e in events {
        *sizes.entry(e.parent).or_insert(0) += 1;
    }
    sizes
}

impl DetectionSet {
    /// Build a set from already derived detections and events.
    ///
    /// Arguments
    /// ---------
    /// * `detections`, `events`: the window content, times relative to `base_time`
    /// * `base_time`: absolute time of `time == 0`
    /// * `files_start`, `files_end`: coverage of the loaded files
    pub fn from_parts(
        detections: Vec<Detection>,
        events: Vec<PixelEvent>,
        base_time: UnixSeconds,
        files_start: UnixSeconds,
        files_end: UnixSeconds,
    ) -> Self {
        let group_sizes = count_group_sizes(&events);
        DetectionSet {
            detections,
            events,
            group_sizes,
            base_time,
            files_start,
            files_end,
            ..Default::default()
        }
    }

    /// Bulk load the records of a window.
    ///
    /// Records are expected in non-decreasing start time order (see
    /// [`select_records_for_window`]). The product time of the first record becomes the window
    /// base time and every later record is re-based onto it. An out of order record is logged
    /// as an error and loaded anyway.
    ///
    /// Groups whose line of sight does not reach the 100 km or the surface shell are dropped
    /// with a warning.
    ///
    /// Arguments
    /// ---------
    /// * `records`: window files, sorted by start time
    ///
    /// Return
    /// ------
    /// * the populated set, or [`TriggerError::MismatchedLengths`] for an inconsistent record
    pub fn load(records: &[&GlmFileRecord]) -> Result<Self, TriggerError> {
        let mut set = DetectionSet::default();
        let mut base_time: Option<UnixSeconds> = None;
        let mut files_start = f64::INFINITY;
        let mut files_end = f64::NEG_INFINITY;

        for (file_index, record) in records.iter().enumerate() {
            record.validate()?;
            let source_file = file_index as u32;

            files_start = files_start.min(record.file_start);
            files_end = files_end.max(record.file_end);

            let file_base = product_time_to_unix(record.product_time);
            if base_time.is_some_and(|base| file_base < base) {
                error!(
                    "GOES data ingest relies on processing earlier files first, but the file of \
                     satellite {} starting at {} has a basetime before the window basetime",
                    record.satellite_id, record.file_start
                );
            }
            let base = *base_time.get_or_insert(file_base);
            let time_adjust = file_base - base;
            let scale = time_offset_scale(file_base);

            let satellite_position = record.satellite_position();
            let orientation =
                Orientation::from_yaw_flip_flag(record.yaw_flip_flag).unwrap_or_else(|| {
                    warn!(
                        "unknown yaw flip flag {} for satellite {}, treated as transitional",
                        record.yaw_flip_flag, record.satellite_id
                    );
                    Orientation::Transitional
                });

            let groups = &record.groups;
            for i in 0..groups.len() {
                let Some(detection) = Detection::from_cloud_top(
                    record.satellite_id,
                    satellite_position,
                    groups.lat[i],
                    groups.lon[i],
                    time_adjust + scale * groups.time_offset[i],
                    groups.energy[i],
                ) else {
                    warn!(
                        "group {} of satellite {} has no line of sight intersection, skipped",
                        groups.id[i], record.satellite_id
                    );
                    continue;
                };

                set.detections.push(Detection {
                    group_id: groups.id[i],
                    source_file,
                    orientation,
                    quality_flag: groups.quality_flag[i],
                    ..detection
                });
            }

            let events = &record.events;
            let energies = events.energy.decode();
            set.events.extend((0..events.len()).map(|i| PixelEvent {
                time: time_adjust + scale * events.time_offset[i],
                lat: events.lat[i],
                lon: events.lon[i],
                energy: energies[i],
                intensity: 0.0,
                parent: GroupKey {
                    source_file,
                    group_id: events.parent_group_id[i],
                },
            }));
        }

        if let Some(base) = base_time {
            set.base_time = base;
            set.files_start = files_start;
            set.files_end = files_end;
        }
        set.group_sizes = count_group_sizes(&set.events);

        debug!(
            "loaded {} groups and {} events from {} files",
            set.detections.len(),
            set.events.len(),
            records.len()
        );
        Ok(set)
    }

    /// Drop the detections of the padding half-file that the neighbouring window owns.
    ///
    /// With a window `[start, end]` centered on the target time: when the target lies in the
    /// second half of its file, detections later than `2 * process_interval - (end - start) / 2`
    /// are dropped; otherwise detections earlier than `(end - start) / 2` are dropped. Times are
    /// relative to the base time. When nothing would be kept the set is left untouched.
    ///
    /// Return
    /// ------
    /// * the number of detections removed
    pub fn trim_to_window(
        &mut self,
        start: UnixSeconds,
        end: UnixSeconds,
        process_interval: Second,
    ) -> usize {
        let target = (start + end) / 2.0;
        let half_window = (end - start) / 2.0;
        let latter_half = in_file_latter_half(target, process_interval);

        let keep = |d: &Detection| {
            if latter_half {
                d.time < process_interval * 2.0 - half_window
            } else {
                d.time > half_window
            }
        };

        if !self.detections.iter().any(keep) {
            debug!("no detection inside the window, trimming skipped");
            return 0;
        }

        let before = self.detections.len();
        self.detections.retain(keep);
        before - self.detections.len()
    }

    /// Keep only the pixel events whose parent group belongs to one of `cluster_ids`.
    pub fn prune_events_to_clusters(&mut self, cluster_ids: &[ClusterId]) {
        let clusters: AHashSet<ClusterId> = cluster_ids.iter().copied().collect();
        let groups: AHashSet<GroupKey> = self
            .detections
            .iter()
            .filter(|d| d.cluster.live_id().is_some_and(|id| clusters.contains(&id)))
            .map(Detection::group_key)
            .collect();

        let before = self.events.len();
        self.events.retain(|e| groups.contains(&e.parent));
        self.group_sizes.retain(|key, _| groups.contains(key));
        debug!(
            "pruned pixel events to {} accepted clusters: {} of {} kept",
            cluster_ids.len(),
            self.events.len(),
            before
        );
    }

    // ---------------------------------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------------------------------

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub(crate) fn detections_mut(&mut self) -> &mut [Detection] {
        &mut self.detections
    }

    pub fn events(&self) -> &[PixelEvent] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [PixelEvent] {
        &mut self.events
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn base_time(&self) -> UnixSeconds {
        self.base_time
    }

    pub fn files_start(&self) -> UnixSeconds {
        self.files_start
    }

    pub fn files_end(&self) -> UnixSeconds {
        self.files_end
    }

    // ---------------------------------------------------------------------------------------------
    // Cluster bookkeeping
    // ---------------------------------------------------------------------------------------------

    /// Sorted ids of the live clusters.
    pub fn live_cluster_ids(&self) -> Vec<ClusterId> {
        self.detections
            .iter()
            .filter_map(|d| d.cluster.live_id())
            .sorted_unstable()
            .dedup()
            .collect()
    }

    pub fn count_live_clusters(&self) -> usize {
        self.live_cluster_ids().len()
    }

    /// Largest live cluster id, 0 when there is none.
    pub fn max_cluster_id(&self) -> ClusterId {
        self.detections
            .iter()
            .filter_map(|d| d.cluster.live_id())
            .max()
            .unwrap_or(0)
    }

    /// Indices of the detections of a live cluster, in set order.
    pub fn cluster_indices(&self, cluster: ClusterId) -> Vec<usize> {
        self.detections
            .iter()
            .positions(|d| d.cluster.is_live(cluster))
            .collect()
    }

    /// Sorted unique satellites among `indices`.
    pub fn satellites_of(&self, indices: &[usize]) -> SatelliteList {
        indices
            .iter()
            .map(|&i| self.detections[i].satellite_id)
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Subset of `indices` seen by `satellite`.
    pub fn indices_for_satellite(&self, indices: &[usize], satellite: SatelliteId) -> Vec<usize> {
        indices
            .iter()
            .copied()
            .filter(|&i| self.detections[i].satellite_id == satellite)
            .collect()
    }

    /// Mark every detection of a live cluster as rejected.
    pub fn reject_cluster(&mut self, cluster: ClusterId) {
        for d in self.detections.iter_mut().filter(|d| d.cluster.is_live(cluster)) {
            d.cluster = ClusterLabel::Rejected;
        }
    }

    /// Move every detection of cluster `from` into cluster `to`.
    pub(crate) fn relabel_cluster(&mut self, from: ClusterId, to: ClusterId) {
        for d in self.detections.iter_mut().filter(|d| d.cluster.is_live(from)) {
            d.cluster = ClusterLabel::Live(to);
        }
    }

    /// Number of pixel events attached to each group, counted once per load.
    pub fn group_sizes(&self) -> &AHashMap<GroupKey, usize> {
        &self.group_sizes
    }

    /// Pixel events of each group in `groups`, in storage order.
    pub fn events_by_group(&self, groups: &AHashSet<GroupKey>) -> AHashMap<GroupKey, Vec<&PixelEvent>> {
        let mut by_group: AHashMap<GroupKey, Vec<&PixelEvent>> = AHashMap::with_capacity(groups.len());
        for e in self.events.iter().filter(|e| groups.contains(&e.parent)) {
            by_group.entry(e.parent).or_default().push(e);
        }
        by_group
    }

    // ---------------------------------------------------------------------------------------------
    // Per cluster caches
    // ---------------------------------------------------------------------------------------------

    pub fn stereo_location(&self, cluster: ClusterId) -> Option<Ecef> {
        self.stereo_locations.get(&cluster).copied()
    }

    pub(crate) fn set_stereo_location(&mut self, cluster: ClusterId, location: Ecef) {
        self.stereo_locations.insert(cluster, location);
    }

    pub fn velocity(&self, cluster: ClusterId) -> Option<Ecef> {
        self.velocities.get(&cluster).copied()
    }

    pub(crate) fn set_velocity(&mut self, cluster: ClusterId, velocity: Ecef) {
        self.velocities.insert(cluster, velocity);
    }

    pub fn rocket_probabilities(&self) -> &BTreeMap<ClusterSatKey, f64> {
        &self.rocket_probabilities
    }

    pub(crate) fn set_rocket_probability(&mut self, key: ClusterSatKey, probability: f64) {
        self.rocket_probabilities.insert(key, probability);
    }

    /// Best location estimate of a cluster.
    ///
    /// The stereo triangulation when one exists, otherwise the line of sight of the most
    /// intense detection among `indices` pierced at the default 32 km altitude.
    pub fn cluster_location(&self, cluster: ClusterId, indices: &[usize]) -> Option<Ecef> {
        if let Some(location) = self.stereo_location(cluster) {
            return Some(location);
        }
        let intensities: Vec<f64> = indices.iter().map(|&i| self.detections[i].intensity).collect();
        let peak = &self.detections[indices[stats::argmax(&intensities)?]];
        find_pierce_at_altitude(
            &peak.satellite_position,
            &peak.near_point,
            DEFAULT_NON_STEREO_ALTITUDE,
        )
    }

    /// Total radiated energy of a cluster: the best satellite total intensity converted to
    /// joules.
    pub fn total_radiated_energy(&self, indices: &[usize]) -> Joule {
        self.satellites_of(indices)
            .iter()
            .map(|&sat| {
                self.indices_for_satellite(indices, sat)
                    .iter()
                    .map(|&i| self.detections[i].intensity)
                    .sum::<f64>()
                    * STERADIAN_TO_ENERGY
            })
            .fold(0.0, f64::max)
    }
}
