//! # Trigger pipeline
//!
//! Processing of one window of GLM data into accepted bolide triggers.
//!
//! ## Overview
//!
//! A [`TriggerGenerator`] owns the read-only inputs shared by every window (the
//! [`PipelineParams`], the [`CalibrationCatalog`] and the trained [`BolideClassifier`]) and
//! turns the file records overlapping a window into a [`WindowReport`]:
//!
//! 1. select the files overlapping `target ± process_time_size / 2`, load and trim them,
//! 2. cluster the detections,
//! 3. run the marking filters: redundancy, duration, stereo low altitude,
//! 4. mark the peak and fit detections, then the sensor anomalies,
//! 5. rank the clusters and keep those reaching the valid rank,
//! 6. send the weak clusters (below the strong signal rank) through the group size filter,
//!    then the strong and remaining weak clusters through the classifier,
//! 7. discard every trigger when the window produced too many of them,
//! 8. estimate the stereo velocities, prune the pixel events and calibrate the survivors,
//! 9. summarize each accepted cluster.
//!
//! Each window owns its [`DetectionSet`]; independent windows can be processed in parallel
//! with the same generator.
//!
//! ## Example
//!
//! ```rust,no_run
//! use glm_trigger::calibration::CalibrationCatalog;
//! use glm_trigger::filters::FeatureSeries;
//! use glm_trigger::pipeline::params::PipelineParams;
//! use glm_trigger::pipeline::TriggerGenerator;
//!
//! let classifier = |_: &FeatureSeries| vec![0.2, 0.8];
//! let generator = TriggerGenerator::new(PipelineParams::default(), CalibrationCatalog::new(), classifier);
//!
//! # let records = vec![];
//! let report = generator.process_window(&records, 1_700_000_010.0).unwrap();
//! for message in &report.messages {
//!     println!("trigger at {}", message.approx_trigger_time_iso_utc);
//! }
//! ```

pub mod params;
pub mod summary;

use log::debug;
use serde::Serialize;

use crate::calibration::{calibrate_clusters, CalibrationCatalog};
use crate::clustering::cluster_detections;
use crate::constants::{ClusterId, SatelliteId, UnixSeconds};
use crate::detections::{select_records_for_window, DetectionSet, GlmFileRecord};
use crate::filters::{
    bolide_classifier_filter, mark_bad_points, mark_higher_energies, mark_long_durations,
    mark_low_altitude_stereo_events, mark_redundant_clusters, mark_sensor_anomalies,
    omit_large_group_size_clusters, rank_clusters, BolideClassifier, ClusterRank,
};
use crate::stereo::velocity::estimate_velocities;
use crate::trigger_errors::TriggerError;

use params::PipelineParams;
use summary::{summarize_cluster, trigger_message, ClusterSummary, TriggerMessage};

/// Number of candidate clusters before and after one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: &'static str,
    pub before: usize,
    pub after: usize,
}

/// Bolide probability given by the classifier to one satellite of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifierScore {
    pub cluster: ClusterId,
    pub satellite: SatelliteId,
    pub probability: f64,
}

/// Outcome of one processing window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowReport {
    pub target_time: UnixSeconds,
    /// Number of files loaded; 0 when the window had no data
    pub num_files: usize,
    /// Cluster count after clustering
    pub num_clusters: usize,
    pub stages: Vec<StageCount>,
    /// Ranks of the clusters that survived the marking filters
    pub ranks: Vec<ClusterRank>,
    pub classifier_scores: Vec<ClassifierScore>,
    /// Accepted cluster ids, strong clusters first
    pub accepted: Vec<ClusterId>,
    pub summaries: Vec<ClusterSummary>,
    pub messages: Vec<TriggerMessage>,
}

impl WindowReport {
    fn record(&mut self, stage: &'static str, before: usize, after: usize) {
        debug!("{stage}: {} clusters filtered ({after} remain)", before - after.min(before));
        self.stages.push(StageCount { stage, before, after });
    }
}

/// Bolide trigger generator for GLM data.
#[derive(Debug, Clone)]
pub struct TriggerGenerator<C: BolideClassifier> {
    params: PipelineParams,
    catalog: CalibrationCatalog,
    classifier: C,
}

impl<C: BolideClassifier> TriggerGenerator<C> {
    pub fn new(params: PipelineParams, catalog: CalibrationCatalog, classifier: C) -> Self {
        TriggerGenerator {
            params,
            catalog,
            classifier,
        }
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Run the marking stages on a loaded set, up to the sensor anomaly filter.
    fn mark_clusters(&self, set: &mut DetectionSet, target_time: UnixSeconds, report: &mut WindowReport) {
        let p = &self.params;

        let before = set.count_live_clusters();
        mark_redundant_clusters(
            set,
            target_time,
            p.cluster_time_s,
            p.process_interval_s,
            p.process_time_size_s,
        );
        report.record("redundancy", before, set.count_live_clusters());

        let before = set.count_live_clusters();
        mark_long_durations(set, p.cluster_duration_limit_s);
        report.record("duration", before, set.count_live_clusters());

        let before = set.count_live_clusters();
        mark_low_altitude_stereo_events(set, p.max_num_comparisons, p.stereo_altitude_threshold_m);
        report.record("stereo_altitude", before, set.count_live_clusters());

        mark_higher_energies(set);
        mark_bad_points(set);

        let before = set.count_live_clusters();
        mark_sensor_anomalies(set);
        report.record("sensor_anomaly", before, set.count_live_clusters());
    }

    /// Rank and filter the live clusters of a marked set.
    ///
    /// Return
    /// ------
    /// * the accepted cluster ids, strong clusters first
    fn select_clusters(
        &self,
        set: &mut DetectionSet,
        report: &mut WindowReport,
    ) -> Result<Vec<ClusterId>, TriggerError> {
        let p = &self.params;

        let ranks = rank_clusters(set, p.min_energy_lvl_j);
        let valid: Vec<ClusterRank> = ranks.iter().copied().filter(|r| r.rank >= p.valid_rank).collect();
        report.record("valid_rank", ranks.len(), valid.len());
        report.ranks = ranks;

        let (strong, weak): (Vec<ClusterRank>, Vec<ClusterRank>) = valid
            .into_iter()
            .partition(|r| r.rank >= p.strong_signal_rank_threshold);
        let strong: Vec<ClusterId> = strong.into_iter().map(|r| r.cluster).collect();
        let mut weak: Vec<ClusterId> = weak.into_iter().map(|r| r.cluster).collect();
        debug!(
            "{} clusters separated into {} weak and {} strong clusters",
            strong.len() + weak.len(),
            weak.len(),
            strong.len()
        );

        if !weak.is_empty() {
            let before = weak.len();
            weak = omit_large_group_size_clusters(set, &weak);
            report.record("group_size", before, weak.len());
        }

        let mut accepted = strong;
        accepted.extend(weak);

        if !accepted.is_empty() {
            let before = accepted.len();
            accepted = bolide_classifier_filter(
                set,
                &accepted,
                &self.classifier,
                p.down_sample_length,
                p.random_state_seed,
                p.trigger_prob_threshold,
            )?;
            report.record("classifier", before, accepted.len());
        }

        let before = accepted.len();
        if accepted.len() >= p.max_num_triggers {
            debug!(
                "{} clusters exceeds the maximum number of triggering clusters, all omitted",
                accepted.len()
            );
            accepted.clear();
        }
        report.record("trigger_cap", before, accepted.len());

        Ok(accepted)
    }

    /// Process the window centered on `target_time`.
    ///
    /// Arguments
    /// ---------
    /// * `records`: every available file record; those overlapping the window are used
    /// * `target_time`: center of the window (Unix seconds)
    ///
    /// Return
    /// ------
    /// * the window report; a window without files gives an empty report
    /// * [`TriggerError::MismatchedLengths`] for an inconsistent record,
    ///   [`TriggerError::ClassifierOutput`] when the classifier breaks its contract
    pub fn process_window(
        &self,
        records: &[GlmFileRecord],
        target_time: UnixSeconds,
    ) -> Result<WindowReport, TriggerError> {
        let p = &self.params;
        let start = target_time - p.process_time_size_s / 2.0;
        let end = target_time + p.process_time_size_s / 2.0;

        let mut report = WindowReport {
            target_time,
            ..WindowReport::default()
        };

        let selected = select_records_for_window(records, start, end);
        if selected.is_empty() {
            debug!("no GLM file overlaps the window [{start}, {end}]");
            return Ok(report);
        }
        report.num_files = selected.len();

        let mut set = DetectionSet::load(&selected)?;
        set.trim_to_window(start, end, p.process_interval_s);

        cluster_detections(&mut set, p.cluster_distance_m, p.cluster_time_s);
        report.num_clusters = set.count_live_clusters();
        debug!("{} clusters created", report.num_clusters);

        self.mark_clusters(&mut set, target_time, &mut report);
        let accepted = self.select_clusters(&mut set, &mut report)?;

        report.classifier_scores = set
            .rocket_probabilities()
            .iter()
            .map(|(key, &probability)| ClassifierScore {
                cluster: key.cluster,
                satellite: key.satellite,
                probability,
            })
            .collect();

        estimate_velocities(&mut set, &accepted);
        set.prune_events_to_clusters(&accepted);
        calibrate_clusters(&mut set, &self.catalog, &accepted);

        report.summaries = accepted.iter().filter_map(|&c| summarize_cluster(&set, c)).collect();
        report.messages = accepted.iter().filter_map(|&c| trigger_message(&set, c)).collect();
        report.accepted = accepted;
        Ok(report)
    }
}
