//! # Trigger pipeline parameters
//!
//! [`PipelineParams`] gathers every tunable threshold of the trigger pipeline, from the
//! clustering distances to the classifier probability threshold. Fixed properties of the
//! instrument and of the trained filters live in [`crate::constants`] instead.
//!
//! ## Example
//!
//! ```rust,no_run
//! use glm_trigger::pipeline::params::PipelineParams;
//!
//! let params = PipelineParams::builder()
//!     .cluster_distance_m(20e3)
//!     .valid_rank(25)
//!     .trigger_prob_threshold(0.5)
//!     .build()
//!     .unwrap();
//!
//! println!("{params:#}");
//! ```
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use serde::Serialize;

use crate::constants::{Joule, Meter, Second};
use crate::trigger_errors::TriggerError;

/// Configuration of one [`TriggerGenerator`](crate::pipeline::TriggerGenerator).
///
/// Fields
/// -----------------
/// **Clustering**
/// * `cluster_distance_m` – maximum closest approach of two lines of sight in one cluster.
/// * `cluster_time_s` – maximum time difference of two linked detections; also the width of
///   the outer boundary of the redundancy filter.
///
/// **Window**
/// * `process_interval_s` – length of one GLM file.
/// * `process_time_size_s` – length of the processed window.
///
/// **Filters**
/// * `cluster_duration_limit_s` – longest accepted cluster duration.
/// * `stereo_altitude_threshold_m` – clusters triangulated below this altitude are rejected.
/// * `max_num_comparisons` – number of brightest samples per satellite tried for the stereo
///   location.
/// * `min_energy_lvl_j` – minimum baseline corrected energy counted by the rank.
/// * `valid_rank` – minimum rank of an accepted cluster.
/// * `strong_signal_rank_threshold` – clusters ranked at or above it skip the group size
///   filter.
/// * `down_sample_length`, `random_state_seed` – classifier input length and down-sampling
///   seed.
/// * `trigger_prob_threshold` – minimum classifier bolide probability.
/// * `max_num_triggers` – a window producing this many triggers or more is discarded.
///
/// Defaults
/// -----------------
/// * `cluster_distance_m`: 25 km
/// * `cluster_time_s`: 2 s
/// * `process_interval_s`, `process_time_size_s`: 20 s
/// * `cluster_duration_limit_s`: 10 s
/// * `stereo_altitude_threshold_m`: 20 km
/// * `max_num_comparisons`: 10
/// * `min_energy_lvl_j`: 5e-15 J
/// * `valid_rank`: 30
/// * `strong_signal_rank_threshold`: 175
/// * `down_sample_length`: 1000
/// * `random_state_seed`: 321
/// * `trigger_prob_threshold`: 0.44
/// * `max_num_triggers`: 20
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineParams {
    // --- Clustering ---
    pub cluster_distance_m: Meter,
    pub cluster_time_s: Second,

    // --- Window ---
    pub process_interval_s: Second,
    pub process_time_size_s: Second,

    // --- Filters ---
    pub cluster_duration_limit_s: Second,
    pub stereo_altitude_threshold_m: Meter,
    pub max_num_comparisons: usize,
    pub min_energy_lvl_j: Joule,
    pub valid_rank: usize,
    pub strong_signal_rank_threshold: usize,
    pub down_sample_length: usize,
    pub random_state_seed: u64,
    pub trigger_prob_threshold: f64,
    pub max_num_triggers: usize,
}

impl PipelineParams {
    /// Equivalent to [`PipelineParams::default()`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> PipelineParamsBuilder {
        PipelineParamsBuilder::new()
    }
}

impl Default for PipelineParams {
    fn default() -> Self {
        PipelineParams {
            cluster_distance_m: 25e3,
            cluster_time_s: 2.0,

            process_interval_s: 20.0,
            process_time_size_s: 20.0,

            cluster_duration_limit_s: 10.0,
            stereo_altitude_threshold_m: 20e3,
            max_num_comparisons: 10,
            min_energy_lvl_j: 5e-15,
            valid_rank: 30,
            strong_signal_rank_threshold: 175,
            down_sample_length: 1000,
            random_state_seed: 321,
            trigger_prob_threshold: 0.44,
            max_num_triggers: 20,
        }
    }
}

/// Builder for [`PipelineParams`], with validation.
#[derive(Debug, Clone)]
pub struct PipelineParamsBuilder {
    params: PipelineParams,
}

impl Default for PipelineParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: PipelineParams::default(),
        }
    }

    // --- Clustering ---
    pub fn cluster_distance_m(mut self, v: Meter) -> Self {
        self.params.cluster_distance_m = v;
        self
    }
    pub fn cluster_time_s(mut self, v: Second) -> Self {
        self.params.cluster_time_s = v;
        self
    }

    // --- Window ---
    pub fn process_interval_s(mut self, v: Second) -> Self {
        self.params.process_interval_s = v;
        self
    }
    pub fn process_time_size_s(mut self, v: Second) -> Self {
        self.params.process_time_size_s = v;
        self
    }

    // --- Filters ---
    pub fn cluster_duration_limit_s(mut self, v: Second) -> Self {
        self.params.cluster_duration_limit_s = v;
        self
    }
    pub fn stereo_altitude_threshold_m(mut self, v: Meter) -> Self {
        self.params.stereo_altitude_threshold_m = v;
        self
    }
    pub fn max_num_comparisons(mut self, v: usize) -> Self {
        self.params.max_num_comparisons = v;
        self
    }
    pub fn min_energy_lvl_j(mut self, v: Joule) -> Self {
        self.params.min_energy_lvl_j = v;
        self
    }
    pub fn valid_rank(mut self, v: usize) -> Self {
        self.params.valid_rank = v;
        self
    }
    pub fn strong_signal_rank_threshold(mut self, v: usize) -> Self {
        self.params.strong_signal_rank_threshold = v;
        self
    }
    pub fn down_sample_length(mut self, v: usize) -> Self {
        self.params.down_sample_length = v;
        self
    }
    pub fn random_state_seed(mut self, v: u64) -> Self {
        self.params.random_state_seed = v;
        self
    }
    pub fn trigger_prob_threshold(mut self, v: f64) -> Self {
        self.params.trigger_prob_threshold = v;
        self
    }
    pub fn max_num_triggers(mut self, v: usize) -> Self {
        self.params.max_num_triggers = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `cluster_distance_m`, `cluster_time_s`, `process_interval_s`, `process_time_size_s`
    ///   and `cluster_duration_limit_s` must be > 0.
    /// * `min_energy_lvl_j` and `stereo_altitude_threshold_m` must be >= 0.
    /// * `trigger_prob_threshold` must lie in `[0, 1]`.
    /// * `down_sample_length`, `max_num_comparisons` and `max_num_triggers` must be >= 1.
    /// * `valid_rank <= strong_signal_rank_threshold`.
    ///
    /// Returns
    /// -----------------
    /// * `Err(TriggerError::InvalidParameter)` naming the first failed rule.
    pub fn build(self) -> Result<PipelineParams, TriggerError> {
        let p = &self.params;

        if !Self::gt0(p.cluster_distance_m) || !Self::gt0(p.cluster_time_s) {
            return Err(TriggerError::InvalidParameter(
                "cluster_distance_m and cluster_time_s must be > 0".into(),
            ));
        }
        if !Self::gt0(p.process_interval_s) || !Self::gt0(p.process_time_size_s) {
            return Err(TriggerError::InvalidParameter(
                "process_interval_s and process_time_size_s must be > 0".into(),
            ));
        }
        if !Self::gt0(p.cluster_duration_limit_s) {
            return Err(TriggerError::InvalidParameter(
                "cluster_duration_limit_s must be > 0".into(),
            ));
        }
        if !Self::ge0(p.min_energy_lvl_j) {
            return Err(TriggerError::InvalidParameter(
                "min_energy_lvl_j must be >= 0".into(),
            ));
        }
        if !Self::ge0(p.stereo_altitude_threshold_m) {
            return Err(TriggerError::InvalidParameter(
                "stereo_altitude_threshold_m must be >= 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&p.trigger_prob_threshold) {
            return Err(TriggerError::InvalidParameter(
                "trigger_prob_threshold must be in [0, 1]".into(),
            ));
        }
        if p.down_sample_length == 0 {
            return Err(TriggerError::InvalidParameter(
                "down_sample_length must be >= 1".into(),
            ));
        }
        if p.max_num_comparisons == 0 {
            return Err(TriggerError::InvalidParameter(
                "max_num_comparisons must be >= 1".into(),
            ));
        }
        if p.max_num_triggers == 0 {
            return Err(TriggerError::InvalidParameter(
                "max_num_triggers must be >= 1".into(),
            ));
        }
        if p.valid_rank > p.strong_signal_rank_threshold {
            return Err(TriggerError::InvalidParameter(
                "require valid_rank <= strong_signal_rank_threshold".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for PipelineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 50; // width reserved for "name = value"
            writeln!(f, "GLM Trigger Pipeline Parameters")?;
            writeln!(f, "-------------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Clustering]")?;
            line!(
                "cluster_distance_m           = {:.1} m",
                self.cluster_distance_m,
                "Max line of sight separation"
            )?;
            line!(
                "cluster_time_s               = {:.2} s",
                self.cluster_time_s,
                "Max time separation"
            )?;

            writeln!(f, "\n[Window]")?;
            line!(
                "process_interval_s           = {:.1} s",
                self.process_interval_s,
                "Length of one file"
            )?;
            line!(
                "process_time_size_s          = {:.1} s",
                self.process_time_size_s,
                "Length of the processed window"
            )?;

            writeln!(f, "\n[Filters]")?;
            line!(
                "cluster_duration_limit_s     = {:.1} s",
                self.cluster_duration_limit_s,
                "Longest accepted cluster"
            )?;
            line!(
                "stereo_altitude_threshold_m  = {:.1} m",
                self.stereo_altitude_threshold_m,
                "Lowest triangulated altitude"
            )?;
            line!(
                "max_num_comparisons          = {}",
                self.max_num_comparisons,
                "Stereo samples tried per satellite"
            )?;
            line!(
                "min_energy_lvl_j             = {:.1e} J",
                self.min_energy_lvl_j,
                "Rank energy threshold"
            )?;
            line!(
                "valid_rank                   = {}",
                self.valid_rank,
                "Minimum accepted rank"
            )?;
            line!(
                "strong_signal_rank_threshold = {}",
                self.strong_signal_rank_threshold,
                "Rank bypassing the group size filter"
            )?;
            line!(
                "down_sample_length           = {}",
                self.down_sample_length,
                "Classifier input length"
            )?;
            line!(
                "random_state_seed            = {}",
                self.random_state_seed,
                "Down-sampling seed"
            )?;
            line!(
                "trigger_prob_threshold       = {:.2}",
                self.trigger_prob_threshold,
                "Minimum bolide probability"
            )?;
            line!(
                "max_num_triggers             = {}",
                self.max_num_triggers,
                "Triggers per window before discarding"
            )?;

            Ok(())
        } else {
            write!(
                f,
                "PipelineParams(distance={:.0}m, time={:.1}s, duration≤{:.1}s, rank≥{}, strong≥{}, p≥{:.2}, triggers<{})",
                self.cluster_distance_m,
                self.cluster_time_s,
                self.cluster_duration_limit_s,
                self.valid_rank,
                self.strong_signal_rank_threshold,
                self.trigger_prob_threshold,
                self.max_num_triggers,
            )
        }
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = PipelineParams::builder().build().unwrap();
        assert_eq!(params, PipelineParams::default());
        assert_eq!(params.cluster_distance_m, 25e3);
        assert_eq!(params.valid_rank, 30);
        assert_eq!(params.random_state_seed, 321);
    }

    #[test]
    fn test_builder_validation() {
        assert!(PipelineParams::builder().cluster_distance_m(0.0).build().is_err());
        assert!(PipelineParams::builder().cluster_time_s(f64::NAN).build().is_err());
        assert!(PipelineParams::builder().trigger_prob_threshold(1.5).build().is_err());
        assert!(PipelineParams::builder().max_num_triggers(0).build().is_err());
        assert_eq!(
            PipelineParams::builder().valid_rank(200).build(),
            Err(TriggerError::InvalidParameter(
                "require valid_rank <= strong_signal_rank_threshold".into()
            ))
        );

        let params = PipelineParams::builder()
            .min_energy_lvl_j(0.0)
            .max_num_triggers(5)
            .build()
            .unwrap();
        assert_eq!(params.max_num_triggers, 5);
    }

    #[test]
    fn test_display() {
        let params = PipelineParams::default();
        let table = format!("{params:#}");
        assert!(table.starts_with("GLM Trigger Pipeline Parameters"));
        assert!(table.contains("valid_rank                   = 30"));
        assert!(format!("{params}").starts_with("PipelineParams(distance=25000m"));
    }
}
