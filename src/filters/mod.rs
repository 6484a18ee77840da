//! # Cluster filter chain
//!
//! Every filter works on the live clusters of a [`DetectionSet`](crate::detections::DetectionSet)
//! and decides per cluster. Two flavors exist:
//!
//! - **marking** filters relabel the detections of a failing cluster as
//!   [`ClusterLabel::Rejected`](crate::detections::ClusterLabel::Rejected)
//!   ([`redundancy`], [`duration`], [`stereo_altitude`], [`anomaly`]),
//! - **candidate** filters take a list of cluster ids and return the surviving ones
//!   ([`group_size`], [`classifier`]), the detections are left untouched.
//!
//! [`peak_fitness`] does not reject anything: it computes the per detection
//! `is_peak_for_time` and `fitness` flags the later filters and [`ranking`] rely on.
//!
//! ## Order
//!
//! The filters depend on artifacts of the previous ones and run in this order:
//!
//! 1. [`redundancy::mark_redundant_clusters`]
//! 2. [`duration::mark_long_durations`]
//! 3. [`stereo_altitude::mark_low_altitude_stereo_events`] (stores the stereo locations)
//! 4. [`peak_fitness::mark_higher_energies`] then [`peak_fitness::mark_bad_points`]
//! 5. [`anomaly::mark_sensor_anomalies`] (needs the fitness flags and stereo locations)
//! 6. [`ranking::rank_clusters`]
//! 7. [`group_size::omit_large_group_size_clusters`] on weak clusters only
//! 8. [`classifier::bolide_classifier_filter`] on the strong and remaining weak clusters
//!
//! The sequencing itself lives in [`TriggerGenerator`](crate::pipeline::TriggerGenerator).

pub mod anomaly;
pub mod classifier;
pub mod duration;
pub mod group_size;
pub mod peak_fitness;
pub mod ranking;
pub mod redundancy;
pub mod stereo_altitude;

pub use anomaly::mark_sensor_anomalies;
pub use classifier::{bolide_classifier_filter, BolideClassifier, FeatureSeries};
pub use duration::mark_long_durations;
pub use group_size::omit_large_group_size_clusters;
pub use peak_fitness::{energy_filter, mark_bad_points, mark_higher_energies};
pub use ranking::{continuous_above_min, rank_clusters, ClusterRank};
pub use redundancy::mark_redundant_clusters;
pub use stereo_altitude::mark_low_altitude_stereo_events;
