//! # Bolide classifier filter
//!
//! Weak clusters are scored by an externally trained time series classifier. For each
//! satellite of a cluster, the fit peak detections are turned into a three column
//! `(energy, lat, lon)` [`FeatureSeries`] sorted by time, randomly down-sampled when longer
//! than the classifier input size, and z-score standardized column by column.
//!
//! The classifier returns the probabilities of the two classes `[other, bolide]`. The best
//! satellite bolide probability is the cluster score, and clusters scoring below the
//! trigger threshold are dropped.
//!
//! ## Classifier contract
//!
//! Any [`BolideClassifier`] works, including plain closures
//! `Fn(&FeatureSeries) -> Vec<f64>`. The output must hold two finite probabilities in
//! `[0, 1]`; anything else is a [`TriggerError::ClassifierOutput`].
//!
//! ```rust,no_run
//! use glm_trigger::filters::FeatureSeries;
//!
//! let always_bolide = |_: &FeatureSeries| vec![0.1, 0.9];
//! ```

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::constants::{ClusterId, SatelliteId};
use crate::detections::stats::{argsort, mean, sample_std};
use crate::detections::{ClusterSatKey, DetectionSet};
use crate::trigger_errors::TriggerError;

/// Classifier input: one light curve with its position track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureSeries {
    pub energy: Vec<f64>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

impl FeatureSeries {
    /// Build the series of the given detections, sorted by time.
    pub fn from_detections(set: &DetectionSet, indices: &[usize]) -> Self {
        let detections = set.detections();
        let times: Vec<f64> = indices.iter().map(|&i| detections[i].time).collect();

        let mut series = FeatureSeries::default();
        for k in argsort(&times) {
            let d = &detections[indices[k]];
            series.energy.push(d.energy);
            series.lat.push(d.lat);
            series.lon.push(d.lon);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    fn select(&self, rows: &[usize]) -> Self {
        let pick = |column: &[f64]| rows.iter().map(|&r| column[r]).collect();
        FeatureSeries {
            energy: pick(&self.energy),
            lat: pick(&self.lat),
            lon: pick(&self.lon),
        }
    }

    /// Keep `max_len` random rows when the series is longer, in their original order.
    ///
    /// The draw is reproducible for a given `seed`.
    pub fn down_sample(&self, max_len: usize, seed: u64) -> Self {
        if self.len() <= max_len {
            return self.clone();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = rand::seq::index::sample(&mut rng, self.len(), max_len).into_vec();
        rows.sort_unstable();
        self.select(&rows)
    }

    /// Z-score standardize every column (sample standard deviation).
    ///
    /// Constant columns and series shorter than two rows become zeros.
    pub fn standardized(&self) -> Self {
        FeatureSeries {
            energy: zscore(&self.energy),
            lat: zscore(&self.lat),
            lon: zscore(&self.lon),
        }
    }
}

/// `(x - mean) / std` with the sample standard deviation, zeros when undefined.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    match (mean(values), sample_std(values)) {
        (Some(mu), Some(sigma)) if sigma > 0.0 => values.iter().map(|v| (v - mu) / sigma).collect(),
        _ => vec![0.0; values.len()],
    }
}

/// A trained model scoring a standardized [`FeatureSeries`].
pub trait BolideClassifier {
    /// Class probabilities `[other, bolide]`.
    fn predict_proba(&self, series: &FeatureSeries) -> Vec<f64>;
}

impl<F> BolideClassifier for F
where
    F: Fn(&FeatureSeries) -> Vec<f64>,
{
    fn predict_proba(&self, series: &FeatureSeries) -> Vec<f64> {
        self(series)
    }
}

/// Validate a classifier output and return the bolide probability.
fn bolide_probability(output: &[f64]) -> Result<f64, TriggerError> {
    match output {
        [other, bolide]
            if [other, bolide]
                .iter()
                .all(|p| p.is_finite() && (0.0..=1.0).contains(*p)) =>
        {
            Ok(*bolide)
        }
        _ => Err(TriggerError::ClassifierOutput(format!(
            "expected two probabilities in [0, 1], got {output:?}"
        ))),
    }
}

/// Bolide probability of each satellite of `cluster`, stored in the detection set.
///
/// Satellites without fit peak detections are not scored.
fn score_cluster(
    set: &mut DetectionSet,
    cluster: ClusterId,
    classifier: &dyn BolideClassifier,
    down_sample_length: usize,
    seed: u64,
) -> Result<Vec<(SatelliteId, f64)>, TriggerError> {
    let indices = set.cluster_indices(cluster);
    let mut scores = vec![];

    for sat in set.satellites_of(&indices) {
        let curve: Vec<usize> = set
            .indices_for_satellite(&indices, sat)
            .into_iter()
            .filter(|&i| {
                let d = &set.detections()[i];
                d.fitness && d.is_peak_for_time
            })
            .collect();
        if curve.is_empty() {
            continue;
        }

        let series = FeatureSeries::from_detections(set, &curve)
            .down_sample(down_sample_length, seed)
            .standardized();
        let probability = bolide_probability(&classifier.predict_proba(&series))?;

        set.set_rocket_probability(
            ClusterSatKey {
                cluster,
                satellite: sat,
            },
            probability,
        );
        scores.push((sat, probability));
    }
    Ok(scores)
}

/// Keep the clusters of `clusters` the classifier scores as bolides.
///
/// Arguments
/// ---------
/// * `set`: the detection set; the per (cluster, satellite) probabilities are stored in it
/// * `clusters`: candidate cluster ids
/// * `classifier`: the trained model
/// * `down_sample_length`: maximum series length fed to the classifier
/// * `seed`: seed of the down-sampling draw
/// * `probability_threshold`: minimum cluster score
///
/// Return
/// ------
/// * the surviving cluster ids in input order, or [`TriggerError::ClassifierOutput`] when
///   the classifier breaks its contract
pub fn bolide_classifier_filter(
    set: &mut DetectionSet,
    clusters: &[ClusterId],
    classifier: &dyn BolideClassifier,
    down_sample_length: usize,
    seed: u64,
    probability_threshold: f64,
) -> Result<Vec<ClusterId>, TriggerError> {
    let mut kept = Vec::with_capacity(clusters.len());
    for &cluster in clusters {
        let scores = score_cluster(set, cluster, classifier, down_sample_length, seed)?;
        let metric = scores.iter().map(|(_, p)| *p).fold(0.0, f64::max);
        debug!("cluster {cluster}: bolide probability {metric:.3}");

        if metric >= probability_threshold {
            kept.push(cluster);
        }
    }

    debug!(
        "{} clusters filtered out by the classifier ({} remain)",
        clusters.len() - kept.len(),
        kept.len()
    );
    Ok(kept)
}
