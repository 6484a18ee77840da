//! # Stereo velocity estimation
//!
//! For a cluster seen by a valid [`stereo_pair`], every detection of the satellite with the
//! fewest samples is associated with the closest-in-time detection of the other satellite.
//! Each associated pair is triangulated and a constant velocity model
//!
//! ```text
//! p(t) = p₀ + v · t
//! ```
//!
//! is fitted independently on each ECEF axis by ordinary least squares.
//!
//! ## Sample selection
//!
//! A detection takes part in the fit when it:
//!
//! - is seen by one of the two stereo satellites,
//! - has an energy above 10 % of the largest energy among them,
//! - has a parent group made of more than one pixel event,
//! - is the peak of its time step and is fit.
//!
//! Fewer than [`MIN_NUM_POINTS_FOR_VEL_ESTIMATE`] associated pairs, or a fitted speed above
//! [`MAX_SPEED_KM_PER_S`], leave the cluster without a velocity.

use log::debug;
use nalgebra::DMatrix;

use super::{stereo_pair, triangulate};
use crate::constants::{
    ClusterId, Second, MAX_SPEED_KM_PER_S, MIN_NUM_POINTS_FOR_VEL_ESTIMATE,
    POINT_SOURCE_ASSOCIATION_WINDOW, VELOCITY_ENERGY_FRACTION,
};
use crate::detections::stats::{argmin, argsort};
use crate::detections::DetectionSet;
use crate::geodesy::Ecef;

/// One triangulated point of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    /// Mean time of the two associated detections, relative to the earliest sample
    pub time: Second,
    pub position: Ecef,
}

/// Detections of `cluster` usable for the velocity fit (see the module documentation).
pub fn velocity_candidates(set: &DetectionSet, cluster: ClusterId) -> Vec<usize> {
    let indices = set.cluster_indices(cluster);
    let Some((first, second)) = stereo_pair(set, &indices) else {
        return vec![];
    };

    let detections = set.detections();
    let pair: Vec<usize> = indices
        .into_iter()
        .filter(|&i| {
            let sat = detections[i].satellite_id;
            sat == first || sat == second
        })
        .collect();

    let peak_energy = pair
        .iter()
        .map(|&i| detections[i].energy)
        .fold(f64::NEG_INFINITY, f64::max);
    let energy_floor = peak_energy * VELOCITY_ENERGY_FRACTION;
    let group_sizes = set.group_sizes();

    pair.into_iter()
        .filter(|&i| {
            let d = &detections[i];
            d.energy > energy_floor
                && group_sizes.get(&d.group_key()).copied().unwrap_or(0) > 1
                && d.fitness
                && d.is_peak_for_time
        })
        .collect()
}

/// Pair each detection of the least sampled satellite with the closest-in-time detection of
/// the other one.
///
/// Arguments
/// ---------
/// * `set`: the detection set
/// * `candidates`: detections of exactly two satellites
///
/// Return
/// ------
/// * `(least, most)` index pairs in ascending time of the least sampled satellite. Samples
///   without a partner closer than [`POINT_SOURCE_ASSOCIATION_WINDOW`] are dropped. Empty
///   when the candidates do not span two satellites.
pub fn associate_lines_of_sight(set: &DetectionSet, candidates: &[usize]) -> Vec<(usize, usize)> {
    let satellites = set.satellites_of(candidates);
    if satellites.len() <= 1 {
        return vec![];
    }

    let counts: Vec<f64> = satellites
        .iter()
        .map(|&sat| set.indices_for_satellite(candidates, sat).len() as f64)
        .collect();
    let Some(least_pos) = argmin(&counts) else {
        return vec![];
    };
    let least_sat = satellites[least_pos];
    let Some(&most_sat) = satellites.iter().find(|&&sat| sat != least_sat) else {
        return vec![];
    };

    let by_time = |sat| {
        let indices = set.indices_for_satellite(candidates, sat);
        let times: Vec<f64> = indices.iter().map(|&i| set.detections()[i].time).collect();
        argsort(&times).into_iter().map(|k| indices[k]).collect::<Vec<usize>>()
    };
    let least = by_time(least_sat);
    let most = by_time(most_sat);
    let most_times: Vec<f64> = most.iter().map(|&i| set.detections()[i].time).collect();

    least
        .into_iter()
        .filter_map(|i| {
            let t = set.detections()[i].time;
            let diffs: Vec<f64> = most_times.iter().map(|m| (m - t).abs()).collect();
            let k = argmin(&diffs)?;
            (diffs[k] < POINT_SOURCE_ASSOCIATION_WINDOW).then_some((i, most[k]))
        })
        .collect()
}

/// Triangulate every associated pair and shift the times so that the earliest sample is at 0.
pub fn trajectory_samples(set: &DetectionSet, pairs: &[(usize, usize)]) -> Vec<TrajectorySample> {
    let detections = set.detections();
    let mut samples: Vec<TrajectorySample> = pairs
        .iter()
        .map(|&(a, b)| TrajectorySample {
            time: (detections[a].time + detections[b].time) / 2.0,
            position: triangulate(&detections[a], &detections[b]),
        })
        .collect();

    let t0 = samples.iter().map(|s| s.time).fold(f64::INFINITY, f64::min);
    for s in &mut samples {
        s.time -= t0;
    }
    samples
}

/// Least squares fit of `p(t) = p₀ + v · t` on each axis.
///
/// Solved with the normal equations `β = (TᵀT)⁻¹ Tᵀ P` where `T = [1, t]`.
///
/// Return
/// ------
/// * the velocity in m/s, or `None` with fewer than two distinct sample times
pub fn fit_constant_velocity(samples: &[TrajectorySample]) -> Option<Ecef> {
    let n = samples.len();
    if n < 2 {
        return None;
    }

    let t = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { samples[r].time });
    let p = DMatrix::from_fn(n, 3, |r, c| samples[r].position[c]);

    let t_t = t.transpose();
    let normal = (&t_t * &t).try_inverse()?;
    let beta = normal * t_t * p;

    let velocity = Ecef::new(beta[(1, 0)], beta[(1, 1)], beta[(1, 2)]);
    velocity.iter().all(|v| v.is_finite()).then_some(velocity)
}

/// Velocity of one cluster, `None` when it cannot be estimated or is implausible.
pub fn estimate_velocity(set: &DetectionSet, cluster: ClusterId) -> Option<Ecef> {
    let candidates = velocity_candidates(set, cluster);
    if candidates.is_empty() {
        debug!("cluster {cluster}: too few good lines of sight for a velocity estimate");
        return None;
    }

    let pairs = associate_lines_of_sight(set, &candidates);
    if pairs.len() < MIN_NUM_POINTS_FOR_VEL_ESTIMATE {
        debug!(
            "cluster {cluster}: {} associated pairs, {MIN_NUM_POINTS_FOR_VEL_ESTIMATE} needed for a velocity estimate",
            pairs.len()
        );
        return None;
    }

    let velocity = fit_constant_velocity(&trajectory_samples(set, &pairs))?;
    let speed = velocity.norm() / 1e3;
    if speed > MAX_SPEED_KM_PER_S {
        debug!("cluster {cluster}: estimated speed {speed:.1} km/s discarded");
        return None;
    }
    Some(velocity)
}

/// Estimate and store the velocity of every cluster of `clusters` that supports one.
pub fn estimate_velocities(set: &mut DetectionSet, clusters: &[ClusterId]) {
    for &cluster in clusters {
        if let Some(velocity) = estimate_velocity(set, cluster) {
            debug!("cluster {cluster}: velocity {velocity:?} m/s");
            set.set_velocity(cluster, velocity);
        }
    }
}

#[cfg(test)]
mod velocity_test {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(time: f64, x: f64, y: f64, z: f64) -> TrajectorySample {
        TrajectorySample {
            time,
            position: Ecef::new(x, y, z),
        }
    }

    #[test]
    fn test_fit_exact_line() {
        let v = Ecef::new(12e3, -3e3, 7e3);
        let p0 = Ecef::new(1e6, -5e6, 3e6);
        let samples: Vec<TrajectorySample> = (0..20)
            .map(|k| {
                let t = k as f64 * 0.05;
                let p = p0 + v * t;
                sample(t, p.x, p.y, p.z)
            })
            .collect();

        let fitted = fit_constant_velocity(&samples).unwrap();
        assert_relative_eq!(fitted, v, epsilon = 1e-3);
    }

    #[test]
    fn test_fit_noisy_line() {
        // symmetric residuals around the line leave the slope unchanged
        let samples = vec![
            sample(0.0, 10.0, 0.0, 0.0),
            sample(0.0, -10.0, 0.0, 0.0),
            sample(1.0, 1010.0, 0.0, 0.0),
            sample(1.0, 990.0, 0.0, 0.0),
        ];
        let fitted = fit_constant_velocity(&samples).unwrap();
        assert_relative_eq!(fitted.x, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fit_degenerate() {
        assert!(fit_constant_velocity(&[sample(0.0, 1.0, 2.0, 3.0)]).is_none());
        // singular normal matrix
        let same_time = vec![sample(1.0, 0.0, 0.0, 0.0), sample(1.0, 5.0, 0.0, 0.0)];
        assert!(fit_constant_velocity(&same_time).is_none());
    }
}
