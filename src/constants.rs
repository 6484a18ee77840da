//! # Constants and type definitions for the GLM trigger
//!
//! This module centralizes the **physical constants**, **sensor constants**, and **common type
//! definitions** used throughout the `glm_trigger` library.
//!
//! ## Overview
//!
//! - Reference ellipsoid (GRS80) and assumed emission altitudes
//! - Sensor timing and calibration constants of the Geostationary Lightning Mapper (GLM)
//! - Empirically tuned thresholds of the cluster filters that are not exposed as
//!   [`PipelineParams`](crate::pipeline::params::PipelineParams)
//! - Unit and identifier type aliases shared by every module
//!
//! Tunable thresholds (cluster distance, ranks, probabilities, ...) live in
//! [`PipelineParams`](crate::pipeline::params::PipelineParams); the values here are
//! fixed properties of the instrument, the geometry or the trained filters.

use std::f64::consts::PI;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

pub type Degree = f64;
pub type Radian = f64;
pub type Meter = f64;
pub type Second = f64;
pub type Joule = f64;
/// Seconds since 1970-01-01T00:00:00 UTC
pub type UnixSeconds = f64;

/// Identifier of a live cluster (strictly positive)
pub type ClusterId = u32;
/// GOES platform number (16, 17, 18, 19)
pub type SatelliteId = u16;
/// GLM group identifier, unique inside one source file
pub type GroupId = u64;

// -------------------------------------------------------------------------------------------------
// Reference ellipsoid
// -------------------------------------------------------------------------------------------------

/// GRS80 semi-major axis in meters
pub const GRS80_SEMI_MAJOR_AXIS: Meter = 6_378_137.0;

/// GRS80 semi-minor axis in meters
pub const GRS80_SEMI_MINOR_AXIS: Meter = 6_356_752.31414;

/// Threshold of the near-parallel branch in the segment distance computation
pub const SEGMENT_PARALLEL_EPS: f64 = 1e-8;

/// Number of Bowring iterations of the ECEF to geodetic inverse
pub const BOWRING_ITERATIONS: usize = 3;

/// Equatorial inflation of the ellipsoid used to navigate GLM lat/lon to the cloud tops
pub const CLOUD_TOP_EQUATORIAL_ADJUST: Meter = 14e3;

/// Polar inflation of the ellipsoid used to navigate GLM lat/lon to the cloud tops
pub const CLOUD_TOP_POLAR_ADJUST: Meter = 6e3;

/// Altitude of the near (high) end of a line-of-sight segment
pub const LOS_HIGH_ALTITUDE: Meter = 100e3;

/// Altitude of the far (low) end of a line-of-sight segment
pub const LOS_LOW_ALTITUDE: Meter = 0.0;

/// Cloud-top altitude assumed when computing the range to a pixel for calibration
pub const GLM_CLOUD_TOP_ALTITUDE: Meter = 20e3;

/// Altitude assumed for a single-satellite location estimate
pub const DEFAULT_NON_STEREO_ALTITUDE: Meter = 32e3;

/// Length of one degree of latitude, used by the coarse clustering box
pub const METERS_PER_DEGREE_LAT: Meter = 111e3;

/// Inflation of the cluster distance used for the coarse latitude box
pub const ROUGH_LAT_DISTANCE_FACTOR: f64 = 3.0;

/// Inflation of the cluster distance used for the coarse longitude box
pub const ROUGH_LON_DISTANCE_FACTOR: f64 = 7.5;

// -------------------------------------------------------------------------------------------------
// Time
// -------------------------------------------------------------------------------------------------

/// Unix time of the GOES product epoch 2000-01-01T12:00:00
pub const GOES_PRODUCT_EPOCH: UnixSeconds = 946_728_000.0;

/// Files produced before 2018-12-04T00:00:00 store their time offsets in milliseconds
pub const MILLISECOND_OFFSET_CUTOFF: UnixSeconds = 1_543_881_600.0;

/// GLM sample period used for cross-satellite time matching
pub const GLM_SAMPLE_PERIOD: Second = 0.02;

/// Maximum time difference for two lines of sight to be treated as simultaneous
pub const STEREO_TIME_MATCH_WINDOW: Second = GLM_SAMPLE_PERIOD / 2.0;

/// Maximum time difference when pairing samples for the velocity estimate
pub const POINT_SOURCE_ASSOCIATION_WINDOW: Second = GLM_SAMPLE_PERIOD;

// -------------------------------------------------------------------------------------------------
// Stereo geometry
// -------------------------------------------------------------------------------------------------

/// Satellite pairs separated by less than this angle are considered parallel
pub const PARALLEL_THRESHOLD: Radian = PI / 18.0;

/// Minimum number of associated sample pairs to fit a velocity
pub const MIN_NUM_POINTS_FOR_VEL_ESTIMATE: usize = 13;

/// Velocity estimates faster than this are discarded (km/s)
pub const MAX_SPEED_KM_PER_S: f64 = 100.0;

/// Samples below this fraction of the cluster peak energy are ignored by the velocity fit
pub const VELOCITY_ENERGY_FRACTION: f64 = 0.1;

// -------------------------------------------------------------------------------------------------
// Filters
// -------------------------------------------------------------------------------------------------

/// Width of the running average used by the erratic point filter
pub const ENERGY_FILTER_WIDTH: usize = 5;

/// A drop larger than this multiple of the running average marks a point as erratic
pub const ENERGY_FILTER_MAX_DROP: f64 = 5.0;

/// Floor of the running average difference of the erratic point filter
pub const ENERGY_FILTER_MIN_DIFF: Joule = 1e-15;

/// Fraction of the lowest energies whose median is the rank baseline
pub const RANK_BASELINE_FRACTION: f64 = 0.1;

/// Energy percentile above which group sizes are inspected
pub const GROUP_SIZE_ENERGY_PERCENTILE: f64 = 90.0;

/// Groups with more pixel events than this are considered wide
pub const GROUP_SIZE_LIMIT: usize = 5;

/// Clusters with a larger fraction of wide groups are rejected
pub const GROUP_SIZE_METRIC_THRESHOLD: f64 = 0.20;

/// Satellite whose instrument shows stationary artifacts
pub const ANOMALY_SATELLITE: SatelliteId = 19;

/// Known artifact locations (lat, lon) of [`ANOMALY_SATELLITE`]
pub const ANOMALY_LAT_LONS: [(Degree, Degree); 2] = [(-21.2, -121.4), (3.4, -127.9)];

/// Half width, in degrees, of the box around each anomaly location
pub const ANOMALY_TOLERANCE: Degree = 0.5;

// -------------------------------------------------------------------------------------------------
// Calibration
// -------------------------------------------------------------------------------------------------

/// Spectral to integrated irradiance conversion factor
pub const SPECTRAL_TO_INTEGRATED_IRRADIANCE: f64 = 1.16e-6;

/// Half size of the latitude window used to reduce the calibration tables
pub const CALIBRATION_HALF_LAT_WINDOW: Degree = 2.0;

/// Half size of the longitude window used to reduce the calibration tables
pub const CALIBRATION_HALF_LON_WINDOW: Degree = 2.0;

/// Maximum number of alternating steps of the pixel search
pub const PIXEL_SEARCH_MAX_TRIES: usize = 10;

/// Number of identical consecutive steps that ends the pixel search
pub const PIXEL_SEARCH_STABLE_STEPS: usize = 3;

/// Conversion of a summed intensity (W/sr) into a total radiated energy (J): 4π sr / 503
pub const STERADIAN_TO_ENERGY: f64 = 4.0 * PI / 503.0;

/// Upper bound of the longitude convention of the calibration tables (`[-360, 0)`)
pub const CALIBRATION_LONGITUDE_UPPER: Degree = 0.0;

/// Upper bound of the longitude convention of the trigger messages (`[-180, 180)`)
pub const MESSAGE_LONGITUDE_UPPER: Degree = 180.0;
