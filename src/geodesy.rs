//! # Geodesy kernel
//!
//! Stateless coordinate helpers on the **GRS80** ellipsoid used by every stage of the
//! trigger pipeline.
//!
//! ## Overview
//!
//! - [`adjusted_geodetic_to_ecef`] / [`geodetic_to_ecef`]: geodetic (lat, lon, height) to
//!   Earth-Centered-Earth-Fixed, optionally on an *inflated* ellipsoid. GLM navigates its
//!   pixels on a cloud-top ellipsoid (+14 km at the equator, +6 km at the poles), so the
//!   physically correct direction of a line of sight is recovered by re-navigating the
//!   published lat/lon on that same inflated surface.
//! - [`ecef_to_geodetic`]: Bowring's iterative inverse (three iterations).
//! - [`find_pierce_at_altitude`]: intersection of a satellite line of sight with the ellipsoid
//!   inflated by a constant altitude.
//! - [`closest_distance_between_segments`]: minimum distance between two finite segments
//!   (Sunday's algorithm), the metric of the clustering engine and the stereo triangulation.
//! - [`wrap_longitude`]: longitude folding onto `[upper - 360, upper)`.
//!
//! All positions are [`nalgebra::Vector3<f64>`] in meters.

use nalgebra::Vector3;

use crate::constants::{
    Degree, Meter, BOWRING_ITERATIONS, CLOUD_TOP_EQUATORIAL_ADJUST, CLOUD_TOP_POLAR_ADJUST,
    GRS80_SEMI_MAJOR_AXIS, GRS80_SEMI_MINOR_AXIS, LOS_HIGH_ALTITUDE, LOS_LOW_ALTITUDE,
    SEGMENT_PARALLEL_EPS,
};

/// Earth-Centered-Earth-Fixed position in meters.
pub type Ecef = Vector3<f64>;

/// Geodetic coordinates on the GRS80 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    pub lat: Degree,
    pub lon: Degree,
    pub alt: Meter,
}

/// Convert geodetic coordinates to ECEF on the GRS80 ellipsoid.
///
/// Arguments
/// ---------
/// * `lat`, `lon`: geodetic latitude and longitude in degrees
/// * `height`: height above the ellipsoid in meters
///
/// Return
/// ------
/// * the ECEF position in meters
pub fn geodetic_to_ecef(lat: Degree, lon: Degree, height: Meter) -> Ecef {
    adjusted_geodetic_to_ecef(lat, lon, height, 0.0, 0.0)
}

/// Convert geodetic coordinates to ECEF on an inflated GRS80 ellipsoid.
///
/// The semi-major axis is inflated by `equatorial_adjust` and the semi-minor axis by
/// `polar_adjust`; flattening and eccentricity are recomputed from the inflated axes.
///
/// Arguments
/// ---------
/// * `lat`, `lon`: latitude and longitude in degrees
/// * `height`: height above the inflated ellipsoid in meters
/// * `equatorial_adjust`: semi-major axis adjustment in meters
/// * `polar_adjust`: semi-minor axis adjustment in meters
///
/// Return
/// ------
/// * the ECEF position in meters
///
/// See also
/// --------
/// * [`ecef_to_geodetic`] – Inverse transform on the nominal ellipsoid.
pub fn adjusted_geodetic_to_ecef(
    lat: Degree,
    lon: Degree,
    height: Meter,
    equatorial_adjust: Meter,
    polar_adjust: Meter,
) -> Ecef {
    let a = GRS80_SEMI_MAJOR_AXIS + equatorial_adjust;
    let b = GRS80_SEMI_MINOR_AXIS + polar_adjust;

    let flattening = (a - b) / a;
    let e2 = 2.0 * flattening - flattening * flattening;

    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();

    let normal = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    Vector3::new(
        (normal + height) * cos_lat * cos_lon,
        (normal + height) * cos_lat * sin_lon,
        (normal * (1.0 - e2) + height) * sin_lat,
    )
}

/// Convert an ECEF position to geodetic coordinates using Bowring's method.
///
/// Three iterations are performed, which is well below the millimeter level for
/// positions between the surface and low Earth orbit.
///
/// Arguments
/// ---------
/// * `position`: ECEF position in meters
///
/// Return
/// ------
/// * a [`Geodetic`] with latitude/longitude in degrees and altitude in meters
pub fn ecef_to_geodetic(position: &Ecef) -> Geodetic {
    let a = GRS80_SEMI_MAJOR_AXIS;
    let b = GRS80_SEMI_MINOR_AXIS;
    let e1_sq = (a * a - b * b) / (a * a);
    let e2_sq = (a * a - b * b) / (b * b);

    let (x, y, z) = (position.x, position.y, position.z);
    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    let mut beta = (z * a).atan2(p * b);
    let mut lat = beta;
    for _ in 0..BOWRING_ITERATIONS {
        let n = z + b * e2_sq * beta.sin().powi(3);
        let d = p - a * e1_sq * beta.cos().powi(3);
        lat = n.atan2(d);
        beta = (b * lat.sin()).atan2(a * lat.cos());
    }

    let normal = a / (1.0 - e1_sq * lat.sin().powi(2)).sqrt();
    let alt = p / lat.cos() - normal;

    Geodetic {
        lat: lat.to_degrees(),
        lon: lon.to_degrees(),
        alt,
    }
}

/// Find where the ray from `satellite` through `look_point` pierces the GRS80 ellipsoid
/// inflated by `altitude` on both axes.
///
/// The nearest intersection along the ray is returned.
///
/// Arguments
/// ---------
/// * `satellite`: ECEF position of the satellite
/// * `look_point`: any ECEF point on the line of sight (beyond the satellite)
/// * `altitude`: inflation of both ellipsoid axes in meters
///
/// Return
/// ------
/// * `Some(point)` on intersection, `None` when the ray misses the shell, when the shell
///   is behind the satellite or when `look_point == satellite`.
pub fn find_pierce_at_altitude(satellite: &Ecef, look_point: &Ecef, altitude: Meter) -> Option<Ecef> {
    let a = GRS80_SEMI_MAJOR_AXIS + altitude;
    let b = GRS80_SEMI_MINOR_AXIS + altitude;
    let ratio = (a * a) / (b * b);

    let direction = (look_point - satellite).try_normalize(0.0)?;

    let a1 = direction.x.powi(2) + direction.y.powi(2) + ratio * direction.z.powi(2);
    let a2 = 2.0
        * (satellite.x * direction.x
            + satellite.y * direction.y
            + ratio * satellite.z * direction.z);
    let a3 = satellite.x.powi(2) + satellite.y.powi(2) + ratio * satellite.z.powi(2) - a * a;

    let discriminant = a2 * a2 - 4.0 * a1 * a3;
    if discriminant < 0.0 || a1 == 0.0 {
        return None;
    }

    let t = (-a2 - discriminant.sqrt()) / (2.0 * a1);
    if t <= 0.0 {
        return None;
    }
    Some(satellite + t * direction)
}

/// Line of sight segment of a GLM lat/lon.
///
/// The lat/lon is re-navigated on the cloud-top ellipsoid, then the ray from the satellite
/// through that point is pierced at 100 km and at the surface.
///
/// Return
/// ------
/// * `Some((near, far))`, or `None` if either pierce point does not exist
pub fn cloud_top_line_of_sight(satellite: &Ecef, lat: Degree, lon: Degree) -> Option<(Ecef, Ecef)> {
    let cloud_top = adjusted_geodetic_to_ecef(
        lat,
        lon,
        0.0,
        CLOUD_TOP_EQUATORIAL_ADJUST,
        CLOUD_TOP_POLAR_ADJUST,
    );
    let near = find_pierce_at_altitude(satellite, &cloud_top, LOS_HIGH_ALTITUDE)?;
    let far = find_pierce_at_altitude(satellite, &cloud_top, LOS_LOW_ALTITUDE)?;
    Some((near, far))
}

/// Closest approach between two finite segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentApproach {
    /// Minimum distance between the segments in meters
    pub distance: Meter,
    /// Point of the first segment realizing the minimum
    pub on_first: Ecef,
    /// Point of the second segment realizing the minimum
    pub on_second: Ecef,
}

impl SegmentApproach {
    /// Middle of the closest approach, the triangulated position of two lines of sight.
    pub fn midpoint(&self) -> Ecef {
        (self.on_first + self.on_second) / 2.0
    }
}

/// Compute the closest distance between the segments `[s1_start, s1_end]` and
/// `[s2_start, s2_end]`.
///
/// This is Sunday's algorithm (geomalgorithms.com, `dist3D_Segment_to_Segment`) with clamping
/// of both line parameters to the segments. Near-parallel segments (squared sine of the angle
/// between them below `1e-8`) use a dedicated branch pinned on `s1_start`.
///
/// Arguments
/// ---------
/// * `s1_start`, `s1_end`: first segment
/// * `s2_start`, `s2_end`: second segment
///
/// Return
/// ------
/// * a [`SegmentApproach`] with the distance and the two closest points
pub fn closest_distance_between_segments(
    s1_start: &Ecef,
    s1_end: &Ecef,
    s2_start: &Ecef,
    s2_end: &Ecef,
) -> SegmentApproach {
    let u = s1_end - s1_start;
    let v = s2_end - s2_start;
    let w = s1_start - s2_start;

    let a = u.dot(&u);
    let b = u.dot(&v);
    let c = v.dot(&v);
    let d = u.dot(&w);
    let e = v.dot(&w);
    let dd = a * c - b * b;

    let mut s_d = dd;
    let mut t_d = dd;
    let mut s_n;
    let mut t_n;

    if dd <= SEGMENT_PARALLEL_EPS * a * c {
        s_n = 0.0;
        s_d = 1.0;
        t_n = e;
        t_d = c;
    } else {
        s_n = b * e - c * d;
        t_n = a * e - b * d;
        if s_n < 0.0 {
            s_n = 0.0;
            t_n = e;
            t_d = c;
        } else if s_n > s_d {
            s_n = s_d;
            t_n = e + b;
            t_d = c;
        }
    }

    if t_n < 0.0 {
        t_n = 0.0;
        if -d < 0.0 {
            s_n = 0.0;
        } else if -d > a {
            s_n = s_d;
        } else {
            s_n = -d;
            s_d = a;
        }
    } else if t_n > t_d {
        t_n = t_d;
        if -d + b < 0.0 {
            s_n = 0.0;
        } else if -d + b > a {
            s_n = s_d;
        } else {
            s_n = -d + b;
            s_d = a;
        }
    }

    let sc = if s_n.abs() < SEGMENT_PARALLEL_EPS {
        0.0
    } else {
        s_n / s_d
    };
    let tc = if t_n.abs() < SEGMENT_PARALLEL_EPS {
        0.0
    } else {
        t_n / t_d
    };

    let on_first = s1_start + sc * u;
    let on_second = s2_start + tc * v;

    SegmentApproach {
        distance: (on_first - on_second).norm(),
        on_first,
        on_second,
    }
}

/// Fold a longitude onto `[upper - 360, upper)`.
///
/// Arguments
/// ---------
/// * `lon`: longitude in degrees
/// * `upper`: excluded upper bound of the output window
///
/// Return
/// ------
/// * the equivalent longitude inside the window
pub fn wrap_longitude(lon: Degree, upper: Degree) -> Degree {
    let lower = upper - 360.0;
    if (lower..upper).contains(&lon) {
        return lon;
    }
    let wrapped = lower + (lon - lower).rem_euclid(360.0);
    // rounding may land exactly on the excluded bound
    if wrapped >= upper {
        lower
    } else {
        wrapped
    }
}
