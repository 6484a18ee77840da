//! # Time helpers
//!
//! GLM products carry two clocks:
//!
//! - the **product time**, a floating number of seconds since 2000-01-01T12:00:00 UTC
//!   stored in each file,
//! - per-group **time offsets**, relative to the product time of their file.
//!
//! The trigger pipeline re-bases every offset on the product time of the first file of
//! a processing window (the window `base_time`) and works in Unix seconds otherwise.
//! [`hifitime`] is used when an absolute epoch must be rendered for a collaborator.

use hifitime::Epoch;

use crate::constants::{Second, UnixSeconds, GOES_PRODUCT_EPOCH, MILLISECOND_OFFSET_CUTOFF};

/// Convert a GOES product time (seconds since 2000-01-01T12:00:00) to Unix seconds.
pub fn product_time_to_unix(product_time: Second) -> UnixSeconds {
    GOES_PRODUCT_EPOCH + product_time
}

/// Scale factor turning a file's stored time offsets into seconds.
///
/// Files produced before 2018-12-04 stored their offsets in milliseconds.
pub fn time_offset_scale(file_base_time: UnixSeconds) -> f64 {
    if file_base_time < MILLISECOND_OFFSET_CUTOFF {
        1e-3
    } else {
        1.0
    }
}

/// Return true if `time` lies in the second half of its processing interval.
///
/// Arguments
/// ---------
/// * `time`: absolute time in Unix seconds
/// * `process_interval`: length of one GLM file in seconds (20 s for L2 LCFA)
///
/// Return
/// ------
/// * `true` when `time mod process_interval >= process_interval / 2`
pub fn in_file_latter_half(time: UnixSeconds, process_interval: Second) -> bool {
    time.rem_euclid(process_interval) >= process_interval / 2.0
}

/// Build a [`hifitime::Epoch`] from Unix seconds.
pub fn unix_to_epoch(time: UnixSeconds) -> Epoch {
    Epoch::from_unix_seconds(time)
}

/// Render Unix seconds as an ISO-8601 UTC string with microsecond precision,
/// e.g. `2024-05-01T10:15:21.123456Z`.
pub fn unix_to_iso_utc(time: UnixSeconds) -> String {
    let (year, month, day, hour, minute, second, nanos) = unix_to_epoch(time).to_gregorian_utc();
    format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{:06}Z",
        nanos / 1_000
    )
}
