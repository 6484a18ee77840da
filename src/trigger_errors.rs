use thiserror::Error;

use crate::constants::{ClusterId, SatelliteId};
use crate::detections::Orientation;

#[derive(Error, Debug, Clone)]
pub enum TriggerError {
    #[error("Invalid pipeline parameter: {0}")]
    InvalidParameter(String),

    #[error("Per-detection arrays of a file record have mismatched lengths: {0}")]
    MismatchedLengths(String),

    #[error("No calibration table for satellite {satellite} with orientation {orientation:?}")]
    NoCalibrationTable {
        satellite: SatelliteId,
        orientation: Orientation,
    },

    #[error("Calibration tables have no cell near cluster {0}")]
    NoCalibrationCoverage(ClusterId),

    #[error("Calibration lookup table has no unmasked cell")]
    EmptyLookupTable,

    #[error("Calibration tables do not share the same shape: {0}")]
    CalibrationShape(String),

    #[error("Classifier returned an unusable output: {0}")]
    ClassifierOutput(String),
}

impl PartialEq for TriggerError {
    fn eq(&self, other: &Self) -> bool {
        use TriggerError::*;
        match (self, other) {
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (MismatchedLengths(a), MismatchedLengths(b)) => a == b,
            (
                NoCalibrationTable {
                    satellite: sa,
                    orientation: oa,
                },
                NoCalibrationTable {
                    satellite: sb,
                    orientation: ob,
                },
            ) => sa == sb && oa == ob,
            (NoCalibrationCoverage(a), NoCalibrationCoverage(b)) => a == b,
            (CalibrationShape(a), CalibrationShape(b)) => a == b,
            (ClassifierOutput(a), ClassifierOutput(b)) => a == b,

            (EmptyLookupTable, EmptyLookupTable) => true,

            _ => false,
        }
    }
}
