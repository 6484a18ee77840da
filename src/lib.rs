pub mod calibration;
pub mod clustering;
pub mod constants;
pub mod detections;
pub mod filters;
pub mod geodesy;
pub mod pipeline;
pub mod stereo;
pub mod time;
pub mod trigger_errors;
