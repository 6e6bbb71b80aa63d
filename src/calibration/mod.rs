//! Screen calibration: the scale and origin that turn sensor millimetres
//! into display pixels, how they are persisted, and the two-marker
//! procedure that regenerates them.

pub mod auto;
pub mod data;

use std::path::PathBuf;

pub use auto::{AutoCalibration, CalibrationStep, CalibrationTap};
pub use data::{CalibrationData, CoordinateMapper};

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("Calibration file not found: {0}")]
    Missing(PathBuf),
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Parse error: {0}")]
    Parse(toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Invalid scale: {0} px/mm")]
    InvalidScale(f64),
    #[error("Calibration origin is not finite")]
    InvalidOrigin,
    #[error("Marker {marker}: {got} samples, need at least {need}")]
    NotEnoughSamples { marker: usize, got: usize, need: usize },
    #[error("Markers too close together in sensor space ({0:.2} mm)")]
    Degenerate(f64),
}
