pub mod calibration;
pub mod export;
pub mod postural;
pub mod tapping;
pub mod targets;

pub use calibration::CalibrationHandler;
pub use export::ExportHandler;
pub use postural::PosturalHandler;
pub use tapping::TappingHandler;
pub use targets::TargetRunHandler;
