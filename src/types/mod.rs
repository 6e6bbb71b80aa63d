pub mod data_point;
pub mod frame;
pub mod sample;
pub mod results;

pub use data_point::{MappedPoint, Point2, Vector3};
pub use frame::{Finger, FrameFanout, FrameSink, Hand, SensorFrame};
pub use sample::{MappedSample, Sample, Tracking};
pub use results::{ExportResult, RunOutcome, RunRecord};
