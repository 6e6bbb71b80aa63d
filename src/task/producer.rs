use std::sync::Arc;

use super::RunContext;
use crate::types::{FrameSink, MappedSample, Sample, SensorFrame, Tracking};

/// The sensor-side half of a run. Once calibrated, every frame updates the
/// tracking state the frame loop reads: the mapped point, or `Lost` when
/// the frame has no usable finger. Frames with a finger become logged
/// samples while a run is recording.
pub struct SampleProducer {
    context: Arc<RunContext>,
}

impl SampleProducer {
    pub fn new(context: Arc<RunContext>) -> Self {
        Self { context }
    }
}

impl FrameSink for SampleProducer {
    fn on_frame(&self, frame: &SensorFrame) {
        let Some(finger) = frame.primary_finger().filter(|f| f.tip_position.is_finite()) else {
            if self.context.is_calibrated() {
                self.context.post_latest(Tracking::Lost);
            }
            return;
        };

        let speed = frame.primary_speed();
        let mut elapsed = 0.0;
        if self.context.is_recording() {
            elapsed = self.context.elapsed_for(frame.timestamp_us);
            self.context.log_sample(Sample {
                elapsed,
                position: finger.tip_position,
                speed,
                target: self.context.active_label(),
                fingers: frame.finger_positions(),
            });
        }

        if let Some(point) = self.context.map(finger.tip_position) {
            self.context.post_latest(Tracking::Point(MappedSample { elapsed, point, speed }));
        }
    }
}
