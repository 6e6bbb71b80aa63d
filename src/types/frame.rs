use serde::Deserialize;

use super::Vector3;

/// One fingertip as reported by the tracking bridge
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Finger {
    pub tip_position: Vector3,
    #[serde(default)]
    pub tip_velocity: Option<Vector3>,
}

/// One hand (palm) as reported by the tracking bridge
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Hand {
    pub palm_position: Vector3,
    #[serde(default)]
    pub palm_normal: Vector3,
    #[serde(default)]
    pub palm_velocity: Vector3,
}

/// A single sensor frame. Frames without fingers carry no trackable point.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SensorFrame {
    /// Sensor clock, microseconds
    pub timestamp_us: i64,
    #[serde(default)]
    pub fingers: Vec<Finger>,
    #[serde(default)]
    pub hands: Vec<Hand>,
}

impl SensorFrame {
    pub fn primary_finger(&self) -> Option<&Finger> {
        self.fingers.first()
    }

    pub fn is_trackable(&self) -> bool {
        !self.fingers.is_empty()
    }

    pub fn finger_positions(&self) -> Vec<Vector3> {
        self.fingers.iter().map(|f| f.tip_position).collect()
    }

    /// Speed of the primary fingertip, mm/s
    pub fn primary_speed(&self) -> Option<f64> {
        self.primary_finger()
            .and_then(|f| f.tip_velocity)
            .map(|v| v.norm())
    }

    pub fn seconds_since(&self, start_us: i64) -> f64 {
        (self.timestamp_us - start_us) as f64 / 1_000_000.0
    }
}

/// Anything that wants to see every frame the sensor thread receives.
/// Called from the ingest thread, so implementations must not block for long.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: &SensorFrame);
}

/// Hands each frame to several sinks in order
pub struct FrameFanout {
    sinks: Vec<std::sync::Arc<dyn FrameSink>>,
}

impl FrameFanout {
    pub fn new(sinks: Vec<std::sync::Arc<dyn FrameSink>>) -> Self {
        Self { sinks }
    }
}

impl FrameSink for FrameFanout {
    fn on_frame(&self, frame: &SensorFrame) {
        for sink in &self.sinks {
            sink.on_frame(frame);
        }
    }
}
