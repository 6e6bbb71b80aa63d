use super::{MappedPoint, Vector3};

/// One logged observation. Appended by the sensor callback, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Seconds since the run started
    pub elapsed: f64,
    /// Raw position of the primary point
    pub position: Vector3,
    pub speed: Option<f64>,
    /// Label of the target that was active when the sample was captured
    pub target: Option<String>,
    /// All finger positions of the frame, primary first
    pub fingers: Vec<Vector3>,
}

impl Sample {
    pub fn new(elapsed: f64, position: Vector3) -> Self {
        Self {
            elapsed,
            position,
            speed: None,
            target: None,
            fingers: vec![position],
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_target(mut self, label: impl Into<String>) -> Self {
        self.target = Some(label.into());
        self
    }
}

/// What the frame loop sees: the latest calibrated point and its speed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MappedSample {
    pub elapsed: f64,
    pub point: MappedPoint,
    pub speed: Option<f64>,
}

/// The sensor's tracking state as of its latest frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tracking {
    Point(MappedSample),
    /// The frame carried no usable point
    Lost,
}

impl Tracking {
    pub fn sample(self) -> Option<MappedSample> {
        match self {
            Tracking::Point(sample) => Some(sample),
            Tracking::Lost => None,
        }
    }
}
