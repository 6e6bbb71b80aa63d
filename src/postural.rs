//! Two-hand postural tremor capture. Runs straight off the sensor thread:
//! frames are only recorded while both hands are visible, for a fixed
//! stretch of sensor time after the start trigger.

use std::sync::{Mutex, PoisonError};

use log::info;
use serde::{Deserialize, Serialize};

use crate::types::{FrameSink, Hand, SensorFrame, Vector3};

/// How a postural recording starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PosturalTrigger {
    /// An assistant presses the start key
    Keyboard,
    /// Starts by itself once both palms are inside the interaction box
    HandPositioning,
}

/// Axis-aligned box in sensor space, centred on `center`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionBox {
    pub center: Vector3,
    pub size: Vector3,
}

impl InteractionBox {
    pub fn new(center: Vector3, size: Vector3) -> Self {
        Self { center, size }
    }

    /// Strictly inside on every axis
    pub fn contains(&self, p: Vector3) -> bool {
        let inside = |v: f64, c: f64, s: f64| (v - c).abs() < s / 2.0;
        inside(p.x, self.center.x, self.size.x)
            && inside(p.y, self.center.y, self.size.y)
            && inside(p.z, self.center.z, self.size.z)
    }
}

/// One recorded frame: both palms plus every visible fingertip
#[derive(Debug, Clone, PartialEq)]
pub struct PosturalRow {
    pub elapsed: f64,
    pub left: Hand,
    pub right: Hand,
    pub fingers: Vec<Vector3>,
}

impl PosturalRow {
    /// Left hand first, decided by palm x
    pub fn from_frame(frame: &SensorFrame, elapsed: f64) -> Option<Self> {
        let [a, b] = frame.hands.as_slice() else {
            return None;
        };
        let (left, right) = if a.palm_position.x < b.palm_position.x { (a, b) } else { (b, a) };
        Some(Self {
            elapsed,
            left: left.clone(),
            right: right.clone(),
            fingers: frame.finger_positions(),
        })
    }

    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![self.elapsed.to_string()];
        let vectors = [
            self.left.palm_position,
            self.right.palm_position,
            self.left.palm_normal,
            self.right.palm_normal,
            self.left.palm_velocity,
            self.right.palm_velocity,
        ];
        for v in vectors.iter().chain(self.fingers.iter()) {
            cells.extend([v.x.to_string(), v.y.to_string(), v.z.to_string()]);
        }
        cells
    }
}

/// Two header lines: the quantity groups, then the axes
pub fn postural_header(max_fingers: usize) -> Vec<Vec<String>> {
    let mut groups = vec!["Time (s)".to_string()];
    let mut axes = vec![String::new()];
    let named = [
        ("Left palm position (mm)", ["x", "y", "z"]),
        ("Right palm position (mm)", ["x", "y", "z"]),
        ("Left palm normal", ["i", "j", "k"]),
        ("Right palm normal", ["i", "j", "k"]),
        ("Left palm velocity (mm/s)", ["x", "y", "z"]),
        ("Right palm velocity (mm/s)", ["x", "y", "z"]),
    ];
    for (name, axis) in named {
        groups.extend([name.to_string(), String::new(), String::new()]);
        axes.extend(axis.iter().map(|a| a.to_string()));
    }
    for i in 0..max_fingers {
        groups.extend([format!("Finger {}", i + 1), String::new(), String::new()]);
        axes.extend(["x", "y", "z"].iter().map(|a| a.to_string()));
    }
    vec![groups, axes]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PosturalPhase {
    Idle,
    /// Waiting for the start key or for both palms to be in place
    Positioning,
    /// `start_us` is set by the first two-hand frame of the recording
    Recording { start_us: Option<i64> },
    Finished { duration_s: f64 },
}

#[derive(Debug)]
struct RecorderState {
    phase: PosturalPhase,
    rows: Vec<PosturalRow>,
}

/// Sensor-thread recorder for one postural session
pub struct PosturalRecorder {
    trigger: PosturalTrigger,
    interaction_box: InteractionBox,
    duration_s: f64,
    state: Mutex<RecorderState>,
}

impl PosturalRecorder {
    pub fn new(trigger: PosturalTrigger, interaction_box: InteractionBox, duration_s: f64) -> Self {
        Self {
            trigger,
            interaction_box,
            duration_s,
            state: Mutex::new(RecorderState {
                phase: PosturalPhase::Idle,
                rows: Vec::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears earlier rows and waits for the trigger
    pub fn arm(&self) {
        let mut state = self.state();
        state.rows.clear();
        state.phase = PosturalPhase::Positioning;
        info!("Postural capture armed ({:?} trigger)", self.trigger);
    }

    /// The start key; ignored unless armed with the keyboard trigger
    pub fn key_start(&self) -> bool {
        let mut state = self.state();
        if self.trigger != PosturalTrigger::Keyboard || state.phase != PosturalPhase::Positioning {
            return false;
        }
        state.phase = PosturalPhase::Recording { start_us: None };
        true
    }

    pub fn cancel(&self) {
        let mut state = self.state();
        state.phase = PosturalPhase::Idle;
        state.rows.clear();
    }

    pub fn phase(&self) -> PosturalPhase {
        self.state().phase
    }

    pub fn rows_recorded(&self) -> usize {
        self.state().rows.len()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase(), PosturalPhase::Finished { .. })
    }

    /// Hands the rows over once finished and goes back to idle
    pub fn take_rows(&self) -> Option<Vec<PosturalRow>> {
        let mut state = self.state();
        if !matches!(state.phase, PosturalPhase::Finished { .. }) {
            return None;
        }
        state.phase = PosturalPhase::Idle;
        Some(std::mem::take(&mut state.rows))
    }

    fn palms_in_place(&self, frame: &SensorFrame) -> bool {
        frame.hands.len() == 2
            && frame
                .hands
                .iter()
                .all(|h| self.interaction_box.contains(h.palm_position))
    }
}

impl FrameSink for PosturalRecorder {
    fn on_frame(&self, frame: &SensorFrame) {
        let mut state = self.state();
        match state.phase {
            PosturalPhase::Idle | PosturalPhase::Finished { .. } => {}
            PosturalPhase::Positioning => {
                if self.trigger == PosturalTrigger::HandPositioning && self.palms_in_place(frame) {
                    info!("Both hands in position, postural recording started");
                    state.phase = PosturalPhase::Recording { start_us: None };
                }
            }
            PosturalPhase::Recording { start_us } => {
                if frame.hands.len() != 2 {
                    return;
                }
                let start_us = start_us.unwrap_or(frame.timestamp_us);
                state.phase = PosturalPhase::Recording { start_us: Some(start_us) };

                let elapsed = frame.seconds_since(start_us);
                if elapsed >= self.duration_s {
                    info!("Postural recording finished: {} rows", state.rows.len());
                    state.phase = PosturalPhase::Finished { duration_s: elapsed };
                    return;
                }
                if let Some(row) = PosturalRow::from_frame(frame, elapsed) {
                    state.rows.push(row);
                }
            }
        }
    }
}
