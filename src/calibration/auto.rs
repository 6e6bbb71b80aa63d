use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{info, warn};

use super::{CalibrationData, CalibrationError};
use crate::types::{FrameSink, Point2, SensorFrame, Vector3};

/// Progress of the auto-calibration after one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStep {
    /// Still holding on the current marker; 0..1 of the hold window
    Collecting { marker: usize, progress: f64 },
    /// The first marker is done, the user should move to the next one
    NextMarker,
    /// Both markers collected
    Done,
}

/// Two-marker screen calibration.
///
/// The user holds a fingertip on each on-screen marker in turn. The hold
/// window of each marker starts with its first sample. The mean sensor
/// position of both markers gives the scale, their midpoint gives the origin.
#[derive(Debug, Clone)]
pub struct AutoCalibration {
    markers: [Point2; 2],
    display_size: (f64, f64),
    hold_seconds: f64,
    min_samples: usize,
    current: usize,
    window_start: Option<f64>,
    collected: [Vec<Vector3>; 2],
}

impl AutoCalibration {
    /// Markers sit on the horizontal centre line, `spacing_px` apart
    pub fn new(display_size: (f64, f64), spacing_px: f64, hold_seconds: f64, min_samples: usize) -> Self {
        let (w, h) = display_size;
        let markers = [
            Point2::new(w / 2.0 - spacing_px / 2.0, h / 2.0),
            Point2::new(w / 2.0 + spacing_px / 2.0, h / 2.0),
        ];
        Self {
            markers,
            display_size,
            hold_seconds,
            min_samples,
            current: 0,
            window_start: None,
            collected: [Vec::new(), Vec::new()],
        }
    }

    pub fn markers(&self) -> &[Point2; 2] {
        &self.markers
    }

    pub fn current_marker(&self) -> Option<Point2> {
        self.markers.get(self.current).copied()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn samples_for(&self, marker: usize) -> usize {
        self.collected.get(marker).map_or(0, Vec::len)
    }

    pub fn is_done(&self) -> bool {
        self.current >= self.markers.len()
    }

    /// Feed one raw primary-finger sample taken at sensor time `t` seconds
    pub fn push(&mut self, t: f64, raw: Vector3) -> CalibrationStep {
        if self.is_done() {
            return CalibrationStep::Done;
        }
        if !raw.is_finite() {
            return CalibrationStep::Collecting { marker: self.current, progress: 0.0 };
        }

        let start = *self.window_start.get_or_insert(t);
        self.collected[self.current].push(raw);

        let elapsed = t - start;
        if elapsed < self.hold_seconds {
            let progress = (elapsed / self.hold_seconds).clamp(0.0, 1.0);
            return CalibrationStep::Collecting { marker: self.current, progress };
        }

        info!(
            "Calibration marker {} collected: {} samples over {:.2}s",
            self.current + 1,
            self.collected[self.current].len(),
            elapsed
        );
        self.current += 1;
        self.window_start = None;
        if self.is_done() {
            CalibrationStep::Done
        } else {
            CalibrationStep::NextMarker
        }
    }

    /// Restart the current marker, e.g. after the finger slipped off
    pub fn restart_marker(&mut self) {
        if let Some(samples) = self.collected.get_mut(self.current) {
            samples.clear();
        }
        self.window_start = None;
    }

    pub fn finish(&self) -> Result<CalibrationData, CalibrationError> {
        let mut means = [Vector3::default(); 2];
        for (i, samples) in self.collected.iter().enumerate() {
            if samples.len() < self.min_samples {
                return Err(CalibrationError::NotEnoughSamples {
                    marker: i + 1,
                    got: samples.len(),
                    need: self.min_samples,
                });
            }
            means[i] = mean(samples);
        }
        solve(self.markers, means, self.display_size)
    }
}

fn mean(samples: &[Vector3]) -> Vector3 {
    let n = samples.len() as f64;
    let sum = samples.iter().fold(Vector3::default(), |acc, v| {
        Vector3::new(acc.x + v.x, acc.y + v.y, acc.z + v.z)
    });
    Vector3::new(sum.x / n, sum.y / n, sum.z / n)
}

/// Scale and origin from two marker positions and the mean sensor
/// positions recorded on them
pub fn solve(
    markers: [Point2; 2],
    means: [Vector3; 2],
    display_size: (f64, f64),
) -> Result<CalibrationData, CalibrationError> {
    let pixel_distance = markers[0].distance_squared(&markers[1]).sqrt();
    let dx = means[1].x - means[0].x;
    let dy = means[1].y - means[0].y;
    let mm_distance = (dx * dx + dy * dy).sqrt();
    if !mm_distance.is_finite() || mm_distance < 1.0 {
        return Err(CalibrationError::Degenerate(mm_distance));
    }

    let ppmm = pixel_distance / mm_distance;
    let (w, h) = display_size;
    let mid_px = Point2::new((markers[0].x + markers[1].x) / 2.0, (markers[0].y + markers[1].y) / 2.0);
    let mid_x = (means[0].x + means[1].x) / 2.0;
    let mid_y = (means[0].y + means[1].y) / 2.0;

    let origin_x = mid_x - (mid_px.x - w / 2.0) / ppmm;
    let origin_y = mid_y + (mid_px.y - h / 2.0) / ppmm;

    let data = CalibrationData::new(ppmm, origin_x, origin_y);
    data.validate()?;
    info!("Calibration solved: {:.3} px/mm, origin ({:.1}, {:.1}) mm", ppmm, origin_x, origin_y);
    Ok(data)
}

/// Forwards primary-finger positions to the calibration screen while armed
pub struct CalibrationTap {
    sender: Sender<(f64, Vector3)>,
    armed: AtomicBool,
}

impl CalibrationTap {
    pub fn new(capacity: usize) -> (Self, Receiver<(f64, Vector3)>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let tap = Self {
            sender,
            armed: AtomicBool::new(false),
        };
        (tap, receiver)
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::Relaxed);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Relaxed);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Relaxed)
    }
}

impl FrameSink for CalibrationTap {
    fn on_frame(&self, frame: &SensorFrame) {
        if !self.is_armed() {
            return;
        }
        let Some(finger) = frame.primary_finger() else {
            return;
        };
        let t = frame.timestamp_us as f64 / 1_000_000.0;
        match self.sender.try_send((t, finger.tip_position)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Calibration channel full, dropping sample"),
            Err(TrySendError::Disconnected(_)) => self.disarm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CoordinateMapper;
    use crate::types::Finger;

    fn feed(cal: &mut AutoCalibration, start: f64, raw: Vector3, count: usize, rate: f64) -> CalibrationStep {
        let mut step = CalibrationStep::Done;
        for i in 0..count {
            step = cal.push(start + i as f64 / rate, raw);
        }
        step
    }

    #[test]
    fn two_markers_recover_the_scale() {
        // markers 400px apart, finger moved 100mm: 4 px/mm
        let mut cal = AutoCalibration::new((800.0, 600.0), 400.0, 1.0, 10);
        let step = feed(&mut cal, 0.0, Vector3::new(-50.0, 200.0, 0.0), 101, 100.0);
        assert_eq!(step, CalibrationStep::NextMarker);
        let step = feed(&mut cal, 5.0, Vector3::new(50.0, 200.0, 0.0), 101, 100.0);
        assert_eq!(step, CalibrationStep::Done);

        let data = cal.finish().unwrap();
        assert!((data.ppmm - 4.0).abs() < 1e-9);
        assert!(data.origin_x.abs() < 1e-9);
        assert!((data.origin_y - 200.0).abs() < 1e-9);

        let left = data.map(Vector3::new(-50.0, 200.0, 0.0), (800.0, 600.0));
        assert!((left.x - 200.0).abs() < 1e-9);
        assert!((left.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn progress_grows_within_the_window() {
        let mut cal = AutoCalibration::new((800.0, 600.0), 400.0, 2.0, 2);
        cal.push(10.0, Vector3::new(0.0, 0.0, 0.0));
        let step = cal.push(11.0, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(step, CalibrationStep::Collecting { marker: 0, progress: 0.5 });
    }

    #[test]
    fn too_few_samples_fail() {
        let mut cal = AutoCalibration::new((800.0, 600.0), 400.0, 0.5, 50);
        feed(&mut cal, 0.0, Vector3::new(-50.0, 200.0, 0.0), 10, 10.0);
        feed(&mut cal, 5.0, Vector3::new(50.0, 200.0, 0.0), 10, 10.0);
        assert!(cal.is_done());
        assert!(matches!(
            cal.finish(),
            Err(CalibrationError::NotEnoughSamples { marker: 1, .. })
        ));
    }

    #[test]
    fn markers_at_the_same_spot_are_degenerate() {
        let markers = [Point2::new(200.0, 300.0), Point2::new(600.0, 300.0)];
        let same = Vector3::new(1.0, 2.0, 3.0);
        assert!(matches!(
            solve(markers, [same, same], (800.0, 600.0)),
            Err(CalibrationError::Degenerate(_))
        ));
    }

    #[test]
    fn restart_discards_the_current_marker() {
        let mut cal = AutoCalibration::new((800.0, 600.0), 400.0, 1.0, 2);
        cal.push(0.0, Vector3::new(0.0, 0.0, 0.0));
        cal.push(0.1, Vector3::new(0.0, 0.0, 0.0));
        cal.restart_marker();
        assert_eq!(cal.samples_for(0), 0);
        assert_eq!(cal.current_index(), 0);
    }

    #[test]
    fn tap_only_forwards_while_armed() {
        let (tap, rx) = CalibrationTap::new(8);
        let frame = SensorFrame {
            timestamp_us: 2_000_000,
            fingers: vec![Finger { tip_position: Vector3::new(1.0, 2.0, 3.0), tip_velocity: None }],
            hands: Vec::new(),
        };
        tap.on_frame(&frame);
        assert!(rx.try_recv().is_err());
        tap.arm();
        tap.on_frame(&frame);
        assert_eq!(rx.try_recv().unwrap(), (2.0, Vector3::new(1.0, 2.0, 3.0)));
    }
}
