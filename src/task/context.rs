use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};

use crate::calibration::{CalibrationData, CoordinateMapper};
use crate::types::{MappedPoint, Sample, Tracking, Vector3};

/// Single-slot hand-off: a post overwrites whatever is waiting, a take
/// empties the slot, so no value is consumed twice.
#[derive(Debug, Default)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    pub fn post(&self, value: T) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn take(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn clear(&self) {
        self.take();
    }
}

/// Append-only full-rate sample log. The producer appends without locking,
/// the controller drains it once at the end of a run.
#[derive(Debug)]
pub struct SampleLog {
    sender: Sender<Sample>,
    receiver: Receiver<Sample>,
}

impl SampleLog {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn append(&self, sample: Sample) {
        // both ends live in self, so this cannot disconnect
        if self.sender.send(sample).is_err() {
            warn!("Sample log disconnected, sample dropped");
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn drain(&self) -> Vec<Sample> {
        self.receiver.try_iter().collect()
    }
}

impl Default for SampleLog {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the sensor thread and the frame loop for one
/// application session. One instance lives for the whole session and is
/// reset at the start of every run.
#[derive(Debug)]
pub struct RunContext {
    latest: Mailbox<Tracking>,
    log: SampleLog,
    active_label: Mutex<Option<String>>,
    recording: AtomicBool,
    origin_us: Mutex<Option<i64>>,
    calibration: RwLock<Option<CalibrationData>>,
    display_size: Mutex<(f64, f64)>,
}

impl RunContext {
    pub fn new(display_size: (f64, f64)) -> Self {
        Self {
            latest: Mailbox::new(),
            log: SampleLog::new(),
            active_label: Mutex::new(None),
            recording: AtomicBool::new(false),
            origin_us: Mutex::new(None),
            calibration: RwLock::new(None),
            display_size: Mutex::new(display_size),
        }
    }

    /// Clears the log and mailbox, resets the run clock and starts recording
    pub fn begin_run(&self, first_label: Option<String>) {
        self.recording.store(false, Ordering::SeqCst);
        self.log.drain();
        self.latest.clear();
        *self.origin_us.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.set_active_label(first_label);
        self.recording.store(true, Ordering::SeqCst);
        info!("Recording started");
    }

    /// Stops recording and hands over everything logged since `begin_run`
    pub fn end_run(&self) -> Vec<Sample> {
        self.stop_recording();
        self.latest.clear();
        self.set_active_label(None);
        self.log.drain()
    }

    pub fn stop_recording(&self) {
        if self.recording.swap(false, Ordering::SeqCst) {
            info!("Recording stopped, {} samples logged", self.log.len());
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn set_active_label(&self, label: Option<String>) {
        *self.active_label.lock().unwrap_or_else(PoisonError::into_inner) = label;
    }

    pub fn active_label(&self) -> Option<String> {
        self.active_label.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Seconds since the first frame of the run; that frame defines zero
    pub fn elapsed_for(&self, timestamp_us: i64) -> f64 {
        let mut origin = self.origin_us.lock().unwrap_or_else(PoisonError::into_inner);
        let start = *origin.get_or_insert(timestamp_us);
        (timestamp_us - start) as f64 / 1_000_000.0
    }

    pub fn set_calibration(&self, calibration: CalibrationData) {
        *self.calibration.write().unwrap_or_else(PoisonError::into_inner) = Some(calibration);
    }

    pub fn calibration(&self) -> Option<CalibrationData> {
        self.calibration.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn set_display_size(&self, size: (f64, f64)) {
        *self.display_size.lock().unwrap_or_else(PoisonError::into_inner) = size;
    }

    pub fn display_size(&self) -> (f64, f64) {
        *self.display_size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw sensor position to display pixels, `None` while uncalibrated
    pub fn map(&self, raw: Vector3) -> Option<MappedPoint> {
        let size = self.display_size();
        let calibration = self.calibration.read().unwrap_or_else(PoisonError::into_inner);
        calibration.as_ref().map(|c| c.map_with_depth(raw, size))
    }

    pub fn log_sample(&self, sample: Sample) {
        self.log.append(sample);
    }

    pub fn logged(&self) -> usize {
        self.log.len()
    }

    pub fn post_latest(&self, tracking: Tracking) {
        self.latest.post(tracking);
    }

    /// `None` when no frame arrived since the previous take
    pub fn take_latest(&self) -> Option<Tracking> {
        self.latest.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(elapsed: f64) -> Sample {
        Sample::new(elapsed, Vector3::new(elapsed, 0.0, 0.0))
    }

    #[test]
    fn mailbox_keeps_only_the_latest() {
        let mailbox = Mailbox::new();
        mailbox.post(1);
        mailbox.post(2);
        mailbox.post(3);
        assert_eq!(mailbox.take(), Some(3));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn log_keeps_everything_in_order() {
        let log = SampleLog::new();
        for i in 0..5 {
            log.append(sample(i as f64));
        }
        assert_eq!(log.len(), 5);
        let drained: Vec<f64> = log.drain().iter().map(|s| s.elapsed).collect();
        assert_eq!(drained, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(log.is_empty());
    }

    #[test]
    fn begin_run_clears_the_previous_run() {
        let ctx = RunContext::new((800.0, 600.0));
        ctx.log_sample(sample(0.0));
        ctx.elapsed_for(5_000_000);
        ctx.begin_run(Some("NW".to_string()));
        assert_eq!(ctx.logged(), 0);
        assert!(ctx.is_recording());
        assert_eq!(ctx.active_label().as_deref(), Some("NW"));
        assert_eq!(ctx.elapsed_for(9_000_000), 0.0);
        assert_eq!(ctx.elapsed_for(9_250_000), 0.25);
    }

    #[test]
    fn mapping_needs_calibration() {
        let ctx = RunContext::new((800.0, 600.0));
        assert!(ctx.map(Vector3::new(0.0, 0.0, 0.0)).is_none());
        ctx.set_calibration(CalibrationData::new(2.0, 0.0, 100.0));
        let p = ctx.map(Vector3::new(10.0, 110.0, -3.0)).unwrap();
        assert_eq!(p.pos.x, 420.0);
        assert_eq!(p.pos.y, 280.0);
        assert_eq!(p.depth, Some(-3.0));
    }
}
