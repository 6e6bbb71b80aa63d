use std::sync::Arc;

use log::{debug, info};

use super::{RunContext, Sequence, TargetSequencer, TaskError, TickInput, TickOutcome};
use crate::types::{MappedSample, RunOutcome, RunRecord, Tracking};

/// Drives a [`TargetSequencer`] from the frame loop.
///
/// Each tick takes the latest tracking state from the shared context, so
/// decisions run at frame rate while the producer keeps logging at sensor
/// rate. A tick with no new frame reuses the last known point; its speed
/// only counts on the tick that first sees it.
pub struct RunController {
    context: Arc<RunContext>,
    sequencer: TargetSequencer,
    running: bool,
    outcome: Option<RunOutcome>,
    duration_s: f64,
    last_sample: Option<MappedSample>,
}

impl RunController {
    pub fn new(context: Arc<RunContext>, sequencer: TargetSequencer) -> Self {
        Self {
            context,
            sequencer,
            running: false,
            outcome: None,
            duration_s: 0.0,
            last_sample: None,
        }
    }

    /// Resets everything for a fresh run over `sequence` and starts recording
    pub fn start_run(&mut self, sequence: Sequence) -> Result<(), TaskError> {
        if self.running {
            return Err(TaskError::AlreadyRunning);
        }
        if !self.context.is_calibrated() {
            return Err(TaskError::NotCalibrated);
        }
        self.sequencer.restart(sequence)?;
        self.outcome = None;
        self.duration_s = 0.0;
        self.last_sample = None;
        self.running = true;

        let first = self.sequencer.active_label().map(str::to_string);
        info!(
            "Run started: {} steps, first target {}",
            self.sequencer.sequence().len(),
            first.as_deref().unwrap_or("-")
        );
        self.context.begin_run(first);
        Ok(())
    }

    /// One frame tick; `dt` is the time since the previous tick in seconds
    pub fn tick(&mut self, dt: f64) -> TickOutcome {
        if !self.running {
            return TickOutcome::default();
        }
        self.duration_s += dt.max(0.0);

        let fresh = self.context.take_latest();
        if let Some(tracking) = fresh {
            self.last_sample = tracking.sample();
        }
        let input = TickInput {
            point: self.last_sample.map(|s| s.point),
            speed: fresh.and_then(Tracking::sample).and_then(|s| s.speed),
            dt,
        };
        let outcome = self.sequencer.tick(input);

        if outcome.advance.is_some() {
            self.context
                .set_active_label(self.sequencer.active_label().map(str::to_string));
        }
        if outcome.complete {
            debug!("Sequence exhausted after {:.2}s", self.duration_s);
            self.context.stop_recording();
            self.running = false;
            self.outcome = Some(RunOutcome::Completed);
        }
        outcome
    }

    /// Ends the run early; the samples logged so far are kept
    pub fn abort(&mut self) {
        if !self.running {
            return;
        }
        info!(
            "Run aborted at step {}/{}",
            self.sequencer.step(),
            self.sequencer.sequence().len()
        );
        self.context.stop_recording();
        self.running = false;
        self.outcome = Some(RunOutcome::Aborted);
    }

    /// Drains the sample log into a record. A run still in progress counts
    /// as aborted.
    pub fn finish(&mut self) -> RunRecord {
        if self.running {
            self.abort();
        }
        let samples = self.context.end_run();
        let record = RunRecord {
            outcome: self.outcome.take().unwrap_or(RunOutcome::Aborted),
            samples,
            steps_completed: self.sequencer.step(),
            sequence_len: self.sequencer.sequence().len(),
            paths: self.sequencer.paths().clone(),
            duration_s: self.duration_s,
        };
        info!(
            "Run finished ({:?}): {}/{} steps, {} samples in {:.2}s",
            record.outcome,
            record.steps_completed,
            record.sequence_len,
            record.samples.len(),
            record.duration_s
        );
        record
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Set once the run ended, until `finish` collects it
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    pub fn sequencer(&self) -> &TargetSequencer {
        &self.sequencer
    }

    /// Current tracked point, `None` while tracking is lost
    pub fn last_sample(&self) -> Option<MappedSample> {
        self.last_sample
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationData;
    use crate::task::{SampleProducer, Target, TargetSet, TriggerPolicy};
    use crate::types::{Finger, FrameSink, Point2, SensorFrame, Vector3};

    // identity-ish calibration: 1 px/mm, sensor (0, 300) on the centre of 800x600
    fn context() -> Arc<RunContext> {
        let ctx = Arc::new(RunContext::new((800.0, 600.0)));
        ctx.set_calibration(CalibrationData::new(1.0, 0.0, 300.0));
        ctx
    }

    fn controller(ctx: Arc<RunContext>, policy: TriggerPolicy) -> RunController {
        let targets = TargetSet::new(vec![
            Target::new("A", Point2::new(200.0, 300.0), 40.0),
            Target::new("B", Point2::new(600.0, 300.0), 40.0),
        ])
        .unwrap();
        let sequence = Sequence::fixed(&[0, 1], 2).unwrap();
        RunController::new(ctx, TargetSequencer::new(targets, sequence, policy).unwrap())
    }

    // display x to sensor frame at display y = 300
    fn frame_at(t_us: i64, display_x: f64, speed: f64) -> SensorFrame {
        SensorFrame {
            timestamp_us: t_us,
            fingers: vec![Finger {
                tip_position: Vector3::new(display_x - 400.0, 300.0, 0.0),
                tip_velocity: Some(Vector3::new(speed, 0.0, 0.0)),
            }],
            hands: Vec::new(),
        }
    }

    #[test]
    fn start_requires_calibration() {
        let ctx = Arc::new(RunContext::new((800.0, 600.0)));
        let mut run = controller(ctx, TriggerPolicy::SpeedGated { threshold: 50.0 });
        let sequence = Sequence::fixed(&[0, 1], 2).unwrap();
        assert_eq!(run.start_run(sequence), Err(TaskError::NotCalibrated));
        assert!(!run.is_running());
    }

    #[test]
    fn start_publishes_the_first_target() {
        let ctx = context();
        let mut run = controller(ctx.clone(), TriggerPolicy::SpeedGated { threshold: 50.0 });
        run.start_run(Sequence::fixed(&[1, 0], 2).unwrap()).unwrap();
        assert_eq!(ctx.active_label().as_deref(), Some("B"));
        assert!(ctx.is_recording());
        assert_eq!(
            run.start_run(Sequence::fixed(&[0, 1], 2).unwrap()),
            Err(TaskError::AlreadyRunning)
        );
    }

    #[test]
    fn only_the_latest_post_is_seen_per_tick() {
        let ctx = context();
        let producer = SampleProducer::new(ctx.clone());
        let mut run = controller(ctx.clone(), TriggerPolicy::SpeedGated { threshold: 50.0 });
        run.start_run(Sequence::fixed(&[0, 1], 2).unwrap()).unwrap();

        // a slow pass over A, then a fast frame elsewhere before the tick
        producer.on_frame(&frame_at(0, 200.0, 10.0));
        producer.on_frame(&frame_at(5_000, 400.0, 200.0));
        let out = run.tick(1.0 / 60.0);
        assert!(out.advance.is_none());
        assert_eq!(ctx.logged(), 2);

        // nothing new: the held point is still outside A
        assert_eq!(run.tick(1.0 / 60.0), TickOutcome::default());
        assert_eq!(run.last_sample().map(|s| s.point.pos.x), Some(400.0));
    }

    #[test]
    fn held_sample_does_not_reopen_the_speed_gate() {
        let ctx = context();
        let producer = SampleProducer::new(ctx.clone());
        // B overlaps A, so one slow frame sits inside both
        let targets = TargetSet::new(vec![
            Target::new("A", Point2::new(200.0, 300.0), 40.0),
            Target::new("B", Point2::new(210.0, 300.0), 40.0),
        ])
        .unwrap();
        let sequence = Sequence::fixed(&[0, 1], 2).unwrap();
        let policy = TriggerPolicy::SpeedGated { threshold: 50.0 };
        let mut run = RunController::new(
            ctx.clone(),
            TargetSequencer::new(targets, sequence.clone(), policy).unwrap(),
        );
        run.start_run(sequence).unwrap();

        producer.on_frame(&frame_at(0, 205.0, 10.0));
        assert!(run.tick(1.0 / 60.0).advance.is_some());
        assert!(run.tick(1.0 / 60.0).advance.is_none());
        assert!(run.is_running());

        producer.on_frame(&frame_at(20_000, 205.0, 10.0));
        assert!(run.tick(1.0 / 60.0).complete);
    }

    #[test]
    fn lost_tracking_clears_the_held_point() {
        let ctx = context();
        let producer = SampleProducer::new(ctx.clone());
        let mut run = controller(ctx.clone(), TriggerPolicy::DwellFill { load_time: 0.5, framerate: 60.0 });
        run.start_run(Sequence::fixed(&[0, 1], 2).unwrap()).unwrap();

        producer.on_frame(&frame_at(0, 200.0, 0.0));
        assert!(run.tick(1.0 / 60.0).update);
        producer.on_frame(&SensorFrame { timestamp_us: 20_000, ..SensorFrame::default() });
        assert_eq!(run.tick(1.0 / 60.0), TickOutcome::default());
        assert!(run.last_sample().is_none());
        assert_eq!(run.tick(1.0 / 60.0), TickOutcome::default());
        assert!(run.sequencer().fill() > 0.0);
    }

    #[test]
    fn completed_run_hands_over_every_sample() {
        let ctx = context();
        let producer = SampleProducer::new(ctx.clone());
        let mut run = controller(ctx.clone(), TriggerPolicy::SpeedGated { threshold: 50.0 });
        run.start_run(Sequence::fixed(&[0, 1], 2).unwrap()).unwrap();

        producer.on_frame(&frame_at(0, 200.0, 10.0));
        let out = run.tick(0.1);
        assert!(out.advance.is_some());
        assert_eq!(ctx.active_label().as_deref(), Some("B"));

        producer.on_frame(&frame_at(100_000, 600.0, 10.0));
        let out = run.tick(0.1);
        assert!(out.complete);
        assert!(!run.is_running());
        assert_eq!(run.outcome(), Some(RunOutcome::Completed));

        // frames after completion are not recorded
        producer.on_frame(&frame_at(200_000, 600.0, 10.0));

        let record = run.finish();
        assert!(record.is_complete());
        assert_eq!(record.samples.len(), 2);
        assert_eq!(record.samples[0].target.as_deref(), Some("A"));
        assert_eq!(record.samples[1].target.as_deref(), Some("B"));
        assert_eq!(record.steps_completed, 2);
        assert_eq!(record.paths.get("A-B"), Some(&1));
        assert!((record.duration_s - 0.2).abs() < 1e-9);
    }

    #[test]
    fn abort_keeps_the_log() {
        let ctx = context();
        let producer = SampleProducer::new(ctx.clone());
        let mut run = controller(ctx.clone(), TriggerPolicy::SpeedGated { threshold: 50.0 });
        run.start_run(Sequence::fixed(&[0, 1], 2).unwrap()).unwrap();
        for i in 0..5 {
            producer.on_frame(&frame_at(i * 10_000, 400.0, 10.0));
            run.tick(0.01);
        }
        run.abort();
        assert!(!ctx.is_recording());
        let record = run.finish();
        assert_eq!(record.outcome, RunOutcome::Aborted);
        assert_eq!(record.samples.len(), 5);
        assert_eq!(record.steps_completed, 0);
    }

    #[test]
    fn finish_while_running_counts_as_aborted() {
        let ctx = context();
        let mut run = controller(ctx, TriggerPolicy::SpeedGated { threshold: 50.0 });
        run.start_run(Sequence::fixed(&[0, 1], 2).unwrap()).unwrap();
        let record = run.finish();
        assert_eq!(record.outcome, RunOutcome::Aborted);
        assert!(record.samples.is_empty());
    }
}
