use std::collections::BTreeMap;

use log::debug;

use super::{Sequence, Target, TargetSet, TaskError};
use crate::types::MappedPoint;

// Absorbs float noise in framerate * load_time so that 0.5 s at 60 Hz is 30 ticks, not 31
const TICK_EPSILON: f64 = 1e-6;

/// When the active target counts as reached
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerPolicy {
    /// Stay inside for `load_time` seconds of frame ticks
    DwellFill { load_time: f64, framerate: f64 },
    /// Be inside while moving slower than `threshold` mm/s
    SpeedGated { threshold: f64 },
}

impl TriggerPolicy {
    pub fn validate(&self) -> Result<(), TaskError> {
        match *self {
            TriggerPolicy::DwellFill { load_time, framerate } => {
                if !(framerate.is_finite() && framerate > 0.0) {
                    return Err(TaskError::InvalidTrigger(format!("framerate must be positive, got {framerate}")));
                }
                if !(load_time.is_finite() && load_time >= 0.0) {
                    return Err(TaskError::InvalidTrigger(format!("load time must be >= 0, got {load_time}")));
                }
            }
            TriggerPolicy::SpeedGated { threshold } => {
                if !(threshold.is_finite() && threshold > 0.0) {
                    return Err(TaskError::InvalidTrigger(format!("speed threshold must be positive, got {threshold}")));
                }
            }
        }
        Ok(())
    }

    /// Whole in-target ticks needed to fill a dwell target; the entry tick counts
    pub fn ticks_required(&self) -> u32 {
        match *self {
            TriggerPolicy::DwellFill { load_time, framerate } if load_time > 0.0 => {
                ((framerate * load_time) - TICK_EPSILON).ceil().max(1.0) as u32
            }
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    AwaitingEntry,
    Dwelling,
    /// Set for the tick that advanced; the next tick starts from `AwaitingEntry`
    Advanced,
    Complete,
}

/// One frame tick worth of input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// `None` when the sensor has no trackable point this tick
    pub point: Option<MappedPoint>,
    pub speed: Option<f64>,
    /// Seconds since the previous tick
    pub dt: f64,
}

impl TickInput {
    pub fn at(point: MappedPoint, dt: f64) -> Self {
        Self { point: Some(point), speed: None, dt }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn occluded(dt: f64) -> Self {
        Self { point: None, speed: None, dt }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    /// Steps completed after this advance
    pub step: usize,
    pub from: usize,
    /// `None` when the sequence is exhausted
    pub to: Option<usize>,
    /// Seconds spent on the step that just ended
    pub step_time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickOutcome {
    /// The view needs a redraw (fill changed or target changed)
    pub update: bool,
    pub advance: Option<Advance>,
    pub complete: bool,
}

/// Walks a sequence of targets, deciding each tick whether the active
/// target has been reached.
#[derive(Debug, Clone)]
pub struct TargetSequencer {
    targets: TargetSet,
    sequence: Sequence,
    policy: TriggerPolicy,
    ticks_required: u32,
    state: SequencerState,
    step: usize,
    dwell_ticks: u32,
    step_time: f64,
    paths: BTreeMap<String, u32>,
}

impl TargetSequencer {
    pub fn new(targets: TargetSet, sequence: Sequence, policy: TriggerPolicy) -> Result<Self, TaskError> {
        policy.validate()?;
        sequence.validate(targets.len())?;
        Ok(Self {
            targets,
            sequence,
            ticks_required: policy.ticks_required(),
            policy,
            state: SequencerState::AwaitingEntry,
            step: 0,
            dwell_ticks: 0,
            step_time: 0.0,
            paths: BTreeMap::new(),
        })
    }

    /// Back to the first step of the current sequence
    pub fn reset(&mut self) {
        self.state = SequencerState::AwaitingEntry;
        self.step = 0;
        self.dwell_ticks = 0;
        self.step_time = 0.0;
        self.paths.clear();
    }

    /// Swap in a new sequence and reset
    pub fn restart(&mut self, sequence: Sequence) -> Result<(), TaskError> {
        sequence.validate(self.targets.len())?;
        self.sequence = sequence;
        self.reset();
        Ok(())
    }

    pub fn tick(&mut self, input: TickInput) -> TickOutcome {
        if self.state == SequencerState::Complete {
            return TickOutcome { complete: true, ..TickOutcome::default() };
        }
        if self.state == SequencerState::Advanced {
            self.state = SequencerState::AwaitingEntry;
        }
        self.step_time += input.dt.max(0.0);

        // occlusion freezes the dwell state
        let Some(point) = input.point else {
            return TickOutcome::default();
        };
        let Some(target) = self.active_target() else {
            return TickOutcome::default();
        };
        let inside = target.contains(&point);

        match self.policy {
            TriggerPolicy::DwellFill { .. } => self.dwell_tick(inside),
            TriggerPolicy::SpeedGated { threshold } => {
                let slow = input.speed.is_some_and(|s| s < threshold);
                if inside && slow {
                    self.advance()
                } else {
                    TickOutcome::default()
                }
            }
        }
    }

    fn dwell_tick(&mut self, inside: bool) -> TickOutcome {
        if !inside {
            self.state = SequencerState::AwaitingEntry;
            if self.dwell_ticks > 0 {
                self.dwell_ticks = 0;
                return TickOutcome { update: true, ..TickOutcome::default() };
            }
            return TickOutcome::default();
        }

        self.state = SequencerState::Dwelling;
        self.dwell_ticks += 1;
        if self.dwell_ticks >= self.ticks_required {
            return self.advance();
        }
        TickOutcome { update: true, ..TickOutcome::default() }
    }

    fn advance(&mut self) -> TickOutcome {
        let from = self.sequence.get(self.step).unwrap_or_default();
        self.step += 1;
        self.dwell_ticks = 0;

        let to = self.sequence.get(self.step);
        if let Some(next) = to {
            let key = format!("{}-{}", self.targets.label(from), self.targets.label(next));
            *self.paths.entry(key).or_insert(0) += 1;
        }

        let advance = Advance {
            step: self.step,
            from,
            to,
            step_time: self.step_time,
        };
        self.step_time = 0.0;

        let complete = to.is_none();
        self.state = if complete { SequencerState::Complete } else { SequencerState::Advanced };
        debug!(
            "Step {}/{}: {} -> {} after {:.3}s",
            self.step,
            self.sequence.len(),
            self.targets.label(from),
            to.map_or("end", |i| self.targets.label(i)),
            advance.step_time
        );

        TickOutcome {
            update: true,
            advance: Some(advance),
            complete,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == SequencerState::Complete
    }

    /// Steps completed so far
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn active_index(&self) -> Option<usize> {
        if self.is_complete() {
            return None;
        }
        self.sequence.get(self.step)
    }

    pub fn active_target(&self) -> Option<&Target> {
        self.active_index().and_then(|i| self.targets.get(i))
    }

    pub fn active_label(&self) -> Option<&str> {
        self.active_target().map(|t| t.label.as_str())
    }

    /// Radius of the fill indicator, 0 up to the active target's radius
    pub fn fill(&self) -> f64 {
        let Some(target) = self.active_target() else {
            return 0.0;
        };
        let ticks = self.dwell_ticks.min(self.ticks_required);
        target.radius * f64::from(ticks) / f64::from(self.ticks_required)
    }

    pub fn is_dwelling(&self) -> bool {
        self.dwell_ticks > 0
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Transition counts keyed "FROM-TO"
    pub fn paths(&self) -> &BTreeMap<String, u32> {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2;

    const A: (f64, f64) = (100.0, 100.0);
    const B: (f64, f64) = (400.0, 100.0);

    fn targets() -> TargetSet {
        TargetSet::new(vec![
            Target::new("A", Point2::new(A.0, A.1), 50.0),
            Target::new("B", Point2::new(B.0, B.1), 50.0),
        ])
        .unwrap()
    }

    fn dwell(load_time: f64) -> TargetSequencer {
        let policy = TriggerPolicy::DwellFill { load_time, framerate: 60.0 };
        TargetSequencer::new(targets(), Sequence::fixed(&[0, 1, 0], 2).unwrap(), policy).unwrap()
    }

    fn speed_gated() -> TargetSequencer {
        let policy = TriggerPolicy::SpeedGated { threshold: 50.0 };
        TargetSequencer::new(targets(), Sequence::fixed(&[0, 1, 0], 2).unwrap(), policy).unwrap()
    }

    fn at(p: (f64, f64)) -> TickInput {
        TickInput::at(MappedPoint::new(p.0, p.1), 1.0 / 60.0)
    }

    fn outside() -> TickInput {
        at((250.0, 400.0))
    }

    #[test]
    fn half_second_at_sixty_hertz_is_thirty_ticks() {
        let policy = TriggerPolicy::DwellFill { load_time: 0.5, framerate: 60.0 };
        assert_eq!(policy.ticks_required(), 30);
        let policy = TriggerPolicy::DwellFill { load_time: 0.1, framerate: 30.0 };
        assert_eq!(policy.ticks_required(), 3);
    }

    #[test]
    fn thirty_ticks_inside_advance_exactly_once() {
        let mut seq = dwell(0.5);
        for i in 0..29 {
            let out = seq.tick(at(A));
            assert!(out.update, "tick {i} should redraw the fill");
            assert!(out.advance.is_none(), "advanced early on tick {i}");
        }
        let out = seq.tick(at(A));
        let advance = out.advance.expect("30th tick advances");
        assert_eq!((advance.step, advance.from, advance.to), (1, 0, Some(1)));
        assert!((advance.step_time - 0.5).abs() < 1e-9);
        assert_eq!(seq.active_label(), Some("B"));
        assert_eq!(seq.fill(), 0.0);

        // staying on A never fires again
        for _ in 0..100 {
            assert!(seq.tick(at(A)).advance.is_none());
        }
        assert_eq!(seq.step(), 1);
    }

    #[test]
    fn leaving_early_forfeits_the_fill() {
        let mut seq = dwell(0.5);
        for _ in 0..29 {
            seq.tick(at(A));
        }
        assert!(seq.fill() > 0.0);
        let out = seq.tick(outside());
        assert!(out.update);
        assert_eq!(seq.fill(), 0.0);
        assert_eq!(seq.state(), SequencerState::AwaitingEntry);

        for i in 0..29 {
            assert!(seq.tick(at(A)).advance.is_none(), "credit carried over at tick {i}");
        }
        assert!(seq.tick(at(A)).advance.is_some());
    }

    #[test]
    fn fill_grows_linearly_to_the_radius() {
        let mut seq = dwell(0.5);
        seq.tick(at(A));
        assert!((seq.fill() - 50.0 / 30.0).abs() < 1e-9);
        for _ in 0..14 {
            seq.tick(at(A));
        }
        assert!((seq.fill() - 25.0).abs() < 1e-9);
        assert_eq!(seq.state(), SequencerState::Dwelling);
    }

    #[test]
    fn quiet_outside_ticks_report_nothing() {
        let mut seq = dwell(0.5);
        assert_eq!(seq.tick(outside()), TickOutcome::default());
    }

    #[test]
    fn zero_load_time_snaps_on_entry() {
        let mut seq = dwell(0.0);
        let out = seq.tick(at(A));
        assert!(out.update);
        assert_eq!(out.advance.map(|a| a.to), Some(Some(1)));
    }

    #[test]
    fn occlusion_freezes_the_dwell() {
        let mut seq = dwell(0.5);
        for _ in 0..15 {
            seq.tick(at(A));
        }
        let frozen = seq.fill();
        for _ in 0..10 {
            assert_eq!(seq.tick(TickInput::occluded(1.0 / 60.0)), TickOutcome::default());
        }
        assert_eq!(seq.fill(), frozen);
        for _ in 0..14 {
            assert!(seq.tick(at(A)).advance.is_none());
        }
        assert!(seq.tick(at(A)).advance.is_some());
    }

    #[test]
    fn speed_at_threshold_does_not_advance() {
        let mut seq = speed_gated();
        assert!(seq.tick(at(A).with_speed(50.0)).advance.is_none());
        assert!(seq.tick(at(A)).advance.is_none());
        assert!(seq.tick(outside().with_speed(1.0)).advance.is_none());
        let out = seq.tick(at(A).with_speed(49.0));
        assert_eq!(out.advance.map(|a| a.to), Some(Some(1)));
    }

    #[test]
    fn sequence_end_completes_and_ignores_later_ticks() {
        let mut seq = speed_gated();
        seq.tick(at(A).with_speed(10.0));
        seq.tick(at(B).with_speed(10.0));
        let out = seq.tick(at(A).with_speed(10.0));
        assert!(out.complete);
        assert_eq!(out.advance.map(|a| (a.step, a.to)), Some((3, None)));
        assert!(seq.is_complete());
        assert_eq!(seq.active_index(), None);

        let after = seq.tick(at(A).with_speed(10.0));
        assert!(after.advance.is_none());
        assert!(!after.update);
        assert_eq!(seq.step(), 3);
    }

    #[test]
    fn paths_are_tallied_by_label() {
        let mut seq = speed_gated();
        seq.tick(at(A).with_speed(10.0));
        seq.tick(at(B).with_speed(10.0));
        seq.tick(at(A).with_speed(10.0));
        assert_eq!(seq.paths().get("A-B"), Some(&1));
        assert_eq!(seq.paths().get("B-A"), Some(&1));
        assert_eq!(seq.paths().len(), 2);

        seq.reset();
        assert!(seq.paths().is_empty());
        assert_eq!(seq.active_label(), Some("A"));
    }

    #[test]
    fn bad_policies_are_rejected() {
        let set = targets();
        let sequence = Sequence::fixed(&[0, 1], 2).unwrap();
        for policy in [
            TriggerPolicy::DwellFill { load_time: -1.0, framerate: 60.0 },
            TriggerPolicy::DwellFill { load_time: 0.5, framerate: 0.0 },
            TriggerPolicy::SpeedGated { threshold: f64::NAN },
        ] {
            assert!(matches!(
                TargetSequencer::new(set.clone(), sequence.clone(), policy),
                Err(TaskError::InvalidTrigger(_))
            ));
        }
    }

    #[test]
    fn restart_validates_the_new_sequence() {
        let mut seq = speed_gated();
        assert!(seq.restart(Sequence::fixed(&[1, 0], 2).unwrap()).is_ok());
        assert_eq!(seq.active_label(), Some("B"));
        let too_wide = Sequence::fixed(&[0, 2], 3).unwrap();
        assert!(matches!(seq.restart(too_wide), Err(TaskError::UnknownTarget { .. })));
    }
}
