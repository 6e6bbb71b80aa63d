//! Finger tapping: taps are counted as the fingertip swings down through
//! two horizontal lines, and trials repeat until enough of them agree.

use std::sync::Arc;

use log::info;

use crate::config::TappingConfig;
use crate::task::RunContext;
use crate::types::{MappedPoint, Sample, Tracking};

/// Two horizontal lines in display pixels, `top < bottom`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapLines {
    pub top: f64,
    pub bottom: f64,
}

impl TapLines {
    /// Lines `gap_px` apart, centred on the display height
    pub fn centred(display_height: f64, gap_px: f64) -> Self {
        let mid = display_height / 2.0;
        Self {
            top: mid - gap_px / 2.0,
            bottom: mid + gap_px / 2.0,
        }
    }
}

/// Counts a tap on every swing below the bottom line. The finger has to
/// come back above the top line before the next one counts.
#[derive(Debug, Clone)]
pub struct TapCounter {
    lines: TapLines,
    count: u32,
    past_down: bool,
}

impl TapCounter {
    pub fn new(lines: TapLines) -> Self {
        Self { lines, count: 0, past_down: false }
    }

    /// Feed a display-space y; true when this observation counted a tap
    pub fn observe(&mut self, y: f64) -> bool {
        if y > self.lines.bottom && !self.past_down {
            self.past_down = true;
            self.count += 1;
            return true;
        }
        if y < self.lines.top && self.past_down {
            self.past_down = false;
        }
        false
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn lines(&self) -> TapLines {
        self.lines
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.past_down = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStatus {
    /// Consistent so far, more trials needed
    Continue,
    /// The latest trial disagreed; the series restarted from it
    Restarted,
    /// Enough consistent trials
    Done,
    /// Trial limit reached without a consistent series
    LimitReached,
}

/// Trial counts plus whatever each trial carries (its samples)
#[derive(Debug, Clone)]
pub struct TrialSeries<T> {
    successes: usize,
    margin: u32,
    max_trials: usize,
    series: Vec<(u32, T)>,
    all: Vec<(u32, T)>,
    finished: Option<SeriesStatus>,
}

impl<T: Clone> TrialSeries<T> {
    pub fn new(successes: usize, margin: u32, max_trials: usize) -> Self {
        Self {
            successes: successes.max(1),
            margin,
            max_trials: max_trials.max(successes.max(1)),
            series: Vec::new(),
            all: Vec::new(),
            finished: None,
        }
    }

    pub fn record(&mut self, count: u32, payload: T) -> SeriesStatus {
        if let Some(status) = self.finished {
            return status;
        }
        self.all.push((count, payload.clone()));
        self.series.push((count, payload));

        let mut status = SeriesStatus::Continue;
        if self.spread() > self.margin {
            let latest = self.series.split_off(self.series.len() - 1);
            self.series = latest;
            status = SeriesStatus::Restarted;
        }

        if self.series.len() >= self.successes {
            status = SeriesStatus::Done;
        } else if self.all.len() >= self.max_trials {
            status = SeriesStatus::LimitReached;
        }
        if matches!(status, SeriesStatus::Done | SeriesStatus::LimitReached) {
            self.finished = Some(status);
        }
        status
    }

    fn spread(&self) -> u32 {
        let counts = self.series.iter().map(|(c, _)| *c);
        let max = counts.clone().max().unwrap_or(0);
        let min = counts.min().unwrap_or(0);
        max - min
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// The consistent series when there is one, otherwise every trial
    pub fn chosen(&self) -> &[(u32, T)] {
        match self.finished {
            Some(SeriesStatus::LimitReached) => &self.all,
            _ => &self.series,
        }
    }

    pub fn average(&self) -> Option<f64> {
        let chosen = self.chosen();
        if chosen.is_empty() {
            return None;
        }
        let total: u32 = chosen.iter().map(|(c, _)| *c).sum();
        Some(f64::from(total) / chosen.len() as f64)
    }

    pub fn trials_run(&self) -> usize {
        self.all.len()
    }

    /// Most trials `chosen` can ever return
    pub fn max_trials(&self) -> usize {
        self.max_trials
    }

    pub fn series_len(&self) -> usize {
        self.series.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialPhase {
    Countdown { remaining: f64 },
    Counting { remaining: f64 },
    Finished,
}

/// What happened on one tapping tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TappingEvent {
    Idle,
    CountingStarted,
    Tap(u32),
    TrialFinished { taps: u32, status: SeriesStatus },
}

/// A whole tapping session: one trial after another until the series is done.
///
/// Samples are recorded through the shared run context while a trial is
/// counting; each finished trial keeps its samples alongside its count.
pub struct TappingSession {
    context: Arc<RunContext>,
    countdown_s: f64,
    duration_s: f64,
    counter: TapCounter,
    phase: TrialPhase,
    series: TrialSeries<Vec<Sample>>,
    last_point: Option<MappedPoint>,
}

impl TappingSession {
    pub fn new(context: Arc<RunContext>, config: &TappingConfig, lines: TapLines) -> Self {
        Self {
            context,
            countdown_s: config.countdown_s,
            duration_s: config.duration_s,
            counter: TapCounter::new(lines),
            phase: TrialPhase::Finished,
            series: TrialSeries::new(config.successes, config.margin, config.max_trials),
            last_point: None,
        }
    }

    /// Starts the countdown of the next trial
    pub fn start_trial(&mut self) {
        if self.series.is_finished() {
            return;
        }
        self.counter.reset();
        self.context.take_latest();
        self.phase = TrialPhase::Countdown { remaining: self.countdown_s };
        info!("Tapping trial {} armed", self.series.trials_run() + 1);
    }

    pub fn tick(&mut self, dt: f64) -> TappingEvent {
        let latest = self.context.take_latest();
        if let Some(tracking) = latest {
            self.last_point = tracking.sample().map(|s| s.point);
        }
        match self.phase {
            TrialPhase::Finished => TappingEvent::Idle,
            // nothing counts before the countdown ends
            TrialPhase::Countdown { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.phase = TrialPhase::Countdown { remaining };
                    return TappingEvent::Idle;
                }
                self.phase = TrialPhase::Counting { remaining: self.duration_s };
                self.context.begin_run(None);
                TappingEvent::CountingStarted
            }
            TrialPhase::Counting { remaining } => {
                let mut event = TappingEvent::Idle;
                if let Some(sample) = latest.and_then(Tracking::sample) {
                    if self.counter.observe(sample.point.pos.y) {
                        event = TappingEvent::Tap(self.counter.count());
                    }
                }
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.phase = TrialPhase::Counting { remaining };
                    return event;
                }
                self.finish_trial()
            }
        }
    }

    fn finish_trial(&mut self) -> TappingEvent {
        let samples = self.context.end_run();
        let taps = self.counter.count();
        let status = self.series.record(taps, samples);
        self.phase = TrialPhase::Finished;
        info!(
            "Tapping trial {} finished: {} taps ({:?})",
            self.series.trials_run(),
            taps,
            status
        );
        TappingEvent::TrialFinished { taps, status }
    }

    /// Drops the trial in progress without recording it
    pub fn abort_trial(&mut self) {
        if matches!(self.phase, TrialPhase::Counting { .. }) {
            self.context.end_run();
        }
        self.phase = TrialPhase::Finished;
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    /// Last point seen by the frame loop, for the cursor
    pub fn last_point(&self) -> Option<MappedPoint> {
        self.last_point
    }

    pub fn taps(&self) -> u32 {
        self.counter.count()
    }

    pub fn lines(&self) -> TapLines {
        self.counter.lines()
    }

    pub fn series(&self) -> &TrialSeries<Vec<Sample>> {
        &self.series
    }

    pub fn is_finished(&self) -> bool {
        self.series.is_finished()
    }
}
