use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::calibration::{AutoCalibration, CalibrationStep, CalibrationTap};
use crate::config::AppConfig;
use crate::export::ExportTarget;
use crate::postural::PosturalRecorder;
use crate::tapping::TappingSession;
use crate::task::{RunContext, RunController};
use crate::trace::SpeedTrace;
use crate::types::{MappedPoint, Vector3};
use crate::utils::FrameClock;

/// Seconds of speed history shown under the targets
const SPEED_TRACE_WINDOW_S: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Collecting the calibration markers
    Calibrating,
    /// Waiting for the start key
    Ready,
    Running,
    /// The last run or session was written out
    Finished,
}

/// Calibration procedure and the sensor tap feeding it
pub struct CalibrationState {
    /// Created on the first calibration tick, once the display size is known
    pub procedure: Option<AutoCalibration>,
    pub tap: Arc<CalibrationTap>,
    pub receiver: Receiver<(f64, Vector3)>,
    pub last_step: Option<CalibrationStep>,
}

/// Target task runs
pub struct RunState {
    pub controller: Option<RunController>,
    /// Opened before the run starts, written when it ends
    pub output: Option<ExportTarget>,
    pub rng: StdRng,
    pub runs_completed: usize,
}

pub struct TappingState {
    pub session: Option<TappingSession>,
    /// One file per possible trial, opened before the first countdown
    pub outputs: Vec<ExportTarget>,
}

pub struct PosturalState {
    pub recorder: Arc<PosturalRecorder>,
    pub output: Option<ExportTarget>,
}

#[derive(Debug, Clone, Default)]
pub struct ExportState {
    pub export_status: String,
    pub last_path: Option<PathBuf>,
}

/// Everything the frame loop owns
pub struct AppState {
    pub mode: AppMode,
    pub context: Arc<RunContext>,
    pub calibration: CalibrationState,
    pub run: RunState,
    pub tapping: TappingState,
    pub postural: PosturalState,
    pub export: ExportState,
    pub clock: FrameClock,
    pub speed_trace: SpeedTrace,
    pub cursor: Option<MappedPoint>,
    pub status_message: String,
}

impl AppState {
    pub fn new(
        context: Arc<RunContext>,
        tap: Arc<CalibrationTap>,
        calibration_receiver: Receiver<(f64, Vector3)>,
        recorder: Arc<PosturalRecorder>,
        config: &AppConfig,
    ) -> Self {
        let rng = match config.task.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            mode: AppMode::Ready,
            context,
            calibration: CalibrationState {
                procedure: None,
                tap,
                receiver: calibration_receiver,
                last_step: None,
            },
            run: RunState {
                controller: None,
                output: None,
                rng,
                runs_completed: 0,
            },
            tapping: TappingState {
                session: None,
                outputs: Vec::new(),
            },
            postural: PosturalState { recorder, output: None },
            export: ExportState::default(),
            clock: FrameClock::new(config.window.framerate),
            speed_trace: SpeedTrace::new(SPEED_TRACE_WINDOW_S),
            cursor: None,
            status_message: String::new(),
        }
    }

    /// Drops any calibration in progress and waits for a fresh one
    pub fn reset_calibration(&mut self) {
        self.calibration.procedure = None;
        self.calibration.last_step = None;
        while self.calibration.receiver.try_recv().is_ok() {}
        self.calibration.tap.arm();
        self.mode = AppMode::Calibrating;
    }

    pub fn complete_calibration(&mut self) {
        self.calibration.tap.disarm();
        self.calibration.procedure = None;
        self.calibration.last_step = None;
        self.mode = AppMode::Ready;
    }

    pub fn is_running(&self) -> bool {
        self.mode == AppMode::Running
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    pub fn get_status_summary(&self) -> &'static str {
        match self.mode {
            AppMode::Calibrating => "Calibrating",
            AppMode::Ready => "Ready",
            AppMode::Running => "Running",
            AppMode::Finished => "Finished",
        }
    }
}
