use std::sync::Arc;

use log::{error, info};

use super::ExportHandler;
use crate::app::app_core::TrackHubApp;
use crate::app::state::AppMode;
use crate::export::{run_file_stem, ExportTarget};
use crate::tapping::{SeriesStatus, TapLines, TappingEvent, TappingSession, TrialPhase};
use crate::utils::run_timestamp;

pub struct TappingHandler;

impl TappingHandler {
    /// Opens every trial file the session could need and arms the first trial
    pub fn start_session(app: &mut TrackHubApp) {
        let Some(calibration) = app.state.context.calibration() else {
            app.state.set_status("Tapping not started: screen is not calibrated");
            return;
        };
        let config = app.config.get_config();
        let gap_px = calibration.mm_to_px(config.tapping.gap_mm);
        let lines = TapLines::centred(app.state.context.display_size().1, gap_px);

        let mut session = TappingSession::new(Arc::clone(&app.state.context), &config.tapping, lines);
        let stem = run_file_stem("tapping", &config.export.participant, &run_timestamp(), None);
        let trials = session.series().max_trials();
        let outputs = match ExportTarget::prepare_many(&config.export_directory(), &stem, trials) {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Tapping not started: {}", e);
                app.state.set_status(format!("Tapping not started: {}", e));
                return;
            }
        };

        session.start_trial();
        info!("Tapping session started, lines {:.0}px apart", gap_px);
        app.state.tapping.session = Some(session);
        app.state.tapping.outputs = outputs;
        app.state.mode = AppMode::Running;
        app.state.set_status("Get ready");
    }

    /// Arms the next trial once the previous one is over
    pub fn next_trial(app: &mut TrackHubApp) {
        if let Some(session) = app.state.tapping.session.as_mut() {
            if session.phase() == TrialPhase::Finished && !session.is_finished() {
                session.start_trial();
                app.state.status_message = "Get ready".to_string();
            }
        }
    }

    pub fn tick(app: &mut TrackHubApp, dt: f64) {
        let Some(session) = app.state.tapping.session.as_mut() else {
            return;
        };
        let event = session.tick(dt);
        app.state.cursor = session.last_point();

        match event {
            TappingEvent::CountingStarted => app.state.status_message = "Tap!".to_string(),
            TappingEvent::TrialFinished { taps, status } => {
                let done = session.is_finished();
                app.state.status_message = match status {
                    SeriesStatus::Restarted => format!("{} taps, inconsistent; press SPACE for the next trial", taps),
                    SeriesStatus::Continue => format!("{} taps; press SPACE for the next trial", taps),
                    SeriesStatus::Done | SeriesStatus::LimitReached => format!("{} taps, series complete", taps),
                };
                if done {
                    Self::finish_session(app);
                }
            }
            TappingEvent::Idle | TappingEvent::Tap(_) => {}
        }
    }

    /// Escape: drops the trial in progress and writes what the series has
    pub fn stop(app: &mut TrackHubApp) {
        if let Some(session) = app.state.tapping.session.as_mut() {
            session.abort_trial();
        }
        Self::finish_session(app);
    }

    fn finish_session(app: &mut TrackHubApp) {
        let Some(session) = app.state.tapping.session.take() else {
            return;
        };
        ExportHandler::export_tapping(app, &session);
        app.state.mode = AppMode::Finished;
    }
}
