use eframe::egui;
use log::info;

use super::app_core::TrackHubApp;
use super::handlers::{CalibrationHandler, PosturalHandler, TappingHandler, TargetRunHandler};
use super::state::AppMode;
use crate::task::TaskKind;

impl TrackHubApp {
    pub(super) fn handle_keyboard_input(&mut self, ctx: &egui::Context) {
        let (space, escape, recalibrate, restart_marker) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::C),
                i.key_pressed(egui::Key::R),
            )
        });

        if space {
            self.handle_start_key();
        }
        if escape {
            self.handle_escape_key();
        }
        if recalibrate && !self.state.is_running() {
            info!("Recalibration requested");
            self.state.reset_calibration();
            self.state.set_status("Hold your fingertip on each marker");
        }
        if restart_marker && self.state.mode == AppMode::Calibrating {
            CalibrationHandler::restart_marker(self);
        }
    }

    fn handle_start_key(&mut self) {
        let kind = self.config.get_config().task.kind;
        match self.state.mode {
            AppMode::Calibrating => {}
            AppMode::Ready | AppMode::Finished => match kind {
                TaskKind::Tapping => TappingHandler::start_session(self),
                TaskKind::Postural => PosturalHandler::arm(self),
                TaskKind::Clock | TaskKind::Corners | TaskKind::CornersDepth => TargetRunHandler::start_run(self),
            },
            AppMode::Running => match kind {
                TaskKind::Tapping => TappingHandler::next_trial(self),
                TaskKind::Postural => PosturalHandler::key_start(self),
                TaskKind::Clock | TaskKind::Corners | TaskKind::CornersDepth => {}
            },
        }
    }

    fn handle_escape_key(&mut self) {
        match self.state.mode {
            AppMode::Running => self.stop_task(),
            AppMode::Calibrating if self.state.context.is_calibrated() => {
                info!("Recalibration cancelled, keeping the previous calibration");
                self.state.complete_calibration();
            }
            _ => {}
        }
    }

    pub(super) fn tick_task(&mut self, dt: f64) {
        match self.config.get_config().task.kind {
            TaskKind::Tapping => TappingHandler::tick(self, dt),
            TaskKind::Postural => PosturalHandler::poll(self),
            TaskKind::Clock | TaskKind::Corners | TaskKind::CornersDepth => TargetRunHandler::tick(self, dt),
        }
    }

    /// Ends whatever is running; recorded data is written out
    fn stop_task(&mut self) {
        match self.config.get_config().task.kind {
            TaskKind::Tapping => TappingHandler::stop(self),
            TaskKind::Postural => PosturalHandler::cancel(self),
            TaskKind::Clock | TaskKind::Corners | TaskKind::CornersDepth => TargetRunHandler::abort(self),
        }
    }

    pub(super) fn handle_close(&mut self) {
        if self.state.is_running() {
            info!("Window closing during a run");
            self.stop_task();
        }
    }
}
