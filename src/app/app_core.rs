use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use eframe::{egui, Frame};
use log::info;

use super::state::{AppMode, AppState};
use crate::calibration::CalibrationTap;
use crate::config::ConfigManager;
use crate::postural::PosturalRecorder;
use crate::task::RunContext;
use crate::types::Vector3;

pub struct TrackHubApp {
    pub state: AppState,
    pub config: ConfigManager,
}

impl TrackHubApp {
    pub fn new(
        config: ConfigManager,
        context: Arc<RunContext>,
        tap: Arc<CalibrationTap>,
        calibration_receiver: Receiver<(f64, Vector3)>,
        recorder: Arc<PosturalRecorder>,
    ) -> Self {
        let state = AppState::new(context, tap, calibration_receiver, recorder, config.get_config());
        let mut app = Self { state, config };

        if app.state.context.is_calibrated() && !app.config.get_config().calibration.recalibrate_on_start {
            info!("Calibration loaded, ready for {:?}", app.config.get_config().task.kind);
            app.state.set_status("Press SPACE to start");
        } else {
            info!("Starting in calibration mode");
            app.state.reset_calibration();
        }
        app
    }

    /// One fixed-rate task tick
    fn handle_tick(&mut self, dt: f64) {
        match self.state.mode {
            AppMode::Calibrating => super::handlers::CalibrationHandler::handle_calibration(self),
            AppMode::Running => self.tick_task(dt),
            AppMode::Ready | AppMode::Finished => {
                if let Some(tracking) = self.state.context.take_latest() {
                    self.state.cursor = tracking.sample().map(|s| s.point);
                }
            }
        }
    }
}

impl eframe::App for TrackHubApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        ctx.set_visuals(egui::Visuals::light());

        crate::app::ui::render_status_bar(self, ctx);
        crate::app::ui::render_bottom_status_bar(self, ctx);
        if self.config.get_config().window.show_speed_trace {
            crate::app::ui::render_speed_panel(self, ctx);
        }
        crate::app::ui::render_main_panel(self, ctx);

        self.handle_keyboard_input(ctx);

        if let Some(dt) = self.state.clock.poll(Instant::now()) {
            self.handle_tick(dt);
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            self.handle_close();
        }

        ctx.request_repaint_after(self.state.clock.until_next(Instant::now()));
    }
}
