use log::{error, info};

use super::ExportHandler;
use crate::app::app_core::TrackHubApp;
use crate::app::state::AppMode;
use crate::export::{run_file_stem, ExportTarget};
use crate::postural::PosturalTrigger;
use crate::utils::run_timestamp;

pub struct PosturalHandler;

impl PosturalHandler {
    pub fn arm(app: &mut TrackHubApp) {
        let config = app.config.get_config();
        let stem = run_file_stem("postural", &config.export.participant, &run_timestamp(), None);
        let output = match ExportTarget::prepare(&config.export_directory(), &stem) {
            Ok(output) => output,
            Err(e) => {
                error!("Postural capture not started: {}", e);
                app.state.set_status(format!("Postural capture not started: {}", e));
                return;
            }
        };
        let prompt = match config.postural.trigger {
            PosturalTrigger::Keyboard => "Hold both hands out, then press SPACE",
            PosturalTrigger::HandPositioning => "Hold both hands inside the box",
        };
        app.state.postural.recorder.arm();
        app.state.postural.output = Some(output);
        app.state.mode = AppMode::Running;
        app.state.set_status(prompt);
    }

    pub fn key_start(app: &mut TrackHubApp) {
        if app.state.postural.recorder.key_start() {
            info!("Postural recording started from the keyboard");
            app.state.set_status("Recording, hold still");
        }
    }

    pub fn poll(app: &mut TrackHubApp) {
        if let Some(tracking) = app.state.context.take_latest() {
            app.state.cursor = tracking.sample().map(|s| s.point);
        }
        let Some(rows) = app.state.postural.recorder.take_rows() else {
            return;
        };
        ExportHandler::export_postural(app, &rows);
        app.state.set_status(format!("Postural capture finished: {} rows", rows.len()));
        app.state.mode = AppMode::Finished;
    }

    pub fn cancel(app: &mut TrackHubApp) {
        app.state.postural.recorder.cancel();
        if let Some(output) = app.state.postural.output.take() {
            output.discard();
        }
        app.state.mode = AppMode::Ready;
        app.state.set_status("Postural capture cancelled");
    }
}
