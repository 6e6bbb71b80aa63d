use std::error::Error;
use std::sync::Arc;

use log::error;

use super::ExportHandler;
use crate::app::app_core::TrackHubApp;
use crate::app::state::AppMode;
use crate::export::{run_file_stem, ExportTarget};
use crate::task::{build_sequence, build_targets, RunController, TargetSequencer, TriggerPolicy};
use crate::utils::run_timestamp;

/// Clock and corners runs
pub struct TargetRunHandler;

impl TargetRunHandler {
    pub fn start_run(app: &mut TrackHubApp) {
        if let Err(e) = Self::try_start_run(app) {
            error!("Run not started: {}", e);
            app.state.set_status(format!("Run not started: {}", e));
        }
    }

    fn try_start_run(app: &mut TrackHubApp) -> Result<(), Box<dyn Error>> {
        let config = app.config.get_config();
        let targets = build_targets(&config.task, app.state.context.display_size())?;
        let sequence = build_sequence(&config.task, targets.len(), &mut app.state.run.rng)?;
        let policy = config.task.trigger_policy(config.window.framerate);
        let sequencer = TargetSequencer::new(targets, sequence.clone(), policy)?;

        // the output file must be writable before anything is recorded
        let stem = run_file_stem(
            config.task.kind.file_root(),
            &config.export.participant,
            &run_timestamp(),
            config.task.practice.then_some("practice"),
        );
        let output = ExportTarget::prepare(&config.export_directory(), &stem)?;

        let mut controller = RunController::new(Arc::clone(&app.state.context), sequencer);
        if let Err(e) = controller.start_run(sequence) {
            output.discard();
            return Err(e.into());
        }

        let threshold = match policy {
            TriggerPolicy::SpeedGated { threshold } => Some(threshold),
            TriggerPolicy::DwellFill { .. } => None,
        };
        app.state.speed_trace.clear();
        app.state.speed_trace.set_threshold(threshold);
        app.state.run.controller = Some(controller);
        app.state.run.output = Some(output);
        app.state.mode = AppMode::Running;
        app.state.set_status("Run in progress");
        Ok(())
    }

    pub fn tick(app: &mut TrackHubApp, dt: f64) {
        let Some(controller) = app.state.run.controller.as_mut() else {
            return;
        };
        let outcome = controller.tick(dt);
        if let Some(sample) = controller.last_sample() {
            app.state.cursor = Some(sample.point);
            if let Some(speed) = sample.speed {
                app.state.speed_trace.push(sample.elapsed, speed);
            }
        }
        if outcome.complete {
            Self::finish_run(app);
        }
    }

    /// Escape or window close; the samples so far are still written
    pub fn abort(app: &mut TrackHubApp) {
        if let Some(controller) = app.state.run.controller.as_mut() {
            controller.abort();
        }
        Self::finish_run(app);
    }

    fn finish_run(app: &mut TrackHubApp) {
        let Some(mut controller) = app.state.run.controller.take() else {
            return;
        };
        let record = controller.finish();
        if record.is_complete() {
            app.state.run.runs_completed += 1;
        }
        app.state.set_status(format!(
            "Run {:?}: {}/{} steps, {} samples in {:.1}s",
            record.outcome,
            record.steps_completed,
            record.sequence_len,
            record.samples.len(),
            record.duration_s
        ));
        ExportHandler::export_run(app, &record);
        app.state.mode = AppMode::Finished;
    }
}
