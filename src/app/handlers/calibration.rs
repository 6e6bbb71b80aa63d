use log::{error, info, warn};

use crate::app::app_core::TrackHubApp;
use crate::calibration::{AutoCalibration, CalibrationStep};

pub struct CalibrationHandler;

impl CalibrationHandler {
    pub fn handle_calibration(app: &mut TrackHubApp) {
        if app.state.calibration.procedure.is_none() {
            let config = &app.config.get_config().calibration;
            let display = app.state.context.display_size();
            app.state.calibration.procedure = Some(AutoCalibration::new(
                display,
                config.marker_spacing_px,
                config.hold_seconds,
                config.min_samples,
            ));
            app.state.calibration.tap.arm();
            info!("Calibration started on a {:.0}x{:.0} display", display.0, display.1);
        }

        let Some(procedure) = app.state.calibration.procedure.as_mut() else {
            return;
        };
        while let Ok((t, raw)) = app.state.calibration.receiver.try_recv() {
            let step = procedure.push(t, raw);
            app.state.calibration.last_step = Some(step);
            match step {
                CalibrationStep::NextMarker => info!("Calibration: move to the second marker"),
                CalibrationStep::Done => break,
                CalibrationStep::Collecting { .. } => {}
            }
        }

        if procedure.is_done() {
            Self::complete_calibration(app);
        }
    }

    /// Starts collecting the current marker again
    pub fn restart_marker(app: &mut TrackHubApp) {
        if let Some(procedure) = app.state.calibration.procedure.as_mut() {
            procedure.restart_marker();
            app.state.calibration.last_step = None;
            info!("Calibration marker {} restarted", procedure.current_index() + 1);
        }
    }

    fn complete_calibration(app: &mut TrackHubApp) {
        let Some(procedure) = app.state.calibration.procedure.take() else {
            return;
        };
        match procedure.finish() {
            Ok(data) => {
                let path = app.config.get_config().calibration_path();
                if let Err(e) = data.save(&path) {
                    warn!("Could not save calibration to {}: {}", path.display(), e);
                }
                app.state.set_status(format!("Calibrated: {:.3} px/mm", data.ppmm));
                app.state.context.set_calibration(data);
                app.state.complete_calibration();
            }
            Err(e) => {
                error!("Calibration failed: {}", e);
                app.state.set_status(format!("Calibration failed: {}", e));
                app.state.reset_calibration();
            }
        }
    }
}
