use log::{error, info, warn};

use crate::app::app_core::TrackHubApp;
use crate::export::{export_samples, export_trials};
use crate::postural::{postural_header, PosturalRow};
use crate::tapping::TappingSession;
use crate::types::{ExportResult, RunRecord};

pub struct ExportHandler;

impl ExportHandler {
    /// Writes a finished target run into the file opened at its start
    pub fn export_run(app: &mut TrackHubApp, record: &RunRecord) {
        let Some(target) = app.state.run.output.take() else {
            warn!("Run finished without an output file");
            return;
        };
        for (path, count) in &record.paths {
            info!("Path {}: {}", path, count);
        }
        let columns = &app.config.get_config().export.columns;
        let result = export_samples(target, &record.samples, columns);
        Self::apply_result(app, result);
    }

    /// One file per chosen trial, each headed by its tap count
    pub fn export_tapping(app: &mut TrackHubApp, session: &TappingSession) {
        let targets = std::mem::take(&mut app.state.tapping.outputs);
        let chosen = session.series().chosen();
        let columns = &app.config.get_config().export.columns;
        let mut result = export_trials(targets, chosen, columns);

        if let (true, Some(average)) = (result.is_success(), session.series().average()) {
            info!("Tapping average over {} trials: {:.1} taps", chosen.len(), average);
            result.message = format!("{}, average {:.1} taps", result.message, average);
        }
        Self::apply_result(app, result);
    }

    pub fn export_postural(app: &mut TrackHubApp, rows: &[PosturalRow]) {
        let Some(target) = app.state.postural.output.take() else {
            warn!("Postural recording finished without an output file");
            return;
        };
        if rows.is_empty() {
            target.discard();
            Self::apply_result(app, ExportResult::no_data());
            return;
        }
        let max_fingers = rows.iter().map(|r| r.fingers.len()).max().unwrap_or(0);
        let path = target.path().to_path_buf();
        let result = match target.write_rows(&postural_header(max_fingers), rows.iter().map(PosturalRow::cells)) {
            Ok(count) => ExportResult::success(path, count),
            Err(e) => ExportResult::error(e.to_string()),
        };
        Self::apply_result(app, result);
    }

    fn apply_result(app: &mut TrackHubApp, result: ExportResult) {
        if result.is_success() {
            info!("{}", result.message);
        } else {
            error!("Export: {}", result.message);
        }
        app.state.export.last_path = result.path.clone();
        app.state.export.export_status = result.message;
    }
}
