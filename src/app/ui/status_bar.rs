use eframe::egui;

use crate::app::app_core::TrackHubApp;
use crate::app::state::AppMode;
use crate::calibration::CalibrationStep;
use crate::postural::PosturalPhase;
use crate::tapping::TrialPhase;
use crate::task::TaskKind;

pub fn render_status_bar(app: &mut TrackHubApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("status_bar")
        .min_height(40.0)
        .show(ctx, |ui| {
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                ui.label("Status:");

                let status_color = match app.state.mode {
                    AppMode::Calibrating => egui::Color32::from_rgb(255, 165, 0),
                    AppMode::Ready => egui::Color32::from_rgb(0, 100, 200),
                    AppMode::Running => egui::Color32::from_rgb(0, 150, 0),
                    AppMode::Finished => egui::Color32::from_rgb(150, 0, 0),
                };
                ui.colored_label(status_color, app.state.get_status_summary());

                ui.separator();
                ui.label(format!("Task: {:?}", app.config.get_config().task.kind));

                ui.separator();
                render_status_details(app, ui);

                ui.separator();
                match app.state.context.calibration() {
                    Some(calibration) => ui.label(format!("Scale: {:.3} px/mm", calibration.ppmm)),
                    None => ui.label("Scale: not calibrated"),
                };

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if !app.state.status_message.is_empty() {
                        ui.label(&app.state.status_message);
                    }
                });
            });
            ui.add_space(5.0);
        });
}

fn render_status_details(app: &TrackHubApp, ui: &mut egui::Ui) {
    match app.state.mode {
        AppMode::Calibrating => match (&app.state.calibration.procedure, app.state.calibration.last_step) {
            (Some(procedure), Some(CalibrationStep::Collecting { marker, progress })) => {
                ui.label(format!(
                    "Marker {}/2 ({} samples)",
                    marker + 1,
                    procedure.samples_for(marker)
                ));
                ui.add(egui::ProgressBar::new(progress as f32).desired_width(150.0));
            }
            (Some(procedure), _) => {
                ui.label(format!("Marker {}/2: waiting for a fingertip", procedure.current_index() + 1));
            }
            (None, _) => {
                ui.label("waiting for data...");
            }
        },
        AppMode::Running => match app.config.get_config().task.kind {
            TaskKind::Tapping => render_tapping_details(app, ui),
            TaskKind::Postural => {
                let recorder = &app.state.postural.recorder;
                match recorder.phase() {
                    PosturalPhase::Recording { .. } => {
                        ui.label(format!("Recording: {} frames", recorder.rows_recorded()));
                    }
                    _ => {
                        ui.label("Positioning");
                    }
                }
            }
            TaskKind::Clock | TaskKind::Corners | TaskKind::CornersDepth => {
                if let Some(controller) = &app.state.run.controller {
                    let sequencer = controller.sequencer();
                    ui.label(format!(
                        "Step {}/{}  Target {}",
                        sequencer.step() + 1,
                        sequencer.sequence().len(),
                        sequencer.active_label().unwrap_or("-")
                    ));
                }
                ui.separator();
                ui.label(format!("Samples: {}", app.state.context.logged()));
            }
        },
        AppMode::Ready | AppMode::Finished => {
            ui.label(format!("Runs completed: {}", app.state.run.runs_completed));
        }
    }
}

fn render_tapping_details(app: &TrackHubApp, ui: &mut egui::Ui) {
    let Some(session) = &app.state.tapping.session else {
        return;
    };
    match session.phase() {
        TrialPhase::Countdown { remaining } => {
            ui.label(format!("Starting in {:.0}", remaining.ceil()));
        }
        TrialPhase::Counting { remaining } => {
            ui.label(format!("Taps: {}  ({:.1}s left)", session.taps(), remaining.max(0.0)));
        }
        TrialPhase::Finished => {
            ui.label(format!(
                "Trial {} done, series {}",
                session.series().trials_run(),
                session.series().series_len()
            ));
        }
    }
}

pub fn render_bottom_status_bar(app: &mut TrackHubApp, ctx: &egui::Context) {
    egui::TopBottomPanel::bottom("bottom_status_bar")
        .min_height(25.0)
        .show(ctx, |ui| {
            ui.add_space(3.0);
            ui.horizontal(|ui| {
                ui.label("Hotkeys:");
                ui.colored_label(egui::Color32::from_rgb(0, 150, 0), "SPACE");
                ui.label("start");
                ui.colored_label(egui::Color32::from_rgb(150, 0, 0), "ESC");
                ui.label("stop");
                ui.colored_label(egui::Color32::from_rgb(255, 165, 0), "C");
                ui.label("recalibrate");
                if app.state.mode == AppMode::Calibrating {
                    ui.colored_label(egui::Color32::from_rgb(255, 165, 0), "R");
                    ui.label("restart marker");
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if !app.state.export.export_status.is_empty() {
                        ui.colored_label(egui::Color32::from_rgb(0, 150, 100), &app.state.export.export_status);
                    }
                });
            });
            ui.add_space(3.0);
        });
}
