use eframe::egui;

use crate::app::app_core::TrackHubApp;

pub fn render_speed_panel(app: &mut TrackHubApp, ctx: &egui::Context) {
    egui::TopBottomPanel::bottom("speed_trace")
        .resizable(false)
        .show(ctx, |ui| {
            ui.label("Fingertip speed (mm/s)");
            app.state.speed_trace.ui(ui);
        });
}
