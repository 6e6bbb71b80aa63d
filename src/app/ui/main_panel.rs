use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Stroke};

use crate::app::app_core::TrackHubApp;
use crate::app::state::AppMode;
use crate::postural::PosturalPhase;
use crate::tapping::TrialPhase;
use crate::task::TaskKind;
use crate::types::{MappedPoint, Point2};

const CURSOR_RADIUS: f32 = 8.0;
const MARKER_RADIUS: f32 = 15.0;

/// The task surface. Its size is the display size the mapper works with.
pub fn render_main_panel(app: &mut TrackHubApp, ctx: &egui::Context) {
    egui::CentralPanel::default()
        .frame(egui::Frame::new().fill(Color32::WHITE))
        .show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::hover());
            let rect = response.rect;
            let size = (f64::from(rect.width()), f64::from(rect.height()));
            if size != app.state.context.display_size() {
                app.state.context.set_display_size(size);
            }

            match app.state.mode {
                AppMode::Calibrating => draw_calibration(app, &painter, rect),
                AppMode::Running => match app.config.get_config().task.kind {
                    TaskKind::Tapping => draw_tapping(app, &painter, rect),
                    TaskKind::Postural => draw_postural(app, &painter, rect),
                    TaskKind::Clock | TaskKind::Corners | TaskKind::CornersDepth => {
                        draw_targets(app, &painter, rect)
                    }
                },
                AppMode::Ready | AppMode::Finished => {
                    let prompt = if app.state.mode == AppMode::Ready {
                        "Press SPACE to start"
                    } else {
                        "Done. Press SPACE to go again"
                    };
                    painter.text(
                        rect.center(),
                        Align2::CENTER_CENTER,
                        prompt,
                        FontId::proportional(28.0),
                        Color32::DARK_GRAY,
                    );
                }
            }

            if let Some(point) = app.state.cursor {
                let radius = if app.config.get_config().task.kind == TaskKind::CornersDepth {
                    depth_cursor_radius(point)
                } else {
                    CURSOR_RADIUS
                };
                painter.circle_filled(to_screen(rect, point.pos), radius, Color32::RED);
            }
        });
}

fn to_screen(rect: Rect, p: Point2) -> Pos2 {
    rect.min + egui::vec2(p.x as f32, p.y as f32)
}

/// Grows with sensor z so near and far targets can be told apart
fn depth_cursor_radius(point: MappedPoint) -> f32 {
    match point.depth {
        Some(z) => (CURSOR_RADIUS + z as f32 / 20.0).clamp(3.0, 20.0),
        None => CURSOR_RADIUS,
    }
}

fn draw_targets(app: &TrackHubApp, painter: &egui::Painter, rect: Rect) {
    let Some(controller) = &app.state.run.controller else {
        return;
    };
    let sequencer = controller.sequencer();
    let active = sequencer.active_index();

    for (index, target) in sequencer.targets().iter().enumerate() {
        let center = to_screen(rect, target.center);
        let radius = target.radius as f32;
        if Some(index) == active {
            painter.circle_stroke(center, radius, Stroke::new(3.0, Color32::BLACK));
            let fill = sequencer.fill() as f32;
            if fill > 0.0 {
                painter.circle_filled(center, fill, Color32::from_rgb(0, 180, 0));
            }
            painter.text(
                center + egui::vec2(0.0, -radius - 12.0),
                Align2::CENTER_CENTER,
                &target.label,
                FontId::proportional(16.0),
                Color32::BLACK,
            );
        } else {
            painter.circle_stroke(center, radius, Stroke::new(1.0, Color32::LIGHT_GRAY));
        }
    }
}

fn draw_calibration(app: &TrackHubApp, painter: &egui::Painter, rect: Rect) {
    let Some(procedure) = &app.state.calibration.procedure else {
        return;
    };
    let current = procedure.current_index();
    for (index, marker) in procedure.markers().iter().enumerate() {
        let color = if index < current {
            Color32::from_rgb(0, 180, 0)
        } else if index == current {
            Color32::from_rgb(255, 165, 0)
        } else {
            Color32::LIGHT_GRAY
        };
        painter.circle_filled(to_screen(rect, *marker), MARKER_RADIUS, color);
    }
    painter.text(
        rect.center_top() + egui::vec2(0.0, 40.0),
        Align2::CENTER_CENTER,
        format!("Hold your fingertip on marker {} until it turns green", current + 1),
        FontId::proportional(22.0),
        Color32::DARK_GRAY,
    );
}

fn draw_tapping(app: &TrackHubApp, painter: &egui::Painter, rect: Rect) {
    let Some(session) = &app.state.tapping.session else {
        return;
    };
    let lines = session.lines();
    for y in [lines.top, lines.bottom] {
        let y = rect.min.y + y as f32;
        painter.line_segment(
            [Pos2::new(rect.min.x, y), Pos2::new(rect.max.x, y)],
            Stroke::new(2.0, Color32::DARK_BLUE),
        );
    }
    let text = match session.phase() {
        TrialPhase::Countdown { remaining } => format!("{:.0}", remaining.ceil()),
        TrialPhase::Counting { .. } => session.taps().to_string(),
        TrialPhase::Finished => format!("{} taps", session.taps()),
    };
    painter.text(
        rect.center_top() + egui::vec2(0.0, 60.0),
        Align2::CENTER_CENTER,
        text,
        FontId::proportional(40.0),
        Color32::BLACK,
    );
}

fn draw_postural(app: &TrackHubApp, painter: &egui::Painter, rect: Rect) {
    let recorder = &app.state.postural.recorder;
    let text = match recorder.phase() {
        PosturalPhase::Recording { start_us: Some(_) } => format!("Recording... {} frames", recorder.rows_recorded()),
        PosturalPhase::Recording { start_us: None } => "Waiting for both hands".to_string(),
        PosturalPhase::Positioning => "Hold both hands above the sensor".to_string(),
        PosturalPhase::Idle | PosturalPhase::Finished { .. } => String::new(),
    };
    painter.text(
        rect.center(),
        Align2::CENTER_CENTER,
        text,
        FontId::proportional(28.0),
        Color32::DARK_GRAY,
    );
}
