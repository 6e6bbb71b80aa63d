use egui::Color32;
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};
use std::collections::VecDeque;

/// Fixed-width y labels so the plot does not jitter as values change
fn format_speed_label(value: f64) -> String {
    if value.abs() >= 1000.0 {
        format!("{:6.1e}", value)
    } else {
        format!("{:6.0}", value)
    }
}

/// Rolling fingertip speed over the last few seconds of a run
#[derive(Debug)]
pub struct SpeedTrace {
    points: VecDeque<[f64; 2]>,
    window_s: f64,
    threshold: Option<f64>,
}

impl SpeedTrace {
    pub fn new(window_s: f64) -> Self {
        Self {
            points: VecDeque::new(),
            window_s,
            threshold: None,
        }
    }

    /// Horizontal reference line, e.g. the speed gate
    pub fn set_threshold(&mut self, threshold: Option<f64>) {
        self.threshold = threshold;
    }

    /// A point at the same time as the newest one is dropped
    pub fn push(&mut self, elapsed: f64, speed: f64) {
        match self.points.back().copied() {
            Some(p) if elapsed == p[0] => return,
            // the run clock restarted
            Some(p) if elapsed < p[0] => self.points.clear(),
            _ => {}
        }
        self.points.push_back([elapsed, speed]);
        while self
            .points
            .front()
            .is_some_and(|p| elapsed - p[0] > self.window_s)
        {
            self.points.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn ui(&self, ui: &mut egui::Ui) {
        let Some(last) = self.points.back() else {
            ui.label("No speed data");
            return;
        };
        let x_max = last[0].max(self.window_s);
        let x_min = x_max - self.window_s;
        let y_peak = self
            .points
            .iter()
            .map(|p| p[1])
            .chain(self.threshold)
            .fold(0.0_f64, f64::max);
        let y_max = (y_peak * 1.1).max(1.0);

        let points: Vec<[f64; 2]> = self.points.iter().copied().collect();
        let threshold = self.threshold;
        Plot::new("speed_trace")
            .height(100.0)
            .x_axis_formatter(|v, _| format!("{:.1}s", v.value))
            .y_axis_formatter(|v, _| format_speed_label(v.value))
            .allow_drag(false)
            .allow_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_min, 0.0], [x_max, y_max]));
                plot_ui.line(
                    Line::new("speed (mm/s)", PlotPoints::from(points))
                        .color(Color32::from_rgb(0, 90, 200))
                        .width(1.0),
                );
                if let Some(t) = threshold {
                    let gate = vec![[x_min, t], [x_max, t]];
                    plot_ui.line(
                        Line::new("threshold", PlotPoints::from(gate))
                            .color(Color32::from_rgb(200, 0, 0))
                            .width(1.0),
                    );
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_window() {
        let mut trace = SpeedTrace::new(2.05);
        for i in 0..50 {
            trace.push(i as f64 * 0.1, 10.0);
        }
        // 2.9 s up to 4.9 s
        assert_eq!(trace.len(), 21);
    }

    #[test]
    fn repeated_time_is_dropped() {
        let mut trace = SpeedTrace::new(2.0);
        trace.push(1.0, 1.0);
        trace.push(1.0, 3.0);
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn restarted_clock_clears_the_trace() {
        let mut trace = SpeedTrace::new(2.0);
        trace.push(5.0, 1.0);
        trace.push(0.0, 1.0);
        assert_eq!(trace.len(), 1);
    }
}
