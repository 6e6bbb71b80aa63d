use std::f64::consts::FRAC_1_SQRT_2;

use super::TaskError;
use crate::types::{MappedPoint, Point2};

/// A circular target region. Immutable for the length of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub label: String,
    pub center: Point2,
    /// Sensor depth (mm) of depth-aware targets
    pub depth: Option<f64>,
    pub radius: f64,
}

impl Target {
    pub fn new(label: impl Into<String>, center: Point2, radius: f64) -> Self {
        Self {
            label: label.into(),
            center,
            depth: None,
            radius,
        }
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Squared-distance containment, boundary included.
    ///
    /// Depth only counts when both the target and the point carry it; the
    /// depth difference (mm) is added to the pixel distance unchanged.
    pub fn contains(&self, point: &MappedPoint) -> bool {
        let mut d2 = point.pos.distance_squared(&self.center);
        if let (Some(target_z), Some(z)) = (self.depth, point.depth) {
            let dz = z - target_z;
            d2 += dz * dz;
        }
        d2 <= self.radius * self.radius
    }
}

/// The fixed set of target positions of one layout
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSet {
    targets: Vec<Target>,
}

pub const CLOCK_LABELS: [&str; 9] = ["C", "N", "NE", "E", "SE", "S", "SW", "W", "NW"];
pub const CORNER_LABELS: [&str; 4] = ["NW", "NE", "SW", "SE"];
pub const DEPTH_LABELS: [&str; 8] = ["NWC", "NEC", "SWC", "SEC", "NWF", "NEF", "SWF", "SEF"];

impl TargetSet {
    pub fn new(targets: Vec<Target>) -> Result<Self, TaskError> {
        if targets.len() < 2 {
            return Err(TaskError::TooFewTargets(targets.len()));
        }
        if let Some(bad) = targets.iter().find(|t| !(t.radius.is_finite() && t.radius > 0.0)) {
            return Err(TaskError::InvalidRadius(bad.radius));
        }
        Ok(Self { targets })
    }

    /// Centre target, then north and clockwise around a circle of `spacing_px`
    pub fn clock(display_size: (f64, f64), spacing_px: f64, radius: f64) -> Result<Self, TaskError> {
        let cx = display_size.0 / 2.0;
        let cy = display_size.1 / 2.0;
        let diag = spacing_px * FRAC_1_SQRT_2;
        let positions = [
            (cx, cy),
            (cx, cy - spacing_px),
            (cx + diag, cy - diag),
            (cx + spacing_px, cy),
            (cx + diag, cy + diag),
            (cx, cy + spacing_px),
            (cx - diag, cy + diag),
            (cx - spacing_px, cy),
            (cx - diag, cy - diag),
        ];
        let targets = CLOCK_LABELS
            .iter()
            .zip(positions)
            .map(|(label, (x, y))| Target::new(*label, Point2::new(x, y), radius))
            .collect();
        Self::new(targets)
    }

    /// NW, NE, SW, SE on a square of side `spacing_px`, inset by `edge_px`
    pub fn corners(edge_px: f64, spacing_px: f64, radius: f64) -> Result<Self, TaskError> {
        let targets = CORNER_LABELS
            .iter()
            .zip(corner_positions(edge_px, spacing_px))
            .map(|(label, center)| Target::new(*label, center, radius))
            .collect();
        Self::new(targets)
    }

    /// Corners twice: close targets at `+box_depth_mm / 2`, far at the negative
    pub fn corners_depth(edge_px: f64, spacing_px: f64, radius: f64, box_depth_mm: f64) -> Result<Self, TaskError> {
        let corners = corner_positions(edge_px, spacing_px);
        let half = box_depth_mm / 2.0;
        let targets = DEPTH_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let depth = if i < 4 { half } else { -half };
                Target::new(*label, corners[i % 4], radius).with_depth(depth)
            })
            .collect();
        Self::new(targets)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.targets.get(index)
    }

    pub fn label(&self, index: usize) -> &str {
        self.targets.get(index).map_or("?", |t| t.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }
}

fn corner_positions(edge_px: f64, spacing_px: f64) -> [Point2; 4] {
    let near = edge_px;
    let far = edge_px + spacing_px;
    [
        Point2::new(near, near),
        Point2::new(far, near),
        Point2::new(near, far),
        Point2::new(far, far),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new("T", Point2::new(100.0, 100.0), 50.0)
    }

    #[test]
    fn boundary_point_is_inside() {
        let t = target();
        assert!(t.contains(&MappedPoint::new(150.0, 100.0)));
        assert!(t.contains(&MappedPoint::new(130.0, 140.0)));
        assert!(!t.contains(&MappedPoint::new(150.0001, 100.0)));
    }

    #[test]
    fn containment_matches_squared_distance() {
        let t = target();
        for (x, y) in [(0.0, 0.0), (99.0, 60.0), (149.0, 110.0), (100.0, 151.0), (64.0, 64.0)] {
            let p = MappedPoint::new(x, y);
            let expected = p.pos.distance_squared(&t.center) <= t.radius * t.radius;
            assert_eq!(t.contains(&p), expected, "point ({x}, {y})");
        }
    }

    #[test]
    fn depth_only_counts_when_both_sides_have_it() {
        let t = target().with_depth(40.0);
        assert!(t.contains(&MappedPoint::new(100.0, 100.0)));
        assert!(t.contains(&MappedPoint::new(100.0, 100.0).with_depth(0.0)));
        assert!(!t.contains(&MappedPoint::new(131.0, 100.0).with_depth(0.0)));
        assert!(t.contains(&MappedPoint::new(131.0, 100.0).with_depth(40.0)));
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        assert_eq!(
            TargetSet::corners(100.0, 300.0, 0.0),
            Err(TaskError::InvalidRadius(0.0))
        );
        assert!(matches!(
            TargetSet::clock((800.0, 800.0), 300.0, -1.0),
            Err(TaskError::InvalidRadius(_))
        ));
        assert!(matches!(
            TargetSet::new(vec![target()]),
            Err(TaskError::TooFewTargets(1))
        ));
    }

    #[test]
    fn clock_layout_starts_at_the_centre_and_goes_clockwise() {
        let set = TargetSet::clock((800.0, 600.0), 200.0, 30.0).unwrap();
        assert_eq!(set.len(), 9);
        assert_eq!(set.get(0).unwrap().center, Point2::new(400.0, 300.0));
        assert_eq!(set.get(1).unwrap().center, Point2::new(400.0, 100.0));
        assert_eq!(set.get(3).unwrap().center, Point2::new(600.0, 300.0));
        assert_eq!(set.label(8), "NW");
        for t in set.iter().skip(1) {
            let d = t.center.distance_squared(&Point2::new(400.0, 300.0)).sqrt();
            assert!((d - 200.0).abs() < 1e-9);
        }
    }

    #[test]
    fn depth_layout_has_close_and_far_corners() {
        let set = TargetSet::corners_depth(100.0, 300.0, 20.0, 100.0).unwrap();
        assert_eq!(set.len(), 8);
        assert_eq!(set.get(0).unwrap().depth, Some(50.0));
        assert_eq!(set.get(4).unwrap().depth, Some(-50.0));
        assert_eq!(set.get(3).unwrap().center, set.get(7).unwrap().center);
        assert_eq!(set.get(3).unwrap().center, Point2::new(400.0, 400.0));
    }
}
