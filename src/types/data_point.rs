use serde::{Deserialize, Serialize};

/// Raw sensor-space vector, millimetres (or mm/s for velocities)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vector3> for [f64; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Display-space point in pixels, origin at the top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// A tracked point after calibration: pixels plus the raw depth for
/// depth-aware targets
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MappedPoint {
    pub pos: Point2,
    pub depth: Option<f64>,
}

impl MappedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { pos: Point2::new(x, y), depth: None }
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = Some(depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_deserializes_from_array() {
        let v: Vector3 = serde_json::from_str("[3.0, 4.0, 12.0]").unwrap();
        assert_eq!(v, Vector3::new(3.0, 4.0, 12.0));
        assert_eq!(v.norm(), 13.0);
    }

    #[test]
    fn distance_squared_skips_the_root() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert_eq!(a.distance_squared(&b), 25.0);
    }
}
