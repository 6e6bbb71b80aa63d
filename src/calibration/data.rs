use std::path::Path;

use chrono::Local;
use log::info;
use serde::{Deserialize, Serialize};

use super::CalibrationError;
use crate::types::{MappedPoint, Point2, Vector3};

/// Maps raw sensor-space positions onto the display.
///
/// Implementations must be deterministic for a fixed calibration and must
/// always return a point inside `[0, w] x [0, h]`.
pub trait CoordinateMapper: Send + Sync {
    fn map(&self, raw: Vector3, display_size: (f64, f64)) -> Point2;

    /// Mapped point carrying the raw depth, for depth-aware targets
    fn map_with_depth(&self, raw: Vector3, display_size: (f64, f64)) -> MappedPoint {
        let pos = self.map(raw, display_size);
        MappedPoint { pos, depth: Some(raw.z) }
    }
}

/// Persisted screen calibration for one physical setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    /// Pixels per millimetre
    pub ppmm: f64,
    /// Sensor-space x (mm) that lands on the horizontal display centre
    pub origin_x: f64,
    /// Sensor-space height (mm) that lands on the vertical display centre
    pub origin_y: f64,
    #[serde(default)]
    pub created_at: String,
}

impl CalibrationData {
    pub fn new(ppmm: f64, origin_x: f64, origin_y: f64) -> Self {
        Self {
            ppmm,
            origin_x,
            origin_y,
            created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !self.ppmm.is_finite() || self.ppmm <= 0.0 {
            return Err(CalibrationError::InvalidScale(self.ppmm));
        }
        if !self.origin_x.is_finite() || !self.origin_y.is_finite() {
            return Err(CalibrationError::InvalidOrigin);
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CalibrationError::Missing(path.to_path_buf())
            } else {
                CalibrationError::Io(e)
            }
        })?;
        let data: CalibrationData = toml::from_str(&content).map_err(CalibrationError::Parse)?;
        data.validate()?;
        info!("Loaded screen calibration from {} ({:.3} px/mm)", path.display(), data.ppmm);
        Ok(data)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        self.validate()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(CalibrationError::Io)?;
            }
        }
        let content = toml::to_string_pretty(self).map_err(CalibrationError::Serialize)?;
        std::fs::write(path, content).map_err(CalibrationError::Io)?;
        info!("Saved screen calibration to {}", path.display());
        Ok(())
    }

    /// Sensor millimetres to display pixels, clamped to the display
    pub fn finger_to_graphics(&self, raw: Vector3, display_size: (f64, f64)) -> Point2 {
        let (w, h) = display_size;
        // sensor y grows upwards, display y grows downwards
        let x = w / 2.0 + (raw.x - self.origin_x) * self.ppmm;
        let y = h / 2.0 - (raw.y - self.origin_y) * self.ppmm;
        Point2::new(clamp_axis(x, w), clamp_axis(y, h))
    }

    pub fn mm_to_px(&self, mm: f64) -> f64 {
        mm * self.ppmm
    }
}

fn clamp_axis(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return max / 2.0;
    }
    value.clamp(0.0, max.max(0.0))
}

impl CoordinateMapper for CalibrationData {
    fn map(&self, raw: Vector3, display_size: (f64, f64)) -> Point2 {
        self.finger_to_graphics(raw, display_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn origin_maps_to_display_centre() {
        let cal = CalibrationData::new(4.0, 10.0, 200.0);
        let p = cal.map(Vector3::new(10.0, 200.0, 0.0), (800.0, 600.0));
        assert_eq!(p, Point2::new(400.0, 300.0));
    }

    #[test]
    fn moving_up_moves_the_cursor_up() {
        let cal = CalibrationData::new(2.0, 0.0, 200.0);
        let p = cal.map(Vector3::new(5.0, 210.0, 0.0), (800.0, 600.0));
        assert_eq!(p, Point2::new(410.0, 280.0));
    }

    #[test]
    fn mapping_is_clamped_to_the_display() {
        let cal = CalibrationData::new(10.0, 0.0, 0.0);
        let p = cal.map(Vector3::new(-1000.0, -1000.0, 0.0), (800.0, 600.0));
        assert_eq!(p, Point2::new(0.0, 600.0));
        let nan = cal.map(Vector3::new(f64::NAN, 0.0, 0.0), (800.0, 600.0));
        assert_eq!(nan.x, 400.0);
    }

    #[test]
    fn depth_is_carried_through() {
        let cal = CalibrationData::new(1.0, 0.0, 0.0);
        let p = cal.map_with_depth(Vector3::new(0.0, 0.0, -25.0), (100.0, 100.0));
        assert_eq!(p.depth, Some(-25.0));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cal").join("calibration.toml");
        let cal = CalibrationData::new(3.25, -4.0, 180.0);
        cal.save(&path).unwrap();
        let loaded = CalibrationData::load(&path).unwrap();
        assert_eq!(loaded, cal);
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = TempDir::new().unwrap();
        let err = CalibrationData::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, CalibrationError::Missing(_)));
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calibration.toml");
        std::fs::write(&path, "ppmm = 0.0\norigin_x = 0.0\norigin_y = 0.0\n").unwrap();
        assert!(matches!(
            CalibrationData::load(&path),
            Err(CalibrationError::InvalidScale(_))
        ));
    }
}
