// THEORY:
// The `Zone` is the fixed target region the user is asked to place their face in.
// It is defined once, in fractional frame coordinates (center plus size), so it is
// independent of the camera resolution and of the screen the overlay is drawn on.
//
// The only geometry the dwell logic needs is "how much of this face lies inside the
// zone". That is measured relative to the *face* area, not the zone area: a small
// face fully inside a large zone scores 1.0, while a face straddling the edge scores
// the share of it that is inside.

use crate::core_modules::bounding_box::NormalizedRect;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_CENTER_X: f64 = 0.5;
const DEFAULT_CENTER_Y: f64 = 0.4; // Slightly above center, where faces sit in portrait framing.
const DEFAULT_WIDTH: f64 = 0.7;
const DEFAULT_HEIGHT: f64 = 0.5;

/// Immutable target zone, all values fractions of the frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Zone {
    pub fn new(center_x: f64, center_y: f64, width: f64, height: f64) -> Result<Self> {
        let zone = Self {
            center_x,
            center_y,
            width,
            height,
        };
        zone.validate()?;
        Ok(zone)
    }

    /// Checks a zone that may have been built field-by-field (e.g. deserialized).
    pub fn validate(&self) -> Result<()> {
        let values = [self.center_x, self.center_y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid("zone values must be finite"));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::invalid(format!(
                "zone width and height must be > 0, got {}x{}",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.center_x) || !(0.0..=1.0).contains(&self.center_y) {
            return Err(Error::invalid(format!(
                "zone center must lie in [0,1]x[0,1], got ({}, {})",
                self.center_x, self.center_y
            )));
        }
        Ok(())
    }

    pub fn rect(&self) -> NormalizedRect {
        NormalizedRect {
            left: self.center_x - self.width / 2.0,
            top: self.center_y - self.height / 2.0,
            right: self.center_x + self.width / 2.0,
            bottom: self.center_y + self.height / 2.0,
        }
    }

    /// The whole frame.
    pub fn full_frame() -> Self {
        Self {
            center_x: 0.5,
            center_y: 0.5,
            width: 1.0,
            height: 1.0,
        }
    }
}

impl Default for Zone {
    fn default() -> Self {
        Self {
            center_x: DEFAULT_CENTER_X,
            center_y: DEFAULT_CENTER_Y,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Fraction of `face` that lies inside `zone`, in `[0, 1]`.
///
/// Intersection dimensions are clamped at zero, and a zero-area face scores 0.
pub fn overlap_fraction(face: &NormalizedRect, zone: &NormalizedRect) -> f64 {
    let face_area = face.area();
    if face_area <= 0.0 {
        return 0.0;
    }

    let overlap_width = (face.right.min(zone.right) - face.left.max(zone.left)).max(0.0);
    let overlap_height = (face.bottom.min(zone.bottom) - face.top.max(zone.top)).max(0.0);

    (overlap_width * overlap_height / face_area).clamp(0.0, 1.0)
}
