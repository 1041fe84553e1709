// THEORY:
// A `BoundingBox` is the face detector's raw output for a single face in a single
// frame, in the frame's own pixel space. Like the other data containers in this
// layer it is "dumb": it carries no history and is discarded after one evaluation.
// Normalizing it against the frame dimensions moves it into the same fractional
// space the target zone is defined in, so the two can be compared directly.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in fractional frame coordinates, `[left, right] x [top, bottom]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl NormalizedRect {
    pub const EMPTY: NormalizedRect = NormalizedRect {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    /// Area of the rectangle. Inverted rectangles count as empty.
    pub fn area(&self) -> f64 {
        (self.right - self.left).max(0.0) * (self.bottom - self.top).max(0.0)
    }
}

/// A single detected face in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge in pixels.
    pub x: f64,
    /// Top edge in pixels.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Converts the box to fractions of the frame it was detected in.
    ///
    /// A frame with a non-positive or non-finite dimension has no meaningful
    /// fractional space, so every box in it maps to `NormalizedRect::EMPTY`.
    pub fn normalize(&self, frame_width: f64, frame_height: f64) -> NormalizedRect {
        let frame_ok = frame_width.is_finite()
            && frame_height.is_finite()
            && frame_width > 0.0
            && frame_height > 0.0;
        if !frame_ok {
            return NormalizedRect::EMPTY;
        }

        NormalizedRect {
            left: self.x / frame_width,
            top: self.y / frame_height,
            right: (self.x + self.width) / frame_width,
            bottom: (self.y + self.height) / frame_height,
        }
    }
}
