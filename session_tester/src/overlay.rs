// Renders what the capture screen would draw for a face report: the target zone
// outlined in green or red, the detected face boxes, and a countdown bar under the
// zone that fills as the dwell period elapses.

use dwell_sense::core_modules::bounding_box::NormalizedRect;
use dwell_sense::core_modules::zone::Zone;
use dwell_sense::pipeline::{FaceReport, ZoneColor};
use image::{Rgba, RgbaImage};
use std::path::Path;

const BACKGROUND: Rgba<u8> = Rgba([24, 24, 24, 255]);
const GREEN: Rgba<u8> = Rgba([46, 204, 64, 255]);
const RED: Rgba<u8> = Rgba([255, 65, 54, 255]);
const BAR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FACE: Rgba<u8> = Rgba([255, 220, 0, 255]);
const OUTLINE: u32 = 4;
const FACE_OUTLINE: u32 = 2;
const BAR_HEIGHT: u32 = 12;

/// Pixel bounds of a fractional rect, clamped to the canvas. Inclusive on both ends.
struct PixelRect {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl PixelRect {
    fn from_fractions(rect: &NormalizedRect, width: u32, height: u32) -> Self {
        let to_px = |fraction: f64, extent: u32| -> u32 {
            let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
            ((fraction * f64::from(extent)).round() as u32).min(extent.saturating_sub(1))
        };
        Self {
            left: to_px(rect.left, width),
            top: to_px(rect.top, height),
            right: to_px(rect.right, width),
            bottom: to_px(rect.bottom, height),
        }
    }

    fn outline(&self, canvas: &mut RgbaImage, thickness: u32, color: Rgba<u8>) {
        for y in self.top..=self.bottom {
            for x in self.left..=self.right {
                let on_edge = x < self.left + thickness
                    || x + thickness > self.right
                    || y < self.top + thickness
                    || y + thickness > self.bottom;
                if on_edge {
                    canvas.put_pixel(x, y, color);
                }
            }
        }
    }
}

pub fn render(report: &FaceReport, zone: &Zone, dwell_seconds: u32, width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    let color = match report.zone_color {
        ZoneColor::Green => GREEN,
        ZoneColor::Red => RED,
    };

    let zone_px = PixelRect::from_fractions(&zone.rect(), width, height);
    zone_px.outline(&mut canvas, OUTLINE, color);

    for face in &report.faces {
        if face.area() > 0.0 {
            PixelRect::from_fractions(face, width, height).outline(&mut canvas, FACE_OUTLINE, FACE);
        }
    }
    let PixelRect { left, right, bottom, .. } = zone_px;

    // Countdown bar: empty when idle, full at confirmation.
    let elapsed = if report.state.confirmed {
        dwell_seconds
    } else if report.state.timer_active {
        dwell_seconds.saturating_sub(report.state.seconds_remaining)
    } else {
        0
    };
    let bar_top = (bottom + OUTLINE * 2).min(height);
    let bar_bottom = (bar_top + BAR_HEIGHT).min(height);
    let span = right.saturating_sub(left);
    let filled = if dwell_seconds == 0 {
        0
    } else {
        (u64::from(span) * u64::from(elapsed) / u64::from(dwell_seconds)) as u32
    };
    for y in bar_top..bar_bottom {
        for x in left..left + filled {
            canvas.put_pixel(x, y, BAR);
        }
    }

    canvas
}

pub fn save(canvas: &RgbaImage, path: &Path) -> Result<(), image::ImageError> {
    canvas.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwell_sense::core_modules::dwell_detector::DwellState;

    fn report(inside: bool, seconds_remaining: u32) -> FaceReport {
        FaceReport {
            state: DwellState {
                inside_zone: inside,
                seconds_remaining,
                timer_active: inside,
                confirmed: false,
                faces_detected: usize::from(inside),
            },
            zone_color: if inside { ZoneColor::Green } else { ZoneColor::Red },
            status_text: String::new(),
            faces: Vec::new(),
            alert: None,
            alert_id: None,
        }
    }

    #[test]
    fn outline_uses_zone_color() {
        let zone = Zone::default();
        let canvas = render(&report(true, 5), &zone, 5, 200, 200);
        // Left edge of the default zone sits at 15% of the width.
        assert_eq!(*canvas.get_pixel(31, 60), GREEN);
        assert_eq!(*canvas.get_pixel(100, 60), BACKGROUND);

        let canvas = render(&report(false, 5), &zone, 5, 200, 200);
        assert_eq!(*canvas.get_pixel(31, 60), RED);
    }

    #[test]
    fn countdown_bar_grows_with_elapsed_dwell() {
        let zone = Zone::default();
        let bar_row = 130 + OUTLINE * 2 + 1;
        let idle = render(&report(true, 5), &zone, 5, 200, 200);
        assert_eq!(*idle.get_pixel(31, bar_row), BACKGROUND);

        let halfway = render(&report(true, 3), &zone, 5, 200, 200);
        assert_eq!(*halfway.get_pixel(31, bar_row), BAR);
        assert_eq!(*halfway.get_pixel(160, bar_row), BACKGROUND);
    }

    #[test]
    fn face_boxes_are_outlined() {
        let zone = Zone::default();
        let mut with_face = report(false, 5);
        with_face.faces.push(NormalizedRect {
            left: 0.05,
            top: 0.05,
            right: 0.25,
            bottom: 0.25,
        });
        let canvas = render(&with_face, &zone, 5, 200, 200);
        assert_eq!(*canvas.get_pixel(10, 30), FACE);
        assert_eq!(*canvas.get_pixel(25, 25), BACKGROUND);

        let canvas = render(&report(false, 5), &zone, 5, 200, 200);
        assert_eq!(*canvas.get_pixel(10, 30), BACKGROUND);
    }

    #[test]
    fn countdown_bar_handles_long_dwell() {
        let zone = Zone::default();
        let long = u32::MAX;
        let canvas = render(&report(true, long / 2), &zone, long, 200, 200);
        let bar_row = 130 + OUTLINE * 2 + 1;
        assert_eq!(*canvas.get_pixel(31, bar_row), BAR);
        assert_eq!(*canvas.get_pixel(160, bar_row), BACKGROUND);
    }
}
