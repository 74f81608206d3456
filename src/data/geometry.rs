//! Pure geometry and color helpers shared by the renderer and hit testing.
//!
//! Nothing here holds state: every function maps its inputs to an output so
//! it can be tested on its own.

use super::sample::normalize_azimuth;

/// Below this span a power range is considered degenerate.
pub const RANGE_EPSILON: f64 = 1e-6;

/// Largest backing-buffer side, in device pixels.
pub const MAX_BUFFER_SIDE: u32 = 8192;

/// Gray used for markers whose color cannot be derived from power.
pub const NEUTRAL_RGBA: [u8; 4] = [136, 136, 136, 255];

/// A point in logical (CSS) pixel space of the polar surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

impl CanvasPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

/// Map a bearing onto the surface: 0° points up, angles grow clockwise.
pub fn to_canvas_point(
    azimuth_deg: f64,
    radius_fraction: f64,
    center: CanvasPoint,
    max_radius: f64,
) -> CanvasPoint {
    let angle = (normalize_azimuth(azimuth_deg) - 90.0).to_radians();
    let r = radius_fraction * max_radius;
    CanvasPoint {
        x: center.x + r * angle.cos(),
        y: center.y + r * angle.sin(),
    }
}

/// Marker color on the green → yellow → red ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepColor {
    /// HSL hue in degrees: 120 is green, 60 yellow, 0 red.
    Hue(f64),
    Neutral,
}

impl SweepColor {
    /// Straight (non-premultiplied) RGBA bytes.
    pub fn rgba8(&self) -> [u8; 4] {
        match *self {
            SweepColor::Hue(h) => {
                let [r, g, b] = hsl_to_rgb(h, 0.9, 0.5);
                [r, g, b, 255]
            }
            SweepColor::Neutral => NEUTRAL_RGBA,
        }
    }

    pub fn hue(&self) -> Option<f64> {
        match *self {
            SweepColor::Hue(h) => Some(h),
            SweepColor::Neutral => None,
        }
    }
}

/// Interpolate the ramp color for `power` within `[min, max]`.
pub fn color_for(power: f64, min: f64, max: f64) -> SweepColor {
    if !(power.is_finite() && min.is_finite() && max.is_finite()) {
        return SweepColor::Neutral;
    }
    let span = max - min;
    if span <= RANGE_EPSILON {
        return SweepColor::Neutral;
    }
    let t = ((power - min) / span).clamp(0.0, 1.0);
    let hue = if t < 0.5 {
        120.0 - (t / 0.5) * 60.0
    } else {
        60.0 - ((t - 0.5) / 0.5) * 60.0
    };
    SweepColor::Hue(hue)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [u8; 3] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to8(r), to8(g), to8(b)]
}

/// Backing-buffer geometry for a surface drawn in logical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HiDpi {
    pub buffer_width: u32,
    pub buffer_height: u32,
    pub scale: f32,
}

impl HiDpi {
    /// Draw transform mapping logical coordinates onto the backing buffer.
    pub fn transform(&self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_scale(self.scale, self.scale)
    }
}

/// Size the backing buffer at `logical × ratio` and scale drawing by `ratio`.
///
/// An invalid ratio is treated as 1. Each dimension is clamped to
/// `1..=MAX_BUFFER_SIDE` pixels; when the longer side would overflow, the
/// scale shrinks uniformly so the whole logical surface still fits.
pub fn hi_dpi_transform(logical_width: f32, logical_height: f32, device_pixel_ratio: f32) -> HiDpi {
    let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    let sanitize = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
    let (w, h) = (sanitize(logical_width), sanitize(logical_height));
    let max_side = MAX_BUFFER_SIDE as f32;
    let longest = w.max(h);
    let scale = if longest * ratio > max_side {
        max_side / longest
    } else {
        ratio
    };
    let dim = |v: f32| ((v * scale).round() as u32).clamp(1, MAX_BUFFER_SIDE);
    HiDpi {
        buffer_width: dim(w),
        buffer_height: dim(h),
        scale,
    }
}
