//! Polar diagram rendering.
//!
//! [`PolarRenderer::render`] draws one complete frame: guide circles, axes,
//! cardinal labels, one colored arrow per sample and a footer line. The
//! result is a [`PolarFrame`] carrying the raster together with the
//! [`HitIndex`] built from the very same geometry, so pointer lookups always
//! match what is on screen.

use std::f64::consts::PI;

use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::data::geometry::{color_for, hi_dpi_transform, to_canvas_point, CanvasPoint, HiDpi};
use crate::data::hit_index::{HitEntry, HitIndex, DEFAULT_HIT_RADIUS};
use crate::data::sample::{PowerRange, SampleSet};
use crate::labels::{Align, Label, LabelPainter};

/// Outer guide radius as a fraction of the smaller surface side.
pub const RADIUS_FRACTION_OF_SIDE: f64 = 0.40;
/// Guide circles, as fractions of the outer radius.
pub const GUIDE_FRACTIONS: [f64; 3] = [0.33, 0.66, 1.0];
/// Where arrow tips sit, as a fraction of the outer radius.
pub const TIP_FRACTION: f64 = 0.92;
/// Distance from the tip back to the arrowhead base, logical px.
pub const HEAD_LENGTH: f64 = 12.0;
/// Half of the arrowhead base width, logical px.
pub const HEAD_HALF_WIDTH: f64 = 8.0;

/// Surface size in logical (CSS) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalSize {
    pub width: f32,
    pub height: f32,
}

impl LogicalSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Colors and stroke widths of the diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarStyle {
    pub guide_rgba: [u8; 4],
    pub axis_rgba: [u8; 4],
    pub label_rgba: [u8; 4],
    pub footer_rgba: [u8; 4],
    pub guide_width: f32,
    pub shaft_width: f32,
}

impl Default for PolarStyle {
    fn default() -> Self {
        Self {
            guide_rgba: [40, 40, 40, 150],
            axis_rgba: [40, 40, 40, 110],
            label_rgba: [20, 20, 20, 255],
            footer_rgba: [20, 20, 20, 230],
            guide_width: 1.0,
            shaft_width: 2.0,
        }
    }
}

/// One rendered frame.
pub struct PolarFrame {
    /// Backing buffer at device resolution, premultiplied RGBA.
    pub pixmap: Pixmap,
    pub hits: HitIndex,
    pub footer: String,
    pub size: LogicalSize,
    pub hidpi: HiDpi,
    pub range: PowerRange,
    /// Number of markers drawn.
    pub drawn: usize,
}

impl PolarFrame {
    /// Marker under the pointer, in logical coordinates of this frame.
    pub fn nearest(&self, x: f64, y: f64) -> Option<&HitEntry> {
        self.hits.nearest(x, y)
    }
}

/// Footer text: marker count and anchor coordinates.
pub fn footer_text(count: usize, set: &SampleSet) -> String {
    let (lat, lon) = match set.anchor() {
        Some(a) => (format!("{:.6}", a.lat), format!("{:.6}", a.lon)),
        None => ("—".to_owned(), "—".to_owned()),
    };
    format!("Puntos: {count}   Lat: {lat}   Lon: {lon}")
}

/// Stateless renderer; holds only the style and the label rasterizer.
pub struct PolarRenderer {
    style: PolarStyle,
    labels: LabelPainter,
}

impl Default for PolarRenderer {
    fn default() -> Self {
        Self::new(PolarStyle::default())
    }
}

impl PolarRenderer {
    pub fn new(style: PolarStyle) -> Self {
        Self {
            style,
            labels: LabelPainter::new(),
        }
    }

    pub fn style(&self) -> &PolarStyle {
        &self.style
    }

    /// Draw `set` on a fresh transparent surface of `size` at `device_pixel_ratio`.
    pub fn render(&self, set: &SampleSet, size: LogicalSize, device_pixel_ratio: f32) -> PolarFrame {
        let hidpi = hi_dpi_transform(size.width, size.height, device_pixel_ratio);
        let ts = hidpi.transform();
        let Some(mut pixmap) =
            Pixmap::new(hidpi.buffer_width, hidpi.buffer_height).or_else(|| Pixmap::new(1, 1))
        else {
            unreachable!("a 1x1 pixmap always allocates");
        };
        pixmap.fill(tiny_skia::Color::TRANSPARENT);

        let w = f64::from(size.width.max(0.0));
        let h = f64::from(size.height.max(0.0));
        let center = CanvasPoint::new(w / 2.0, h / 2.0);
        let radius = RADIUS_FRACTION_OF_SIDE * w.min(h);

        let mut labels = Vec::with_capacity(5);
        self.draw_guides(&mut pixmap, ts, center, radius, &mut labels);

        let range = set.power_range();
        let mut entries = Vec::with_capacity(set.len());
        for sample in set.samples() {
            if !sample.azimuth.is_finite() {
                continue;
            }
            let tip = to_canvas_point(sample.azimuth, TIP_FRACTION, center, radius);
            let rgba = color_for(sample.power, range.min, range.max).rgba8();
            self.draw_arrow(&mut pixmap, ts, center, tip, rgba);
            entries.push(HitEntry {
                x: tip.x,
                y: tip.y,
                sample: *sample,
                hit_radius: DEFAULT_HIT_RADIUS,
            });
        }

        let drawn = entries.len();
        let footer = footer_text(drawn, set);
        labels.push(
            Label::new(footer.clone(), 8.0, (h - 10.0) as f32)
                .size(11.0)
                .align(Align::Start)
                .color(self.style.footer_rgba),
        );
        self.labels
            .draw(&mut pixmap, &labels, (size.width, size.height), ts);

        PolarFrame {
            pixmap,
            hits: HitIndex::new(entries),
            footer,
            size,
            hidpi,
            range,
            drawn,
        }
    }

    fn draw_guides(
        &self,
        pixmap: &mut Pixmap,
        ts: Transform,
        center: CanvasPoint,
        radius: f64,
        labels: &mut Vec<Label>,
    ) {
        if radius <= 0.0 {
            return;
        }
        let stroke = Stroke {
            width: self.style.guide_width,
            ..Stroke::default()
        };
        let guide = paint(self.style.guide_rgba);
        for f in GUIDE_FRACTIONS {
            if let Some(circle) =
                PathBuilder::from_circle(center.x as f32, center.y as f32, (radius * f) as f32)
            {
                pixmap.stroke_path(&circle, &guide, &stroke, ts, None);
            }
        }

        let mut pb = PathBuilder::new();
        for az in [0.0, 90.0] {
            let a = to_canvas_point(az, 1.0, center, radius);
            let b = to_canvas_point(az + 180.0, 1.0, center, radius);
            pb.move_to(a.x as f32, a.y as f32);
            pb.line_to(b.x as f32, b.y as f32);
        }
        if let Some(axes) = pb.finish() {
            pixmap.stroke_path(&axes, &paint(self.style.axis_rgba), &stroke, ts, None);
        }

        for (az, text) in [(0.0, "N"), (90.0, "E"), (180.0, "S"), (270.0, "O")] {
            let p = to_canvas_point(az, 1.0, center, radius + 14.0);
            labels.push(
                Label::new(text, p.x as f32, p.y as f32)
                    .size(13.0)
                    .bold()
                    .color(self.style.label_rgba),
            );
        }
    }

    fn draw_arrow(
        &self,
        pixmap: &mut Pixmap,
        ts: Transform,
        center: CanvasPoint,
        tip: CanvasPoint,
        rgba: [u8; 4],
    ) {
        let color = paint(rgba);
        let mut shaft = PathBuilder::new();
        shaft.move_to(center.x as f32, center.y as f32);
        shaft.line_to(tip.x as f32, tip.y as f32);
        if let Some(path) = shaft.finish() {
            let stroke = Stroke {
                width: self.style.shaft_width,
                line_cap: tiny_skia::LineCap::Round,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &color, &stroke, ts, None);
        }

        let [a, b, c] = arrow_head(center, tip);
        let mut head = PathBuilder::new();
        head.move_to(a.x as f32, a.y as f32);
        head.line_to(b.x as f32, b.y as f32);
        head.line_to(c.x as f32, c.y as f32);
        head.close();
        if let Some(path) = head.finish() {
            pixmap.fill_path(&path, &color, FillRule::Winding, ts, None);
        }
    }
}

/// Triangle of the arrowhead: tip, then the two base corners.
///
/// The base sits [`HEAD_LENGTH`] behind the tip along the shaft and spans
/// [`HEAD_HALF_WIDTH`] to each side, so each flank opens about 0.81π away
/// from the shaft direction.
pub fn arrow_head(center: CanvasPoint, tip: CanvasPoint) -> [CanvasPoint; 3] {
    let dir = (tip.y - center.y).atan2(tip.x - center.x);
    let bx = tip.x - HEAD_LENGTH * dir.cos();
    let by = tip.y - HEAD_LENGTH * dir.sin();
    let (nx, ny) = ((dir + PI / 2.0).cos(), (dir + PI / 2.0).sin());
    [
        tip,
        CanvasPoint::new(bx + HEAD_HALF_WIDTH * nx, by + HEAD_HALF_WIDTH * ny),
        CanvasPoint::new(bx - HEAD_HALF_WIDTH * nx, by - HEAD_HALF_WIDTH * ny),
    ]
}

fn paint(rgba: [u8; 4]) -> Paint<'static> {
    let mut p = Paint::default();
    p.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    p.anti_alias = true;
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{Anchor, Sample};

    #[test]
    fn footer_formats_anchor() {
        let set = SampleSet::new(vec![], Some(Anchor { lat: 40.0, lon: -3.5 }));
        assert_eq!(footer_text(3, &set), "Puntos: 3   Lat: 40.000000   Lon: -3.500000");
        assert_eq!(footer_text(0, &SampleSet::empty()), "Puntos: 0   Lat: —   Lon: —");
    }

    #[test]
    fn arrow_head_sits_behind_tip() {
        let c = CanvasPoint::new(0.0, 0.0);
        let tip = CanvasPoint::new(0.0, -100.0);
        let [t, l, r] = arrow_head(c, tip);
        assert_eq!(t, tip);
        assert!((l.y - -88.0).abs() < 1e-9 && (r.y - -88.0).abs() < 1e-9);
        assert!(((l.x - r.x).abs() - 2.0 * HEAD_HALF_WIDTH).abs() < 1e-9);
    }

    #[test]
    fn markers_follow_bearing() {
        let r = PolarRenderer::default();
        let set = SampleSet::new(vec![Sample::new(90.0, -50.0)], None);
        let frame = r.render(&set, LogicalSize::new(200.0, 200.0), 1.0);
        let e = frame.hits.entries()[0];
        // R = 80, tip at 0.92 R east of center
        assert!((e.x - (100.0 + 0.92 * 80.0)).abs() < 1e-9);
        assert!((e.y - 100.0).abs() < 1e-9);
    }
}
