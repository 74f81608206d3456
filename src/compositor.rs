//! Flattening the map snapshot and the polar raster into one exportable image.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tiny_skia::Pixmap;

use crate::error::Result;
use crate::labels::{Align, Label, LabelPainter};

/// Caption drawn when the map could not be captured.
pub const MAP_UNAVAILABLE_CAPTION: &str = "(map unavailable in capture)";

/// Neutral dark surround of a capture without a map.
pub const FALLBACK_BACKGROUND: Rgba<u8> = Rgba([30, 30, 34, 255]);

/// Plate under the polar raster wherever no map shows through. Same light
/// gray as the window, so the dark guide and label ink stays readable.
pub const PLATE_BACKGROUND: Rgba<u8> = Rgba([238, 238, 238, 255]);

/// Width of the dark frame around the fallback plate, logical pixels.
const FALLBACK_FRAME: f32 = 4.0;

/// Caption ink on the plate.
const CAPTION_RGBA: [u8; 4] = [60, 60, 60, 255];

/// How the two layers are arranged in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Map and polar raster share the same area; polar on top.
    Overlay,
    /// Map above, polar raster below, both at the polar raster's width.
    Stacked,
}

/// Convert a premultiplied tiny-skia pixmap into a straight-alpha image.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

/// Scale `map` to `width`, keeping its aspect ratio.
fn fit_width(map: &RgbaImage, width: u32) -> RgbaImage {
    let (mw, mh) = map.dimensions();
    if mw == width || mw == 0 {
        return map.clone();
    }
    let height = ((f64::from(mh) * f64::from(width) / f64::from(mw)).round() as u32).max(1);
    imageops::resize(map, width, height, FilterType::Triangle)
}

/// Merges layers; holds the label painter used for the fallback caption.
#[derive(Default)]
pub struct Compositor {
    labels: LabelPainter,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten `map` (if any) and `polar` according to `mode`.
    ///
    /// `scale` is the device pixel ratio the polar raster was drawn at; it
    /// sizes the fallback caption.
    pub fn compose(
        &self,
        map: Option<&RgbaImage>,
        polar: &Pixmap,
        mode: LayoutMode,
        scale: f32,
    ) -> RgbaImage {
        let top = pixmap_to_rgba(polar);
        let (pw, ph) = top.dimensions();
        let Some(map) = map.filter(|m| m.width() > 0 && m.height() > 0) else {
            return self.fallback(&top, scale);
        };
        match mode {
            LayoutMode::Overlay => {
                let mut out = if map.dimensions() == (pw, ph) {
                    map.clone()
                } else {
                    imageops::resize(map, pw, ph, FilterType::Triangle)
                };
                imageops::overlay(&mut out, &top, 0, 0);
                out
            }
            LayoutMode::Stacked => {
                let map = fit_width(map, pw);
                let mh = map.height();
                let mut out = RgbaImage::from_pixel(pw, ph + mh, PLATE_BACKGROUND);
                imageops::replace(&mut out, &map, 0, 0);
                imageops::overlay(&mut out, &top, 0, i64::from(mh));
                out
            }
        }
    }

    fn fallback(&self, top: &RgbaImage, scale: f32) -> RgbaImage {
        let (w, h) = top.dimensions();
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        let mut out = RgbaImage::from_pixel(w, h, FALLBACK_BACKGROUND);
        let frame = (FALLBACK_FRAME * scale).round() as u32;
        if w > 2 * frame && h > 2 * frame {
            let plate = RgbaImage::from_pixel(w - 2 * frame, h - 2 * frame, PLATE_BACKGROUND);
            imageops::replace(&mut out, &plate, i64::from(frame), i64::from(frame));
        }
        imageops::overlay(&mut out, top, 0, 0);

        let logical = (w as f32 / scale, h as f32 / scale);
        if let Some(mut caption) = Pixmap::new(w, h) {
            let label = Label::new(MAP_UNAVAILABLE_CAPTION, logical.0 / 2.0, 14.0)
                .size(12.0)
                .align(Align::Middle)
                .color(CAPTION_RGBA);
            self.labels.draw(
                &mut caption,
                &[label],
                logical,
                tiny_skia::Transform::from_scale(scale, scale),
            );
            imageops::overlay(&mut out, &pixmap_to_rgba(&caption), 0, 0);
        }
        out
    }
}

/// Download name for a capture of `record`, or a timestamped live name.
pub fn capture_file_name(record: Option<&str>) -> String {
    match record.map(str::trim).filter(|r| !r.is_empty()) {
        Some(name) => {
            let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
            let stem = base.strip_suffix(".txt").unwrap_or(base);
            format!("{stem}_360.png")
        }
        None => format!(
            "medicion360_{}.png",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
        ),
    }
}

/// Write `image` as PNG, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    tracing::info!("saved capture to {}", path.display());
    Ok(())
}
