//! Text labels drawn onto raster surfaces.
//!
//! tiny-skia has no text support, so labels are emitted as a small SVG
//! document and rasterized with usvg + resvg on top of the target pixmap,
//! using the same draw transform as the rest of the frame.

use std::fmt::Write as _;
use std::sync::Arc;

use once_cell::sync::Lazy;

// System fonts are scanned once per process.
static FONTS: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "loaded system fonts");
    Arc::new(db)
});

/// Horizontal alignment of a label relative to its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Middle,
    End,
}

impl Align {
    fn svg(self) -> &'static str {
        match self {
            Align::Start => "start",
            Align::Middle => "middle",
            Align::End => "end",
        }
    }
}

/// One line of text positioned in logical coordinates (vertically centered).
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub rgba: [u8; 4],
    pub align: Align,
    pub bold: bool,
}

impl Label {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size: 12.0,
            rgba: [255, 255, 255, 255],
            align: Align::Middle,
            bold: false,
        }
    }

    pub fn size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn color(mut self, rgba: [u8; 4]) -> Self {
        self.rgba = rgba;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Rasterizes batches of [`Label`]s.
pub struct LabelPainter {
    options: usvg::Options<'static>,
}

impl Default for LabelPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelPainter {
    pub fn new() -> Self {
        let mut options = usvg::Options::default();
        options.fontdb = FONTS.clone();
        Self { options }
    }

    /// Draw `labels` onto `pixmap`. `logical` is the surface size the label
    /// coordinates refer to; `transform` maps it onto the pixmap.
    ///
    /// Text that cannot be shaped (for example without any installed font)
    /// is silently left out.
    pub fn draw(
        &self,
        pixmap: &mut tiny_skia::Pixmap,
        labels: &[Label],
        logical: (f32, f32),
        transform: tiny_skia::Transform,
    ) {
        if labels.is_empty() {
            return;
        }
        let svg = labels_svg(labels, logical);
        match usvg::Tree::from_str(&svg, &self.options) {
            Ok(tree) => resvg::render(&tree, transform, &mut pixmap.as_mut()),
            Err(e) => tracing::debug!("label layer skipped: {e}"),
        }
    }
}

fn labels_svg(labels: &[Label], (w, h): (f32, f32)) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    for l in labels {
        let [r, g, b, a] = l.rgba;
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="sans-serif" font-size="{}" font-weight="{}" fill="rgb({r},{g},{b})" fill-opacity="{:.3}" text-anchor="{}" dominant-baseline="central">{}</text>"#,
            l.x,
            l.y,
            l.size,
            if l.bold { "bold" } else { "normal" },
            a as f32 / 255.0,
            l.align.svg(),
            escape(&l.text),
        );
    }
    svg.push_str("</svg>");
    svg
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
