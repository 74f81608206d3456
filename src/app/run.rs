//! Entry points that open a native window.
//!
//! Each call spawns the worker, opens one eframe window hosting one view and
//! blocks until the window is closed.

use eframe::egui;

use crate::compositor::LayoutMode;
use crate::config::Polar360Config;
use crate::sink;

use super::polar_app::{AppOptions, PolarApp};
use super::worker::{self, Mode, RecordSource};

/// Live session window. With `autostart`, the measurement starts at once
/// with that sampling period.
pub fn run_live(cfg: Polar360Config, autostart: Option<f64>) -> eframe::Result<()> {
    let opts = AppOptions {
        live: true,
        layout: LayoutMode::Stacked,
        period: autostart.unwrap_or(cfg.sample_period_s),
        record: None,
    };
    run("polar360 · live", cfg, Mode::Live { autostart }, opts)
}

/// Window showing one saved record over its map.
pub fn run_record(cfg: Polar360Config, source: RecordSource) -> eframe::Result<()> {
    let record = match &source {
        RecordSource::Backend(name) => name.clone(),
        RecordSource::File(path) => path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
    };
    let title = format!("polar360 · {record}");
    let opts = AppOptions {
        live: false,
        layout: LayoutMode::Overlay,
        period: cfg.sample_period_s,
        record: Some(record),
    };
    run(&title, cfg, Mode::Record(source), opts)
}

fn run(title: &str, cfg: Polar360Config, mode: Mode, opts: AppOptions) -> eframe::Result<()> {
    let mut viewport = egui::ViewportBuilder::default()
        .with_title(title)
        .with_inner_size(cfg.window_size);
    if let Some(icon) = load_app_icon_svg() {
        viewport = viewport.with_icon(icon);
    }
    let native = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        title,
        native,
        Box::new(move |cc| {
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);

            let ctx = cc.egui_ctx.clone();
            let (ui_link, worker_link) = sink::channel(move || ctx.request_repaint());
            let handle = worker::spawn(cfg, mode, worker_link)?;
            Ok(Box::new(PolarApp::new(ui_link, handle, opts)))
        }),
    )
}

/// Window icon rendered from `icon.svg` next to the manifest.
fn load_app_icon_svg() -> Option<egui::IconData> {
    let data = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/icon.svg"));
    let tree = usvg::Tree::from_data(data, &usvg::Options::default()).ok()?;
    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    Some(egui::IconData {
        rgba: pixmap.take(),
        width: size.width(),
        height: size.height(),
    })
}
