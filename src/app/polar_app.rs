//! The eframe application: displays published frames and forwards input.

use std::sync::Arc;
use std::thread::JoinHandle;

use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, TextureHandle, TextureOptions, Vec2};
use egui_phosphor::regular::{CAMERA, FLOPPY_DISK, FOLDER_OPEN, PLAY, STOP};

use crate::compositor::{capture_file_name, LayoutMode};
use crate::polar::{LogicalSize, PolarFrame};
use crate::session::SessionState;
use crate::sink::{UiLink, ViewCommand, ViewUpdate};

const BACKGROUND: Color32 = Color32::from_rgb(238, 238, 238);

/// How the window is set up.
pub struct AppOptions {
    /// Live session controls are shown.
    pub live: bool,
    pub layout: LayoutMode,
    pub period: f64,
    /// Record shown, names captures.
    pub record: Option<String>,
}

pub struct PolarApp {
    link: UiLink,
    worker: Option<JoinHandle<()>>,
    opts: AppOptions,

    frame: Option<Arc<PolarFrame>>,
    polar_tex: Option<TextureHandle>,
    map_tex: Option<TextureHandle>,
    status: String,
    session: SessionState,
    last_geometry: Option<(LogicalSize, f32)>,
}

impl PolarApp {
    pub fn new(link: UiLink, worker: JoinHandle<()>, opts: AppOptions) -> Self {
        Self {
            link,
            worker: Some(worker),
            opts,
            frame: None,
            polar_tex: None,
            map_tex: None,
            status: String::new(),
            session: SessionState::Idle,
            last_geometry: None,
        }
    }

    fn drain_updates(&mut self, ctx: &egui::Context) {
        for update in self.link.drain() {
            match update {
                ViewUpdate::Frame(frame) => {
                    let size = [frame.pixmap.width() as usize, frame.pixmap.height() as usize];
                    let image = egui::ColorImage::from_rgba_premultiplied(size, frame.pixmap.data());
                    upload(ctx, &mut self.polar_tex, "polar", image);
                    self.frame = Some(frame);
                }
                ViewUpdate::Map(map) => {
                    let size = [map.width() as usize, map.height() as usize];
                    let image = egui::ColorImage::from_rgba_unmultiplied(size, map.as_raw());
                    upload(ctx, &mut self.map_tex, "map", image);
                }
                ViewUpdate::Status(s) => self.status = s,
                ViewUpdate::Session(s) => self.session = s,
                ViewUpdate::Saved(file) => {
                    self.status = format!("Saved {file}");
                    self.opts.record = Some(file);
                }
                ViewUpdate::Captured(path) => {
                    self.status = format!("Capture written to {}", path.display());
                }
            }
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if self.opts.live {
                let polling = self.session == SessionState::Polling;
                ui.label("Period (s)");
                ui.add_enabled(
                    !polling,
                    egui::DragValue::new(&mut self.opts.period)
                        .speed(0.1)
                        .range(0.1..=60.0),
                );
                if ui
                    .add_enabled(!polling, egui::Button::new(format!("{PLAY} Start")))
                    .clicked()
                {
                    self.link.send(ViewCommand::Start {
                        period: self.opts.period,
                    });
                }
                if ui
                    .add_enabled(polling, egui::Button::new(format!("{STOP} Stop")))
                    .clicked()
                {
                    self.link.send(ViewCommand::Stop);
                }
                if ui.button(format!("{FLOPPY_DISK} Save")).clicked() {
                    self.link.send(ViewCommand::Save);
                }
                ui.separator();
            } else if let Some(record) = &self.opts.record {
                ui.strong(record);
                ui.separator();
            }

            if ui
                .button(format!("{CAMERA} Capture"))
                .on_hover_text("Save map and diagram as PNG")
                .clicked()
            {
                self.link.send(ViewCommand::Capture { path: None });
            }
            if ui.button(format!("{FOLDER_OPEN} Capture as…")).clicked() {
                let name = capture_file_name(self.opts.record.as_deref());
                if let Some(path) = rfd::FileDialog::new()
                    .set_file_name(name)
                    .add_filter("PNG", &["png"])
                    .save_file()
                {
                    self.link.send(ViewCommand::Capture { path: Some(path) });
                }
            }
            ui.separator();
            ui.label(&self.status);
        });
    }

    fn central(&mut self, ui: &mut egui::Ui) {
        let full = ui.available_rect_before_wrap();
        let (map_rect, polar_rect) = match self.opts.layout {
            LayoutMode::Overlay => (full, full),
            LayoutMode::Stacked => {
                let mid = full.center().y;
                (
                    Rect::from_min_max(full.min, Pos2::new(full.right(), mid)),
                    Rect::from_min_max(Pos2::new(full.left(), mid), full.max),
                )
            }
        };

        let dpr = ui.ctx().pixels_per_point();
        let geometry = (
            LogicalSize::new(polar_rect.width(), polar_rect.height()),
            dpr,
        );
        if self.last_geometry != Some(geometry) {
            self.last_geometry = Some(geometry);
            self.link.send(ViewCommand::Resize {
                size: geometry.0,
                dpr,
            });
        }

        let painter = ui.painter_at(full);
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        match &self.map_tex {
            Some(tex) => {
                let rect = Rect::from_min_size(map_rect.min, tex.size_vec2() / dpr);
                painter.image(tex.id(), rect, uv, Color32::WHITE);
            }
            None if self.opts.layout == LayoutMode::Stacked => {
                painter.text(
                    map_rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Waiting for position…",
                    egui::FontId::proportional(14.0),
                    Color32::GRAY,
                );
            }
            None => {}
        }
        if let (Some(tex), Some(frame)) = (&self.polar_tex, &self.frame) {
            let size = Vec2::new(frame.size.width, frame.size.height);
            painter.image(
                tex.id(),
                Rect::from_min_size(polar_rect.min, size),
                uv,
                Color32::WHITE,
            );
        }

        let map_resp = ui.interact(map_rect, ui.id().with("map"), Sense::drag());
        if map_resp.dragged() {
            let d = map_resp.drag_delta() * dpr;
            if d != Vec2::ZERO {
                self.link.send(ViewCommand::Pan {
                    dx: -f64::from(d.x),
                    dy: -f64::from(d.y),
                });
            }
        }
        if map_resp.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll > 0.0 {
                self.link.send(ViewCommand::Zoom(1));
            } else if scroll < 0.0 {
                self.link.send(ViewCommand::Zoom(-1));
            }
        }

        let polar_resp = match self.opts.layout {
            LayoutMode::Overlay => map_resp,
            LayoutMode::Stacked => ui.interact(polar_rect, ui.id().with("polar"), Sense::hover()),
        };
        if let (Some(pos), Some(frame)) = (polar_resp.hover_pos(), &self.frame) {
            let local = pos - polar_rect.min;
            if let Some(hit) = frame.nearest(f64::from(local.x), f64::from(local.y)) {
                polar_resp.on_hover_text_at_pointer(hit.tooltip());
            }
        }
    }
}

fn upload(ctx: &egui::Context, slot: &mut Option<TextureHandle>, name: &str, image: egui::ColorImage) {
    match slot {
        Some(tex) => tex.set(image, TextureOptions::LINEAR),
        None => *slot = Some(ctx.load_texture(name, image, TextureOptions::LINEAR)),
    }
}

impl eframe::App for PolarApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_updates(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| self.top_bar(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(BACKGROUND))
            .show(ctx, |ui| self.central(ui));

        // The worker wakes us on updates; this only keeps tooltips fresh.
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

impl Drop for PolarApp {
    fn drop(&mut self) {
        self.link.send(ViewCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}
