//! Worker thread that owns the view.
//!
//! Fetching, rendering, map rasterization and compositing all happen here, on
//! one thread driven by a current-thread tokio runtime. The UI only sees the
//! immutable snapshots published through [`WorkerLink`].

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::backend::BackendClient;
use crate::compositor::{save_png, LayoutMode};
use crate::config::Polar360Config;
use crate::map::tiles::{self, TileMap};
use crate::map::{MapAdapter, MapWidget, MarkerUpdate};
use crate::session::{LiveFeed, LiveSession, SessionState, TickOutcome};
use crate::sink::{ViewCommand, ViewUpdate, WorkerLink};
use crate::view::PolarView;
use crate::viewer::StaticViewer;

/// Where a record view gets its data.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSource {
    /// Saved on the backend, by name or listing URL.
    Backend(String),
    File(PathBuf),
}

/// What the worker drives.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Live session; starts right away when a period is given.
    Live { autostart: Option<f64> },
    Record(RecordSource),
}

enum Event {
    Command(Option<ViewCommand>),
    Tick,
}

enum Flow {
    Continue,
    Exit,
}

/// The view status as last sent to the UI.
///
/// Frames only resend it when it changed, so one-off messages such as
/// "Measuring" or a capture notice stay visible until the view has
/// something new to say.
#[derive(Default)]
struct StatusLine {
    shown: Option<String>,
}

impl StatusLine {
    fn sync<W: MapWidget>(&mut self, view: &PolarView<W>, link: &WorkerLink) {
        let current = view.status();
        if current != self.shown.as_deref() {
            link.status(current.unwrap_or_default());
            self.shown = current.map(str::to_owned);
        }
    }
}

/// Start the worker thread.
pub fn spawn(cfg: Polar360Config, mode: Mode, link: WorkerLink) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("polar360-worker".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("cannot start runtime: {e}");
                    link.status(format!("Internal error: {e}"));
                    return;
                }
            };
            rt.block_on(run(cfg, mode, link));
        })
}

async fn run(cfg: Polar360Config, mode: Mode, link: WorkerLink) {
    let timeout = cfg.http_timeout();
    let (client, tile_client) = match (
        BackendClient::new(&cfg.backend_url, timeout),
        tiles::http_client(timeout),
    ) {
        (Ok(c), Ok(t)) => (c, t),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("HTTP setup failed: {e}");
            link.status(format!("HTTP setup failed: {e}"));
            return;
        }
    };
    let tile_url = cfg.tile_url.clone();
    let map = MapAdapter::new(move || {
        TileMap::with_client(tile_client.clone(), tile_url.clone()).with_fetch_budget(timeout)
    })
    .with_zoom(cfg.map_zoom);

    match mode {
        Mode::Live { autostart } => {
            let view = PolarView::new(map, LayoutMode::Stacked);
            let session = LiveSession::with_cadence(client.clone(), view, cfg.poll_interval());
            run_live(session, link, &cfg, autostart).await;
        }
        Mode::Record(source) => {
            let view = PolarView::new(map, LayoutMode::Overlay);
            let viewer = match source {
                RecordSource::Backend(name) => StaticViewer::open(view, &client, &name).await,
                RecordSource::File(path) => StaticViewer::open_path(view, &path),
            };
            run_static(viewer.into_view(), link, &cfg).await;
        }
    }
    tracing::debug!("worker finished");
}

async fn run_live<F: LiveFeed, W: MapWidget>(
    mut session: LiveSession<F, W>,
    mut link: WorkerLink,
    cfg: &Polar360Config,
    autostart: Option<f64>,
) {
    let mut status = StatusLine::default();
    publish_frame(session.view(), &link, &mut status);
    link.publish(ViewUpdate::Session(SessionState::Idle));
    if let Some(period) = autostart {
        start(&mut session, period, &link).await;
    }

    loop {
        // Only the waits race; a started fetch always completes.
        let event = tokio::select! {
            cmd = link.commands.recv() => Event::Command(cmd),
            () = session.wait_tick() => Event::Tick,
        };
        match event {
            Event::Tick => match session.tick().await {
                TickOutcome::Updated { marker, .. } => {
                    publish_frame(session.view(), &link, &mut status);
                    if matches!(marker, MarkerUpdate::Created | MarkerUpdate::Moved) {
                        publish_map(session.view_mut(), &link).await;
                    }
                }
                TickOutcome::Failed(_) => status.sync(session.view(), &link),
            },
            Event::Command(None) | Event::Command(Some(ViewCommand::Shutdown)) => break,
            Event::Command(Some(ViewCommand::Start { period })) => {
                start(&mut session, period, &link).await;
            }
            Event::Command(Some(ViewCommand::Stop)) => {
                let result = session.stop_remote().await;
                link.publish(ViewUpdate::Session(session.state()));
                match result {
                    Ok(()) => link.status("Stopped"),
                    Err(e) => link.status(format!("Stop failed: {e}")),
                }
            }
            Event::Command(Some(ViewCommand::Save)) => match session.feed().save().await {
                Ok(file) => {
                    tracing::info!(%file, "measurement saved");
                    session.view_mut().set_record(Some(file.clone()));
                    link.publish(ViewUpdate::Saved(file));
                }
                Err(e) => {
                    tracing::warn!("save failed: {e}");
                    link.status(format!("Save failed: {e}"));
                }
            },
            Event::Command(Some(cmd)) => {
                let flow =
                    handle_view_command(session.view_mut(), cmd, &link, &mut status, cfg).await;
                if let Flow::Exit = flow {
                    break;
                }
            }
        }
    }

    session.stop();
    session.view_mut().teardown();
}

async fn start<F: LiveFeed, W: MapWidget>(
    session: &mut LiveSession<F, W>,
    period: f64,
    link: &WorkerLink,
) {
    match session.start(period).await {
        Ok(()) => link.status("Measuring"),
        Err(e) => link.status(format!("Start failed: {e}")),
    }
    link.publish(ViewUpdate::Session(session.state()));
}

async fn run_static<W: MapWidget>(mut view: PolarView<W>, mut link: WorkerLink, cfg: &Polar360Config) {
    let mut status = StatusLine::default();
    publish_frame(&view, &link, &mut status);
    publish_map(&mut view, &link).await;
    while let Some(cmd) = link.commands.recv().await {
        if let Flow::Exit = handle_view_command(&mut view, cmd, &link, &mut status, cfg).await {
            break;
        }
    }
    view.teardown();
}

/// Commands both modes understand.
async fn handle_view_command<W: MapWidget>(
    view: &mut PolarView<W>,
    cmd: ViewCommand,
    link: &WorkerLink,
    status: &mut StatusLine,
    cfg: &Polar360Config,
) -> Flow {
    match cmd {
        ViewCommand::Shutdown => return Flow::Exit,
        ViewCommand::Resize { size, dpr } => {
            if view.resize(size, dpr) {
                publish_frame(view, link, status);
                publish_map(view, link).await;
            }
        }
        ViewCommand::Pan { dx, dy } => {
            view.pan(dx, dy);
            publish_map(view, link).await;
        }
        ViewCommand::Zoom(delta) => {
            view.zoom_by(delta);
            publish_map(view, link).await;
        }
        ViewCommand::Capture { path } => {
            let image = view.capture().await;
            let path = path.unwrap_or_else(|| cfg.capture_dir.join(view.capture_file_name()));
            match save_png(&image, &path) {
                Ok(()) => link.publish(ViewUpdate::Captured(path)),
                Err(e) => {
                    tracing::warn!("capture failed: {e}");
                    link.status(format!("Capture failed: {e}"));
                }
            }
        }
        ViewCommand::Start { .. } | ViewCommand::Stop | ViewCommand::Save => {
            link.status("Not available for saved records");
        }
    }
    Flow::Continue
}

fn publish_frame<W: MapWidget>(view: &PolarView<W>, link: &WorkerLink, status: &mut StatusLine) {
    link.publish(ViewUpdate::Frame(view.frame()));
    status.sync(view, link);
}

async fn publish_map<W: MapWidget>(view: &mut PolarView<W>, link: &WorkerLink) {
    if let Some(img) = view.map_snapshot().await {
        link.publish(ViewUpdate::Map(Arc::new(img)));
    }
}
