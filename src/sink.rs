//! Messages between the UI thread and the worker that owns the view.
//!
//! Commands flow UI → worker over a tokio channel so the worker can await
//! them next to its tick timer; updates flow back over a std channel that
//! the UI drains once per frame without blocking.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::polar::{LogicalSize, PolarFrame};
use crate::session::SessionState;

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Start the live measurement with this sampling period, seconds.
    Start { period: f64 },
    Stop,
    /// Persist the running measurement on the backend.
    Save,
    /// Polar surface geometry changed.
    Resize { size: LogicalSize, dpr: f32 },
    /// Shift the map by device pixels.
    Pan { dx: f64, dy: f64 },
    Zoom(i32),
    /// Write a composite PNG, to `path` or the capture directory.
    Capture { path: Option<PathBuf> },
    Shutdown,
}

/// Results published by the worker.
pub enum ViewUpdate {
    Frame(Arc<PolarFrame>),
    Map(Arc<RgbaImage>),
    Status(String),
    Session(SessionState),
    /// Backend file identifier of a saved measurement.
    Saved(String),
    Captured(PathBuf),
}

/// Worker end of the link.
pub struct WorkerLink {
    pub commands: UnboundedReceiver<ViewCommand>,
    updates: Sender<ViewUpdate>,
    wake: Box<dyn Fn() + Send>,
}

impl WorkerLink {
    /// Publish an update and wake the UI. A closed UI is ignored; the worker
    /// notices through the command channel.
    pub fn publish(&self, update: ViewUpdate) {
        if self.updates.send(update).is_ok() {
            (self.wake)();
        }
    }

    pub fn status(&self, msg: impl Into<String>) {
        self.publish(ViewUpdate::Status(msg.into()));
    }
}

/// UI end of the link.
pub struct UiLink {
    commands: UnboundedSender<ViewCommand>,
    pub updates: Receiver<ViewUpdate>,
}

impl UiLink {
    /// Queue a command; returns `false` once the worker is gone.
    pub fn send(&self, cmd: ViewCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    /// Pending updates, oldest first.
    pub fn drain(&self) -> Vec<ViewUpdate> {
        self.updates.try_iter().collect()
    }
}

/// Create both ends. `wake` is called after every published update.
pub fn channel(wake: impl Fn() + Send + 'static) -> (UiLink, WorkerLink) {
    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel();
    let (up_tx, up_rx) = std::sync::mpsc::channel();
    (
        UiLink {
            commands: cmd_tx,
            updates: up_rx,
        },
        WorkerLink {
            commands: cmd_rx,
            updates: up_tx,
            wake: Box::new(wake),
        },
    )
}
