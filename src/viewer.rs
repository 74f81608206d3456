//! Static view of a saved record: parse once, render once, no polling.

use std::path::Path;

use crate::backend::BackendClient;
use crate::data::record::{parse_record, ParsedRecord};
use crate::map::{MapWidget, MarkerUpdate};
use crate::view::PolarView;

pub struct StaticViewer<W: MapWidget> {
    view: PolarView<W>,
    equipo: Option<String>,
    count: usize,
}

impl<W: MapWidget> StaticViewer<W> {
    /// Show `text` as record `name`.
    pub fn from_text(view: PolarView<W>, name: Option<&str>, text: &str) -> Self {
        Self::show(view, name, parse_record(text))
    }

    /// Download record `name` from the backend. A failed download shows an
    /// empty diagram with a status message.
    pub async fn open(view: PolarView<W>, client: &BackendClient, name: &str) -> Self {
        match client.fetch_record(name).await {
            Ok(text) => Self::from_text(view, Some(name), &text),
            Err(e) => Self::unreadable(view, name, &e),
        }
    }

    /// Read a record from the local filesystem.
    pub fn open_path(view: PolarView<W>, path: &Path) -> Self {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_text(view, name.as_deref(), &text),
            Err(e) => Self::unreadable(view, &path.display().to_string(), &e),
        }
    }

    fn unreadable(view: PolarView<W>, name: &str, err: &dyn std::fmt::Display) -> Self {
        tracing::warn!("cannot read record {name}: {err}");
        let mut viewer = Self::show(view, Some(name), ParsedRecord::default());
        viewer
            .view
            .set_status(format!("Could not load {name}: {err}"));
        viewer
    }

    fn show(mut view: PolarView<W>, name: Option<&str>, record: ParsedRecord) -> Self {
        let count = record.set.len();
        tracing::info!(
            record = name.unwrap_or("-"),
            equipo = record.equipo_label(),
            count,
            "showing record"
        );
        view.set_record(name.map(str::to_owned));
        view.set_equipo(record.equipo.clone());
        let marker = view.replace_samples(record.set);
        if marker == MarkerUpdate::Ignored {
            tracing::debug!("record has no usable position");
        }
        Self {
            view,
            equipo: record.equipo,
            count,
        }
    }

    pub fn equipo(&self) -> Option<&str> {
        self.equipo.as_deref()
    }

    /// Samples accepted from the record.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn view(&self) -> &PolarView<W> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut PolarView<W> {
        &mut self.view
    }

    pub fn into_view(self) -> PolarView<W> {
        self.view
    }
}
