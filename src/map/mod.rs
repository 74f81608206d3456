//! Map layer under the polar diagram.
//!
//! The map itself is an external widget behind the [`MapWidget`] trait; the
//! crate ships [`tiles::TileMap`] as the default one. [`MapAdapter`] is the
//! only owner of the widget: it creates it lazily, keeps the single position
//! marker up to date and asks it for offscreen snapshots.

pub mod tiles;

use image::RgbaImage;

use crate::data::sample::Anchor;
use crate::error::{Error, Result};

/// Default zoom level used when the map is first centered.
pub const DEFAULT_ZOOM: u8 = 17;

/// Interface of an interactive map widget.
#[allow(async_fn_in_trait)]
pub trait MapWidget {
    /// Center the view on `center` at `zoom`.
    fn set_view(&mut self, center: Anchor, zoom: u8);
    /// Place the position marker, moving it if it already exists.
    fn set_marker(&mut self, at: Anchor);
    /// Tell the widget the size of its container, in device pixels.
    fn resize(&mut self, width: u32, height: u32);
    /// Device pixels per logical pixel. Map content keeps its logical size
    /// on high-density surfaces.
    fn set_scale(&mut self, _scale: f32) {}
    /// Shift the view by a pixel offset.
    fn pan(&mut self, _dx: f64, _dy: f64) {}
    /// Change the zoom level by `delta` steps.
    fn zoom_by(&mut self, _delta: i32) {}
    /// Render the current view into an offscreen bitmap.
    async fn rasterize(&mut self) -> Result<RgbaImage>;
}

/// Widget for views without a map, such as headless renders. It can never
/// be rasterized, so captures always take the map-less layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMap;

impl MapWidget for NoMap {
    fn set_view(&mut self, _center: Anchor, _zoom: u8) {}
    fn set_marker(&mut self, _at: Anchor) {}
    fn resize(&mut self, _width: u32, _height: u32) {}
    async fn rasterize(&mut self) -> Result<RgbaImage> {
        Err(Error::RasterizationUnavailable("no map in this view".into()))
    }
}

/// What [`MapAdapter::ensure`] did with an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerUpdate {
    /// No valid anchor; nothing touched.
    Ignored,
    /// Marker placed for the first time and the view centered on it.
    Created,
    /// Existing marker moved; the view was left alone.
    Moved,
    /// Marker already at this position.
    Unchanged,
}

/// Owns the map widget of one view.
pub struct MapAdapter<W: MapWidget> {
    factory: Box<dyn FnMut() -> W>,
    widget: Option<W>,
    marker: Option<Anchor>,
    viewport: (u32, u32),
    scale: f32,
    zoom: u8,
}

impl<W: MapWidget> MapAdapter<W> {
    /// Adapter that builds its widget with `factory` on the first valid anchor.
    pub fn new(factory: impl FnMut() -> W + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            widget: None,
            marker: None,
            viewport: (1, 1),
            scale: 1.0,
            zoom: DEFAULT_ZOOM,
        }
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn is_created(&self) -> bool {
        self.widget.is_some()
    }

    pub fn marker(&self) -> Option<Anchor> {
        self.marker
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn widget(&self) -> Option<&W> {
        self.widget.as_ref()
    }

    /// Create the widget and marker on the first valid anchor, move the marker afterwards.
    ///
    /// The view is only centered when the marker is created so later updates
    /// keep whatever pan/zoom the operator chose.
    pub fn ensure(&mut self, anchor: Option<Anchor>) -> MarkerUpdate {
        let Some(pos) = anchor.filter(Anchor::is_valid) else {
            return MarkerUpdate::Ignored;
        };
        let (viewport, scale) = (self.viewport, self.scale);
        let factory = &mut self.factory;
        let widget = self.widget.get_or_insert_with(|| {
            tracing::debug!("creating map widget");
            let mut w = factory();
            w.set_scale(scale);
            w.resize(viewport.0, viewport.1);
            w
        });
        match self.marker {
            None => {
                widget.set_marker(pos);
                widget.set_view(pos, self.zoom);
                self.marker = Some(pos);
                MarkerUpdate::Created
            }
            Some(prev) if prev == pos => MarkerUpdate::Unchanged,
            Some(_) => {
                widget.set_marker(pos);
                self.marker = Some(pos);
                MarkerUpdate::Moved
            }
        }
    }

    /// Propagate a container resize. Returns `false` if the size did not change.
    pub fn invalidate_size(&mut self, width: u32, height: u32) -> bool {
        let size = (width.max(1), height.max(1));
        if size == self.viewport {
            return false;
        }
        self.viewport = size;
        if let Some(w) = self.widget.as_mut() {
            w.resize(size.0, size.1);
        }
        true
    }

    /// Propagate a device pixel ratio change. Returns `false` if it did not change.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        if scale == self.scale {
            return false;
        }
        self.scale = scale;
        if let Some(w) = self.widget.as_mut() {
            w.set_scale(scale);
        }
        true
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        if let Some(w) = self.widget.as_mut() {
            w.pan(dx, dy);
        }
    }

    pub fn zoom_by(&mut self, delta: i32) {
        if let Some(w) = self.widget.as_mut() {
            w.zoom_by(delta);
        }
    }

    /// Snapshot of the current map view, or `None` if there is no map or it
    /// cannot be rasterized.
    pub async fn rasterize(&mut self) -> Option<RgbaImage> {
        let widget = self.widget.as_mut()?;
        match widget.rasterize().await {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::warn!("map snapshot unavailable: {e}");
                None
            }
        }
    }

    /// Drop the widget and marker; the next valid anchor starts over.
    pub fn teardown(&mut self) {
        self.widget = None;
        self.marker = None;
    }
}
