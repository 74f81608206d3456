//! Per-view state.
//!
//! A [`PolarView`] owns everything one on-screen diagram needs: the current
//! sample set, the last rendered frame, the map adapter and the surface
//! geometry. Sessions and viewers drive it; nothing in here is global.

use std::sync::Arc;

use image::RgbaImage;

use crate::compositor::{capture_file_name, Compositor, LayoutMode};
use crate::data::hit_index::HitEntry;
use crate::data::sample::SampleSet;
use crate::map::{MapAdapter, MapWidget, MarkerUpdate};
use crate::polar::{LogicalSize, PolarFrame, PolarRenderer};

/// Surface size used until the first resize arrives.
pub const INITIAL_SIZE: LogicalSize = LogicalSize {
    width: 600.0,
    height: 600.0,
};

pub struct PolarView<W: MapWidget> {
    renderer: PolarRenderer,
    compositor: Compositor,
    map: MapAdapter<W>,
    layout: LayoutMode,
    samples: Arc<SampleSet>,
    frame: Arc<PolarFrame>,
    size: LogicalSize,
    dpr: f32,
    status: Option<String>,
    record: Option<String>,
    equipo: Option<String>,
}

impl<W: MapWidget> PolarView<W> {
    pub fn new(map: MapAdapter<W>, layout: LayoutMode) -> Self {
        Self::with_renderer(PolarRenderer::default(), map, layout)
    }

    pub fn with_renderer(renderer: PolarRenderer, map: MapAdapter<W>, layout: LayoutMode) -> Self {
        let samples = Arc::new(SampleSet::empty());
        let frame = Arc::new(renderer.render(&samples, INITIAL_SIZE, 1.0));
        let mut view = Self {
            renderer,
            compositor: Compositor::new(),
            map,
            layout,
            samples,
            frame,
            size: INITIAL_SIZE,
            dpr: 1.0,
            status: None,
            record: None,
            equipo: None,
        };
        view.sync_map_size();
        view
    }

    /// Swap in a new sample set, redraw, then update the map marker.
    ///
    /// The previous set stays current until this call, so a frame is never
    /// drawn from a partially built set.
    pub fn replace_samples(&mut self, set: SampleSet) -> MarkerUpdate {
        self.samples = Arc::new(set);
        self.redraw();
        self.map.ensure(self.samples.anchor())
    }

    /// Render the current set at the current geometry.
    pub fn redraw(&mut self) {
        let frame = self.renderer.render(&self.samples, self.size, self.dpr);
        self.frame = Arc::new(frame);
    }

    /// Adopt a new surface geometry. Returns `false` (and does nothing) when
    /// it is unchanged.
    pub fn resize(&mut self, size: LogicalSize, dpr: f32) -> bool {
        if size == self.size && dpr == self.dpr {
            return false;
        }
        self.size = size;
        self.dpr = dpr;
        self.redraw();
        self.sync_map_size();
        true
    }

    fn sync_map_size(&mut self) {
        let hidpi = self.frame.hidpi;
        self.map.set_scale(hidpi.scale);
        self.map
            .invalidate_size(hidpi.buffer_width, hidpi.buffer_height);
    }

    /// Marker under the pointer, logical coordinates.
    pub fn nearest(&self, x: f64, y: f64) -> Option<HitEntry> {
        self.frame.nearest(x, y).copied()
    }

    pub fn frame(&self) -> Arc<PolarFrame> {
        Arc::clone(&self.frame)
    }

    pub fn samples(&self) -> Arc<SampleSet> {
        Arc::clone(&self.samples)
    }

    pub fn size(&self) -> (LogicalSize, f32) {
        (self.size, self.dpr)
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Identifier of the record shown, used to name captures.
    pub fn record(&self) -> Option<&str> {
        self.record.as_deref()
    }

    pub fn set_record(&mut self, record: Option<String>) {
        self.record = record;
    }

    pub fn equipo(&self) -> Option<&str> {
        self.equipo.as_deref()
    }

    pub fn set_equipo(&mut self, equipo: Option<String>) {
        self.equipo = equipo;
    }

    pub fn map(&self) -> &MapAdapter<W> {
        &self.map
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.map.pan(dx, dy);
    }

    pub fn zoom_by(&mut self, delta: i32) {
        self.map.zoom_by(delta);
    }

    /// Current map view for display, if there is one.
    pub async fn map_snapshot(&mut self) -> Option<RgbaImage> {
        self.map.rasterize().await
    }

    /// Flatten the map and the current frame into one image.
    ///
    /// A missing or failing map yields the map-less fallback layout.
    pub async fn capture(&mut self) -> RgbaImage {
        let map = self.map.rasterize().await;
        self.compositor
            .compose(map.as_ref(), &self.frame.pixmap, self.layout, self.dpr)
    }

    /// File name a capture of this view is saved under.
    pub fn capture_file_name(&self) -> String {
        capture_file_name(self.record.as_deref())
    }

    pub fn teardown(&mut self) {
        self.map.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{Anchor, Sample};
    use crate::map::NoMap;

    fn view(layout: LayoutMode) -> PolarView<NoMap> {
        PolarView::new(MapAdapter::new(|| NoMap), layout)
    }

    #[test]
    fn replacing_samples_redraws_and_places_marker() {
        let mut v = view(LayoutMode::Overlay);
        let before = v.frame();
        let set = SampleSet::new(
            vec![Sample::new(0.0, -40.0)],
            Some(Anchor { lat: 40.0, lon: -3.0 }),
        );
        assert_eq!(v.replace_samples(set), MarkerUpdate::Created);
        assert!(!Arc::ptr_eq(&before, &v.frame()));
        assert_eq!(v.frame().drawn, 1);
        assert!(v.map().is_created());
    }

    #[test]
    fn resize_is_idempotent() {
        let mut v = view(LayoutMode::Overlay);
        let frame = v.frame();
        assert!(!v.resize(INITIAL_SIZE, 1.0));
        assert!(Arc::ptr_eq(&frame, &v.frame()));

        assert!(v.resize(LogicalSize::new(300.0, 200.0), 2.0));
        assert_eq!(v.map().viewport(), (600, 400));
        assert_eq!(v.map().scale(), 2.0);
        assert_eq!(v.frame().pixmap.width(), 600);
        assert!(!v.resize(LogicalSize::new(300.0, 200.0), 2.0));
    }

    #[tokio::test]
    async fn capture_without_map_uses_fallback_size() {
        let mut v = view(LayoutMode::Stacked);
        v.resize(LogicalSize::new(120.0, 80.0), 1.0);
        let img = v.capture().await;
        assert_eq!(img.dimensions(), (120, 80));
    }

    #[test]
    fn capture_name_follows_record() {
        let mut v = view(LayoutMode::Overlay);
        v.set_record(Some("save360_1(x).txt".into()));
        assert_eq!(v.capture_file_name(), "save360_1(x)_360.png");
    }
}
