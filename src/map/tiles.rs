//! Slippy-map widget backed by an HTTP tile server.
//!
//! Tiles are 256 px Web-Mercator images addressed by `{z}/{x}/{y}`. Missing
//! tiles of a snapshot are fetched concurrently under one time budget; tiles
//! that failed are skipped until their backoff expires, and tiles that left
//! the view are evicted once the cache is full.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::MapWidget;
use crate::data::sample::Anchor;
use crate::error::{Error, Result};

pub const TILE_SIZE: u32 = 256;
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 19;
/// Latitude limit of the Web-Mercator projection.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Time allowed for all tile requests of one snapshot together.
pub const DEFAULT_FETCH_BUDGET: Duration = Duration::from_secs(5);
/// A failed tile is not requested again before this much time has passed.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(30);
/// Tiles kept in memory, visible ones included.
pub const DEFAULT_CACHE_LIMIT: usize = 256;

const MARKER_RING_RADIUS: f64 = 9.0;
const MARKER_FILL_RADIUS: f64 = 7.0;

const BACKGROUND: Rgba<u8> = Rgba([221, 221, 221, 255]);
const MARKER_FILL: Rgba<u8> = Rgba([220, 38, 38, 255]);
const MARKER_RING: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// World pixel coordinates of `pos` at `zoom`.
pub fn project(pos: Anchor, zoom: u8) -> (f64, f64) {
    let n = f64::from(TILE_SIZE) * 2f64.powi(i32::from(zoom));
    let lat = pos.lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let x = (pos.lon + 180.0) / 360.0 * n;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Inverse of [`project`].
pub fn unproject(x: f64, y: f64, zoom: u8) -> Anchor {
    let n = f64::from(TILE_SIZE) * 2f64.powi(i32::from(zoom));
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    Anchor {
        lat: lat.clamp(-MAX_LAT, MAX_LAT),
        lon: (lon + 180.0).rem_euclid(360.0) - 180.0,
    }
}

/// Fill a `{z}/{x}/{y}` URL template; `{s}` picks a subdomain.
pub fn tile_url(template: &str, id: TileId) -> String {
    const SUBDOMAINS: [&str; 3] = ["a", "b", "c"];
    let s = SUBDOMAINS[((id.x + id.y) % 3) as usize];
    template
        .replace("{z}", &id.z.to_string())
        .replace("{x}", &id.x.to_string())
        .replace("{y}", &id.y.to_string())
        .replace("{s}", s)
}

/// HTTP client for tile requests. Tile servers require an identifying user agent.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("polar360/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(Error::fetch("tile client setup"))
}

/// Download and decode one tile, normalized to `TILE_SIZE`.
async fn fetch_tile(client: reqwest::Client, url: String) -> Result<RgbaImage> {
    tracing::debug!(%url, "fetching tile");
    let bytes = client
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(Error::fetch("tile request"))?
        .bytes()
        .await
        .map_err(Error::fetch("tile download"))?;
    let mut img = image::load_from_memory(&bytes)?.into_rgba8();
    if img.dimensions() != (TILE_SIZE, TILE_SIZE) {
        img = imageops::resize(&img, TILE_SIZE, TILE_SIZE, FilterType::Triangle);
    }
    Ok(img)
}

struct CachedTile {
    image: RgbaImage,
    /// Snapshot counter value when the tile was last drawn.
    used: u64,
}

/// Tile map widget.
pub struct TileMap {
    client: reqwest::Client,
    url_template: String,
    center: Anchor,
    zoom: u8,
    viewport: (u32, u32),
    scale: f32,
    marker: Option<Anchor>,
    cache: HashMap<TileId, CachedTile>,
    failed: HashMap<TileId, Instant>,
    fetch_budget: Duration,
    cache_limit: usize,
    snapshots: u64,
}

impl TileMap {
    /// Widget with its own client; `timeout` bounds each request and the
    /// snapshot as a whole.
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(http_client(timeout)?, url_template).with_fetch_budget(timeout))
    }

    /// Widget sharing an existing HTTP client (see [`http_client`]).
    pub fn with_client(client: reqwest::Client, url_template: impl Into<String>) -> Self {
        Self {
            client,
            url_template: url_template.into(),
            center: Anchor { lat: 0.0, lon: 0.0 },
            zoom: super::DEFAULT_ZOOM,
            viewport: (1, 1),
            scale: 1.0,
            marker: None,
            cache: HashMap::new(),
            failed: HashMap::new(),
            fetch_budget: DEFAULT_FETCH_BUDGET,
            cache_limit: DEFAULT_CACHE_LIMIT,
            snapshots: 0,
        }
    }

    pub fn with_fetch_budget(mut self, budget: Duration) -> Self {
        self.fetch_budget = budget;
        self
    }

    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit.max(1);
        self
    }

    pub fn center(&self) -> Anchor {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn cached_tiles(&self) -> usize {
        self.cache.len()
    }

    /// Side of one tile on the device surface.
    pub fn tile_px(&self) -> u32 {
        ((TILE_SIZE as f32 * self.scale).round() as u32).max(1)
    }

    /// Device pixels per world pixel.
    fn device_per_world(&self) -> f64 {
        f64::from(self.tile_px()) / f64::from(TILE_SIZE)
    }

    /// Tiles covering the viewport, with their device offsets inside it.
    pub fn visible_tiles(&self) -> Vec<(TileId, i64, i64)> {
        let (w, h) = (i64::from(self.viewport.0), i64::from(self.viewport.1));
        let k = self.device_per_world();
        let (cx, cy) = project(self.center, self.zoom);
        let left = (cx * k).round() as i64 - w / 2;
        let top = (cy * k).round() as i64 - h / 2;
        let ts = i64::from(self.tile_px());
        let count = 1i64 << self.zoom;

        let mut out = Vec::new();
        for ty in top.div_euclid(ts)..=(top + h - 1).div_euclid(ts) {
            if !(0..count).contains(&ty) {
                continue;
            }
            for tx in left.div_euclid(ts)..=(left + w - 1).div_euclid(ts) {
                let id = TileId {
                    z: self.zoom,
                    x: tx.rem_euclid(count) as u32,
                    y: ty as u32,
                };
                out.push((id, tx * ts - left, ty * ts - top));
            }
        }
        out
    }

    /// Fetch every visible tile that is neither cached nor backing off.
    ///
    /// Requests run concurrently; whatever has not answered when the budget
    /// runs out is aborted and backs off like a failure. Returns the last
    /// error seen, if any.
    async fn fetch_missing(&mut self, tiles: &[(TileId, i64, i64)]) -> Option<Error> {
        let now = Instant::now();
        self.failed.retain(|_, at| now.duration_since(*at) < RETRY_BACKOFF);

        let mut pending = HashSet::new();
        let mut set = JoinSet::new();
        for (id, _, _) in tiles {
            if self.cache.contains_key(id) || self.failed.contains_key(id) || !pending.insert(*id) {
                continue;
            }
            let (id, client) = (*id, self.client.clone());
            let url = tile_url(&self.url_template, id);
            set.spawn(async move { (id, fetch_tile(client, url).await) });
        }
        if pending.is_empty() {
            return None;
        }

        let mut done = Vec::with_capacity(pending.len());
        let finished = tokio::time::timeout(self.fetch_budget, async {
            while let Some(joined) = set.join_next().await {
                if let Ok(result) = joined {
                    done.push(result);
                }
            }
        })
        .await
        .is_ok();
        set.abort_all();

        let now = Instant::now();
        let mut last_err = None;
        for (id, result) in done {
            pending.remove(&id);
            match result {
                Ok(image) => {
                    self.cache.insert(id, CachedTile { image, used: self.snapshots });
                }
                Err(e) => {
                    tracing::debug!(?id, "tile failed: {e}");
                    self.failed.insert(id, now);
                    last_err = Some(e);
                }
            }
        }
        if !pending.is_empty() {
            if !finished {
                tracing::warn!(
                    pending = pending.len(),
                    budget_ms = self.fetch_budget.as_millis() as u64,
                    "tile fetch ran out of time"
                );
            }
            for id in pending {
                self.failed.insert(id, now);
            }
            last_err.get_or_insert_with(|| {
                Error::RasterizationUnavailable("tile fetch timed out".into())
            });
        }
        last_err
    }

    /// Drop the least recently drawn tiles beyond the cache limit. Tiles of
    /// the current snapshot are never dropped.
    fn evict(&mut self) {
        let excess = self.cache.len().saturating_sub(self.cache_limit);
        if excess == 0 {
            return;
        }
        let mut stale: Vec<(u64, TileId)> = self
            .cache
            .iter()
            .filter(|(_, t)| t.used < self.snapshots)
            .map(|(id, t)| (t.used, *id))
            .collect();
        stale.sort_unstable_by_key(|(used, _)| *used);
        for (_, id) in stale.into_iter().take(excess) {
            self.cache.remove(&id);
        }
    }

    fn paint_marker(&self, out: &mut RgbaImage) {
        let Some(m) = self.marker else { return };
        let k = self.device_per_world();
        let (cx, cy) = project(self.center, self.zoom);
        let (mx, my) = project(m, self.zoom);
        let x = (mx - cx) * k + f64::from(self.viewport.0) / 2.0;
        let y = (my - cy) * k + f64::from(self.viewport.1) / 2.0;
        let scale = f64::from(self.scale);
        paint_disc(out, x, y, MARKER_RING_RADIUS * scale, MARKER_RING);
        paint_disc(out, x, y, MARKER_FILL_RADIUS * scale, MARKER_FILL);
    }
}

impl MapWidget for TileMap {
    fn set_view(&mut self, center: Anchor, zoom: u8) {
        self.center = center;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn set_marker(&mut self, at: Anchor) {
        self.marker = Some(at);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    }

    /// `dx`/`dy` are device pixels.
    fn pan(&mut self, dx: f64, dy: f64) {
        let k = self.device_per_world();
        let (x, y) = project(self.center, self.zoom);
        self.center = unproject(x + dx / k, y + dy / k, self.zoom);
    }

    fn zoom_by(&mut self, delta: i32) {
        let z = (i32::from(self.zoom) + delta).clamp(i32::from(MIN_ZOOM), i32::from(MAX_ZOOM));
        self.zoom = z as u8;
    }

    async fn rasterize(&mut self) -> Result<RgbaImage> {
        let tiles = self.visible_tiles();
        self.snapshots += 1;
        let last_err = self.fetch_missing(&tiles).await;

        let mut out = RgbaImage::from_pixel(self.viewport.0, self.viewport.1, BACKGROUND);
        let ts = self.tile_px();
        let snapshot = self.snapshots;
        let mut missing = 0usize;
        for (id, ox, oy) in &tiles {
            let Some(tile) = self.cache.get_mut(id) else {
                missing += 1;
                continue;
            };
            tile.used = snapshot;
            if ts == TILE_SIZE {
                imageops::replace(&mut out, &tile.image, *ox, *oy);
            } else {
                let scaled = imageops::resize(&tile.image, ts, ts, FilterType::Triangle);
                imageops::replace(&mut out, &scaled, *ox, *oy);
            }
        }
        self.evict();

        if missing > 0 && missing == tiles.len() {
            let reason = last_err.map_or_else(
                || format!("none of {missing} tiles available"),
                |e| e.to_string(),
            );
            return Err(Error::RasterizationUnavailable(reason));
        }
        if missing > 0 {
            tracing::warn!(missing, total = tiles.len(), "map snapshot is missing tiles");
        }
        self.paint_marker(&mut out);
        Ok(out)
    }
}

fn paint_disc(img: &mut RgbaImage, cx: f64, cy: f64, r: f64, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    let x0 = (cx - r).floor().max(0.0) as u32;
    let y0 = (cy - r).floor().max(0.0) as u32;
    let x1 = ((cx + r).ceil().max(0.0) as u32).min(w);
    let y1 = ((cy + r).ceil().max(0.0) as u32).min(h);
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn map(w: u32, h: u32, center: Anchor, zoom: u8) -> TileMap {
        let mut m = TileMap::new("http://tiles.invalid/{z}/{x}/{y}.png", Duration::from_secs(1))
            .unwrap();
        m.resize(w, h);
        m.set_view(center, zoom);
        m
    }

    #[test]
    fn projection_round_trips() {
        let a = Anchor { lat: 40.4168, lon: -3.7038 };
        let (x, y) = project(a, 15);
        let b = unproject(x, y, 15);
        assert!((a.lat - b.lat).abs() < 1e-9 && (a.lon - b.lon).abs() < 1e-9);
    }

    #[test]
    fn origin_is_world_center() {
        let (x, y) = project(Anchor { lat: 0.0, lon: 0.0 }, 1);
        assert!((x - 256.0).abs() < 1e-9 && (y - 256.0).abs() < 1e-9);
    }

    #[test]
    fn url_template_is_filled() {
        let id = TileId { z: 3, x: 4, y: 5 };
        assert_eq!(
            tile_url("https://{s}.tile.example/{z}/{x}/{y}.png", id),
            "https://c.tile.example/3/4/5.png"
        );
    }

    #[test]
    fn visible_tiles_cover_viewport() {
        // centered on a tile corner: 2x2 tiles around it
        let m = map(256, 256, Anchor { lat: 0.0, lon: 0.0 }, 1);
        let tiles = m.visible_tiles();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&(TileId { z: 1, x: 0, y: 0 }, -128, -128)));
        assert!(tiles.contains(&(TileId { z: 1, x: 1, y: 1 }, 128, 128)));
    }

    #[test]
    fn rows_outside_the_world_are_skipped() {
        let m = map(256, 2048, Anchor { lat: 0.0, lon: 0.0 }, 1);
        assert!(m.visible_tiles().iter().all(|(id, _, _)| id.y < 2));
    }

    #[test]
    fn pan_and_zoom_stay_in_bounds() {
        let mut m = map(256, 256, Anchor { lat: 40.0, lon: -3.0 }, 18);
        m.zoom_by(5);
        assert_eq!(m.zoom(), MAX_ZOOM);
        m.zoom_by(-40);
        assert_eq!(m.zoom(), MIN_ZOOM);
        m.pan(0.0, 1e9);
        assert!(m.center().lat >= -MAX_LAT);
    }

    #[tokio::test]
    async fn unreachable_tile_server_is_reported() {
        let mut m = map(64, 64, Anchor { lat: 0.0, lon: 0.0 }, 2);
        assert!(matches!(
            m.rasterize().await,
            Err(Error::RasterizationUnavailable(_))
        ));
    }

    #[test]
    fn scaled_map_keeps_logical_tile_size() {
        // 512 device px at ratio 2 show the same world area as 256 px at 1
        let mut m = map(512, 512, Anchor { lat: 0.0, lon: 0.0 }, 1);
        m.set_scale(2.0);
        assert_eq!(m.tile_px(), 512);
        let tiles = m.visible_tiles();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&(TileId { z: 1, x: 0, y: 0 }, -256, -256)));
        assert!(tiles.contains(&(TileId { z: 1, x: 1, y: 1 }, 256, 256)));
    }

    #[test]
    fn pan_offsets_are_device_pixels() {
        let mut m = map(512, 512, Anchor { lat: 0.0, lon: 0.0 }, 1);
        m.set_scale(2.0);
        m.pan(256.0, 0.0);
        assert!((m.center().lon - 90.0).abs() < 1e-9);
    }

    #[test]
    fn marker_grows_with_scale() {
        let at = Anchor { lat: 10.0, lon: 20.0 };
        let mut m = map(100, 100, at, 5);
        m.set_marker(at);

        let mut img = RgbaImage::from_pixel(100, 100, BACKGROUND);
        m.paint_marker(&mut img);
        assert_eq!(*img.get_pixel(65, 50), BACKGROUND);

        m.set_scale(2.0);
        let mut img = RgbaImage::from_pixel(100, 100, BACKGROUND);
        m.paint_marker(&mut img);
        assert_eq!(*img.get_pixel(65, 50), MARKER_RING);
        assert_eq!(*img.get_pixel(60, 50), MARKER_FILL);
    }

    /// Local tile server on an ephemeral port. With a body every request is
    /// answered with it; without one connections are accepted and left open.
    async fn tile_server(body: Option<Vec<u8>>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut sock, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let Some(body) = body.clone() else {
                    held.push(sock);
                    continue;
                };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = sock.write_all(head.as_bytes()).await;
                    let _ = sock.write_all(&body).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        (format!("http://{addr}/{{z}}/{{x}}/{{y}}.png"), hits)
    }

    /// No per-request timeout and no proxy, so only the fetch budget bounds a request.
    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn stalled_tile_server_does_not_hold_up_snapshots() {
        let (url, _) = tile_server(None).await;
        let mut m = TileMap::with_client(local_client(), url)
            .with_fetch_budget(Duration::from_millis(300));
        m.resize(64, 64);
        m.set_view(Anchor { lat: 0.0, lon: 0.0 }, 2);

        let started = std::time::Instant::now();
        assert!(matches!(m.rasterize().await, Err(Error::RasterizationUnavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());

        // failed tiles back off, so the next snapshot does not wait again
        let started = std::time::Instant::now();
        assert!(m.rasterize().await.is_err());
        assert!(started.elapsed() < Duration::from_millis(300), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn tiles_are_cached_and_stale_ones_evicted() {
        let color = Rgba([10, 120, 200, 255]);
        let mut png = std::io::Cursor::new(Vec::new());
        RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, color)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let (url, hits) = tile_server(Some(png.into_inner())).await;
        let mut m = TileMap::with_client(local_client(), url).with_cache_limit(4);
        m.resize(256, 256);
        m.set_view(Anchor { lat: 0.0, lon: 0.0 }, 3);

        let img = m.rasterize().await.unwrap();
        assert_eq!(*img.get_pixel(128, 128), color);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        m.rasterize().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        // four tiles east: a disjoint set of four, the old ones go
        m.pan(1024.0, 0.0);
        m.rasterize().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 8);
        assert_eq!(m.cached_tiles(), 4);
        assert!(m
            .visible_tiles()
            .iter()
            .all(|(id, _, _)| m.cache.contains_key(id)));
    }

    #[test]
    fn marker_disc_is_clipped() {
        let mut img = RgbaImage::new(10, 10);
        paint_disc(&mut img, 0.0, 0.0, 4.0, MARKER_FILL);
        assert_eq!(*img.get_pixel(0, 0), MARKER_FILL);
        assert_eq!(*img.get_pixel(9, 9), Rgba([0, 0, 0, 0]));
    }
}
