//! Runtime configuration.
//!
//! Settings live in an optional YAML file and can be overridden from the
//! environment. Every field has a default, so an empty or missing file is a
//! valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::map::tiles::{MAX_ZOOM, MIN_ZOOM};

pub const ENV_BACKEND: &str = "POLAR360_BACKEND";
pub const ENV_TILE_URL: &str = "POLAR360_TILE_URL";
pub const ENV_ZOOM: &str = "POLAR360_ZOOM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Polar360Config {
    /// Base URL of the acquisition backend.
    pub backend_url: String,
    /// Live polling cadence. Independent of the sampling period.
    pub poll_interval_ms: u64,
    /// Sampling period requested when a live session starts.
    pub sample_period_s: f64,
    /// Tile URL template with `{z}`, `{x}`, `{y}` and optionally `{s}`.
    pub tile_url: String,
    pub map_zoom: u8,
    /// Initial window size, logical px.
    pub window_size: [f32; 2],
    /// Where captures are written when no path is chosen.
    pub capture_dir: PathBuf,
    pub http_timeout_ms: u64,
}

impl Default for Polar360Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".into(),
            poll_interval_ms: 1000,
            sample_period_s: 1.0,
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            map_zoom: crate::map::DEFAULT_ZOOM,
            window_size: [1100.0, 820.0],
            capture_dir: PathBuf::from("capturas"),
            http_timeout_ms: 5000,
        }
    }
}

impl Polar360Config {
    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("invalid YAML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(format!("serialization: {e}")))
    }

    /// Default config location, `$HOME/.polar360/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".polar360").join("config.yaml"))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; used by [`Self::apply_env`].
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_BACKEND) {
            self.backend_url = url;
        }
        if let Some(url) = lookup(ENV_TILE_URL) {
            self.tile_url = url;
        }
        if let Some(z) = lookup(ENV_ZOOM) {
            self.map_zoom = z
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_ZOOM}={z:?} is not a zoom level")))?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "backend_url must be an http(s) URL, got {:?}",
                self.backend_url
            )));
        }
        for key in ["{z}", "{x}", "{y}"] {
            if !self.tile_url.contains(key) {
                return Err(Error::Config(format!("tile_url lacks {key}")));
            }
        }
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.map_zoom) {
            return Err(Error::Config(format!(
                "map_zoom {} outside {MIN_ZOOM}..={MAX_ZOOM}",
                self.map_zoom
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}
