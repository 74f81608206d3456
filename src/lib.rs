//! polar360 crate root: re-exports and module wiring.
//!
//! Renders a rotating direction-finding sweep (azimuth + power) as a polar
//! diagram over a map, and flattens both into one exportable PNG.
//!
//! - `data`: samples, geometry, hit index and record parsing
//! - `polar`: the diagram renderer
//! - `map`: map widget interface, adapter and the slippy-tile widget
//! - `compositor`: map + diagram capture
//! - `view`: per-view state
//! - `session` / `viewer`: live polling and static records
//! - `backend`: HTTP client for the acquisition backend
//! - `app`: eframe shell with its worker thread

pub mod app;
pub mod backend;
pub mod compositor;
pub mod config;
pub mod data;
pub mod error;
pub mod labels;
pub mod logging;
pub mod map;
pub mod polar;
pub mod session;
pub mod sink;
pub mod view;
pub mod viewer;

// Public re-exports for a compact external API
pub use backend::{BackendClient, RecordInfo};
pub use compositor::{capture_file_name, save_png, Compositor, LayoutMode};
pub use config::Polar360Config;
pub use data::hit_index::{HitEntry, HitIndex};
pub use data::record::{parse_record, ParsedRecord};
pub use data::sample::{Anchor, Sample, SampleSet};
pub use error::{Error, Result};
pub use map::{MapAdapter, MapWidget, MarkerUpdate, NoMap};
pub use polar::{LogicalSize, PolarFrame, PolarRenderer, PolarStyle};
pub use session::{LiveFeed, LiveSession, SessionState, TickOutcome};
pub use view::PolarView;
pub use viewer::StaticViewer;
