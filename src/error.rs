//! Error type shared by the crate.

use thiserror::Error;

/// Result alias used throughout polar360.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong outside of pure rendering.
///
/// None of these are fatal: fetch failures keep the previous frame,
/// map failures fall back to a map-less capture.
#[derive(Error, Debug)]
pub enum Error {
    /// Network or decoding failure talking to the backend or tile server.
    #[error("{what} failed: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered `ok: false`.
    #[error("backend error: {0}")]
    Backend(String),

    /// A map snapshot could not be produced.
    #[error("map rasterization unavailable: {0}")]
    RasterizationUnavailable(String),

    /// The operator cancelled or asked for something invalid.
    #[error("{0}")]
    UserIntent(String),

    #[error("image error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn fetch(what: &'static str) -> impl FnOnce(reqwest::Error) -> Error {
        move |source| Error::Fetch { what, source }
    }

    /// Whether the error is a recoverable fetch problem (transient by nature).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Backend(_) | Error::Json(_))
    }
}
