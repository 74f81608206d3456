//! HTTP client for the acquisition backend.
//!
//! The backend runs the measurement process and serves its data; this module
//! only consumes the fixed JSON/text shapes it exposes:
//!
//! | Method | Path                   | Reply |
//! | ------ | ---------------------- | ----- |
//! | GET    | `/api/med360/live`     | `{ok, lat, long, n, points: [{deg, pwr}]}` |
//! | POST   | `/api/med360/start`    | `{ok, error?}` (body `{period}`) |
//! | POST   | `/api/med360/stop`     | `{ok, error?}` |
//! | POST   | `/api/med360/save`     | `{ok, error?, file?}` |
//! | GET    | `/api/med360/list`     | `{ok, items: [{name, url, size, mtime, equipo}]}` |
//! | POST   | `/api/med360/delete`   | `{ok, error?}` (body `{name}`) |
//! | GET    | `/guardado360/<name>`  | record text |

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::data::sample::{Anchor, Sample, SampleSet};
use crate::error::{Error, Result};

/// Live feed reply.
#[derive(Debug, Clone, Deserialize)]
pub struct LivePayload {
    pub ok: bool,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub long: Option<f64>,
    #[serde(default)]
    pub n: Option<usize>,
    #[serde(default)]
    pub points: Vec<LivePoint>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LivePoint {
    #[serde(default)]
    pub deg: Option<f64>,
    #[serde(default)]
    pub pwr: Option<f64>,
}

impl LivePayload {
    /// Normalized sample set; points missing a value are dropped.
    pub fn into_sample_set(self) -> Result<SampleSet> {
        if !self.ok {
            return Err(Error::Backend(
                self.error.unwrap_or_else(|| "live feed refused".into()),
            ));
        }
        let samples: Vec<Sample> = self
            .points
            .into_iter()
            .filter_map(|p| Sample::checked(p.deg?, p.pwr?))
            .collect();
        if let Some(n) = self.n.filter(|&n| n != samples.len()) {
            tracing::debug!(reported = n, kept = samples.len(), "dropped malformed live points");
        }
        Ok(SampleSet::new(samples, Anchor::from_parts(self.lat, self.long)))
    }
}

/// Generic `{ok, error?, file?}` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

impl Reply {
    fn into_result(self, what: &str) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(Error::Backend(
                self.error.unwrap_or_else(|| format!("{what} refused")),
            ))
        }
    }
}

/// One saved 360° record as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInfo {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    #[serde(default)]
    pub mtime: f64,
    #[serde(default)]
    pub equipo: String,
}

impl RecordInfo {
    /// Local modification time formatted for listings.
    pub fn modified(&self) -> String {
        let secs = self.mtime.trunc() as i64;
        chrono::DateTime::from_timestamp(secs, 0)
            .map(|t| {
                t.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "—".into())
    }
}

#[derive(Debug, Deserialize)]
struct ListReply {
    ok: bool,
    #[serde(default)]
    items: Vec<RecordInfo>,
    #[serde(default)]
    error: Option<String>,
}

/// Reject record names the backend would refuse, before any request.
pub fn validate_record_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.starts_with('.')
        || !name.to_ascii_lowercase().ends_with(".txt");
    if bad {
        Err(Error::UserIntent(format!("invalid record name: {name:?}")))
    } else {
        Ok(())
    }
}

/// Sampling period actually requested from the backend.
pub fn effective_period(period_s: f64) -> f64 {
    if period_s.is_finite() && period_s > 0.0 {
        period_s
    } else {
        1.0
    }
}

/// Async client for one backend instance.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::fetch("backend client setup"))?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        what: &'static str,
    ) -> Result<T> {
        let resp = req.send().await.map_err(Error::fetch(what))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(Error::fetch(what))?;
        match serde_json::from_slice::<T>(&body) {
            Ok(v) => Ok(v),
            Err(_) if !status.is_success() => Err(Error::Backend(format!("{what}: HTTP {status}"))),
            Err(e) => Err(Error::Json(e)),
        }
    }

    /// Latest live sample set.
    pub async fn live(&self) -> Result<SampleSet> {
        let payload: LivePayload = self
            .json(self.http.get(self.url("api/med360/live")), "live poll")
            .await?;
        payload.into_sample_set()
    }

    /// Start the measurement process with the given sampling period.
    pub async fn start(&self, period_s: f64) -> Result<()> {
        let body = serde_json::json!({ "period": effective_period(period_s) });
        let reply: Reply = self
            .json(
                self.http.post(self.url("api/med360/start")).json(&body),
                "start measurement",
            )
            .await?;
        reply.into_result("start").map(drop)
    }

    pub async fn stop(&self) -> Result<()> {
        let reply: Reply = self
            .json(self.http.post(self.url("api/med360/stop")), "stop measurement")
            .await?;
        reply.into_result("stop").map(drop)
    }

    /// Persist the running measurement; returns the saved file identifier.
    pub async fn save(&self) -> Result<String> {
        let reply: Reply = self
            .json(self.http.post(self.url("api/med360/save")), "save measurement")
            .await?;
        let reply = reply.into_result("save")?;
        reply
            .file
            .ok_or_else(|| Error::Backend("save reply without file".into()))
    }

    /// Saved records, newest first.
    pub async fn list(&self) -> Result<Vec<RecordInfo>> {
        let reply: ListReply = self
            .json(self.http.get(self.url("api/med360/list")), "list records")
            .await?;
        if !reply.ok {
            return Err(Error::Backend(
                reply.error.unwrap_or_else(|| "listing refused".into()),
            ));
        }
        let mut items = reply.items;
        items.sort_by(|a, b| b.mtime.total_cmp(&a.mtime));
        Ok(items)
    }

    /// Delete a saved record. Nothing is sent unless `confirmed` is true and
    /// the name is acceptable.
    pub async fn delete(&self, name: &str, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(Error::UserIntent(format!("deletion of {name} cancelled")));
        }
        validate_record_name(name)?;
        let body = serde_json::json!({ "name": name });
        let reply: Reply = self
            .json(
                self.http.post(self.url("api/med360/delete")).json(&body),
                "delete record",
            )
            .await?;
        reply.into_result("delete").map(drop)
    }

    /// Raw text of a saved record, by name or by the `url` from a listing.
    pub async fn fetch_record(&self, name_or_path: &str) -> Result<String> {
        let path = if name_or_path.starts_with('/') {
            name_or_path.to_owned()
        } else {
            format!("guardado360/{name_or_path}")
        };
        self.http
            .get(self.url(&path))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Error::fetch("record download"))?
            .text()
            .await
            .map_err(Error::fetch("record download"))
    }
}
