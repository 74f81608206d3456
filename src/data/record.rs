//! Parsing of persisted 360° measurement records.
//!
//! Record layout, one item per line:
//!
//! ```text
//! <equipment label>
//! <lat>,<lon>
//! <azimuth>,<power>
//! <azimuth>,<power>
//! ...
//! ```
//!
//! Numbers are picked out of each line with a token scan, so separators and
//! surrounding text do not matter. Lines without two usable numbers are
//! skipped.

use once_cell::sync::Lazy;
use regex::Regex;

use super::sample::{Anchor, Sample, SampleSet};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?\d+(?:\.\d+)?").unwrap_or_else(|e| panic!("invalid number pattern: {e}"))
});

/// First two numeric tokens of `line`, if both parse to finite values.
pub fn first_two_numbers(line: &str) -> Option<(f64, f64)> {
    let mut it = NUMBER
        .find_iter(line)
        .map(|m| m.as_str().parse::<f64>().ok());
    let a = it.next()??;
    let b = it.next()??;
    (a.is_finite() && b.is_finite()).then_some((a, b))
}

/// Result of parsing one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecord {
    /// Equipment label from the first line, `None` when blank.
    pub equipo: Option<String>,
    pub set: SampleSet,
}

impl ParsedRecord {
    /// Label for display, with a dash for unknown equipment.
    pub fn equipo_label(&self) -> &str {
        self.equipo.as_deref().unwrap_or("—")
    }
}

/// Parse a record. Never fails: unusable input yields an empty set.
pub fn parse_record(text: &str) -> ParsedRecord {
    let mut lines = text.lines();
    let equipo = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned);
    let anchor = lines
        .next()
        .and_then(first_two_numbers)
        .and_then(|(lat, lon)| Anchor::from_parts(Some(lat), Some(lon)));
    let samples = lines
        .filter(|l| !l.trim().is_empty())
        .filter_map(first_two_numbers)
        .filter_map(|(az, pwr)| Sample::checked(az, pwr))
        .collect();
    ParsedRecord {
        equipo,
        set: SampleSet::new(samples, anchor),
    }
}
