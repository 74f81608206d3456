//! Per-frame lookup from a pointer position to the marker under it.

use super::sample::Sample;

/// Pointer tolerance around an arrow tip, in logical pixels.
pub const DEFAULT_HIT_RADIUS: f64 = 10.0;

/// One rendered marker: its tip position and the sample it shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitEntry {
    pub x: f64,
    pub y: f64,
    pub sample: Sample,
    pub hit_radius: f64,
}

impl HitEntry {
    /// Tooltip text shown when hovering the marker.
    pub fn tooltip(&self) -> String {
        if self.sample.power.is_finite() {
            format!("{:.1}° · {:.1} dBm", self.sample.azimuth, self.sample.power)
        } else {
            format!("{:.1}° · —", self.sample.azimuth)
        }
    }
}

/// Markers of exactly one frame, in drawing order.
///
/// An index is built once by the renderer and never edited; the next frame
/// produces a new index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitIndex {
    entries: Vec<HitEntry>,
}

impl HitIndex {
    pub fn new(entries: Vec<HitEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HitEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest entry strictly inside its hit radius; the earliest one wins ties.
    pub fn nearest(&self, pointer_x: f64, pointer_y: f64) -> Option<&HitEntry> {
        let mut best: Option<(&HitEntry, f64)> = None;
        for e in &self.entries {
            let d = (e.x - pointer_x).hypot(e.y - pointer_y);
            if d.is_nan() || d >= e.hit_radius {
                continue;
            }
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((e, d)),
            }
        }
        best.map(|(e, _)| e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(x: f64, y: f64, az: f64) -> HitEntry {
        HitEntry {
            x,
            y,
            sample: Sample::new(az, -50.0),
            hit_radius: DEFAULT_HIT_RADIUS,
        }
    }

    #[test]
    fn empty_index_never_hits() {
        let idx = HitIndex::default();
        assert!(idx.nearest(0.0, 0.0).is_none());
        assert!(idx.nearest(f64::NAN, 3.0).is_none());
    }

    #[test]
    fn picks_closest_within_radius() {
        let idx = HitIndex::new(vec![entry(0.0, 0.0, 1.0), entry(6.0, 0.0, 2.0)]);
        assert_eq!(idx.nearest(4.0, 0.0).unwrap().sample.azimuth, 2.0);
        assert_eq!(idx.nearest(1.0, 0.0).unwrap().sample.azimuth, 1.0);
    }

    #[test]
    fn radius_is_exclusive() {
        let idx = HitIndex::new(vec![entry(0.0, 0.0, 1.0)]);
        assert!(idx.nearest(10.0, 0.0).is_none());
        assert!(idx.nearest(9.99, 0.0).is_some());
    }

    #[test]
    fn ties_resolve_to_first_inserted() {
        let idx = HitIndex::new(vec![entry(-3.0, 0.0, 10.0), entry(3.0, 0.0, 20.0)]);
        assert_eq!(idx.nearest(0.0, 0.0).unwrap().sample.azimuth, 10.0);
        let idx = HitIndex::new(vec![entry(3.0, 0.0, 20.0), entry(-3.0, 0.0, 10.0)]);
        assert_eq!(idx.nearest(0.0, 0.0).unwrap().sample.azimuth, 20.0);
    }

    #[test]
    fn tooltip_formats_power() {
        assert_eq!(entry(0.0, 0.0, 10.0).tooltip(), "10.0° · -50.0 dBm");
        let mut e = entry(0.0, 0.0, 10.0);
        e.sample.power = f64::NAN;
        assert_eq!(e.tooltip(), "10.0° · —");
    }
}
