//! Sweep samples and the immutable sample set swapped in on every update.

/// Neutral power range used when a set carries no finite power value.
pub const FALLBACK_POWER_RANGE: PowerRange = PowerRange {
    min: -100.0,
    max: -30.0,
};

/// Reduce an azimuth in degrees into `[0, 360)`.
///
/// Non-finite input is returned unchanged so callers can reject it.
pub fn normalize_azimuth(deg: f64) -> f64 {
    if !deg.is_finite() {
        return deg;
    }
    let r = deg.rem_euclid(360.0);
    // rem_euclid can round tiny negative values up to exactly 360.0
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// One directional reading of the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Bearing in degrees, clockwise from north, always in `[0, 360)` when finite.
    pub azimuth: f64,
    /// Received power in dBm.
    pub power: f64,
}

impl Sample {
    /// Build a sample, normalizing the azimuth.
    pub fn new(azimuth: f64, power: f64) -> Self {
        Self {
            azimuth: normalize_azimuth(azimuth),
            power,
        }
    }

    /// Build a sample only if both values are finite.
    pub fn checked(azimuth: f64, power: f64) -> Option<Self> {
        (azimuth.is_finite() && power.is_finite()).then(|| Self::new(azimuth, power))
    }
}

/// Geographic position of the measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub lat: f64,
    pub lon: f64,
}

impl Anchor {
    /// Anchor from optional coordinates; `None` unless both are present and finite.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some(Self { lat, lon }),
            _ => None,
        }
    }

    /// Whether the coordinates can be placed on a map.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Ordered samples of one sweep plus the optional anchor.
///
/// A set is never edited after construction; updates build a new set and
/// replace the old one wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
    anchor: Option<Anchor>,
}

impl SampleSet {
    pub fn new(samples: Vec<Sample>, anchor: Option<Anchor>) -> Self {
        Self { samples, anchor }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Min/max over finite powers, or [`FALLBACK_POWER_RANGE`] when none is finite.
    pub fn power_range(&self) -> PowerRange {
        let mut finite = self
            .samples
            .iter()
            .map(|s| s.power)
            .filter(|p| p.is_finite());
        let Some(first) = finite.next() else {
            return FALLBACK_POWER_RANGE;
        };
        let (min, max) = finite.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        PowerRange { min, max }
    }
}

/// Power span used for the color ramp of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerRange {
    pub min: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azimuth_is_reduced_into_range() {
        assert_eq!(normalize_azimuth(370.0), 10.0);
        assert_eq!(normalize_azimuth(-10.0), 350.0);
        assert_eq!(normalize_azimuth(360.0), 0.0);
        assert_eq!(normalize_azimuth(-1e-20), 0.0);
        assert!(normalize_azimuth(f64::NAN).is_nan());
    }

    #[test]
    fn power_range_ignores_non_finite() {
        let set = SampleSet::new(
            vec![
                Sample::new(0.0, -60.0),
                Sample::new(10.0, f64::NAN),
                Sample::new(20.0, -40.0),
            ],
            None,
        );
        assert_eq!(set.power_range(), PowerRange { min: -60.0, max: -40.0 });
    }

    #[test]
    fn power_range_falls_back_without_finite_values() {
        let set = SampleSet::new(vec![Sample::new(0.0, f64::INFINITY)], None);
        assert_eq!(set.power_range(), FALLBACK_POWER_RANGE);
        assert_eq!(SampleSet::empty().power_range(), FALLBACK_POWER_RANGE);
    }

    #[test]
    fn anchor_requires_both_coordinates() {
        assert!(Anchor::from_parts(Some(40.0), None).is_none());
        assert!(Anchor::from_parts(Some(f64::NAN), Some(1.0)).is_none());
        let a = Anchor::from_parts(Some(40.0), Some(-3.0)).unwrap();
        assert!(a.is_valid());
        assert!(!Anchor { lat: 95.0, lon: 0.0 }.is_valid());
    }
}
