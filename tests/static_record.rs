use polar360::data::record::{first_two_numbers, parse_record};
use polar360::{Anchor, Sample};

#[test]
fn parses_reference_record() {
    let rec = parse_record("EQ-1\n40.000000,-3.000000\n10,-50\n190,-70\nnot,a,pair\n");
    assert_eq!(rec.equipo.as_deref(), Some("EQ-1"));
    assert_eq!(rec.set.anchor(), Some(Anchor { lat: 40.0, lon: -3.0 }));
    assert_eq!(
        rec.set.samples(),
        &[Sample::new(10.0, -50.0), Sample::new(190.0, -70.0)]
    );
}

#[test]
fn azimuth_is_normalized_on_ingestion() {
    let rec = parse_record("EQ\n0,0\n370,-40\n-90,-41\n720,-42\n");
    let az: Vec<f64> = rec.set.samples().iter().map(|s| s.azimuth).collect();
    assert_eq!(az, vec![10.0, 270.0, 0.0]);
}

#[test]
fn empty_record_yields_empty_set() {
    let rec = parse_record("");
    assert!(rec.equipo.is_none());
    assert!(rec.set.is_empty());
    assert!(rec.set.anchor().is_none());
    assert_eq!(rec.equipo_label(), "—");
}

#[test]
fn anchor_line_without_two_numbers_is_absent() {
    let rec = parse_record("EQ\nno fix\n45 -60\n");
    assert!(rec.set.anchor().is_none());
    assert_eq!(rec.set.samples(), &[Sample::new(45.0, -60.0)]);
}

#[test]
fn numbers_are_taken_from_noisy_lines() {
    assert_eq!(first_two_numbers("az=12.5 deg; p=-71.25 dBm"), Some((12.5, -71.25)));
    assert_eq!(first_two_numbers("+3;4;5"), Some((3.0, 4.0)));
    assert_eq!(first_two_numbers("only 1"), None);
}
