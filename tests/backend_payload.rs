use polar360::backend::{validate_record_name, LivePayload, RecordInfo};
use polar360::{Anchor, Error};

#[test]
fn live_json_becomes_sample_set() {
    let json = r#"{"ok": true, "lat": 41.38, "long": 2.17, "n": 3,
        "points": [{"deg": 0, "pwr": -55.5}, {"deg": 359.5, "pwr": -60}, {"deg": 725, "pwr": -65}]}"#;
    let set = serde_json::from_str::<LivePayload>(json)
        .unwrap()
        .into_sample_set()
        .unwrap();
    assert_eq!(set.anchor(), Some(Anchor { lat: 41.38, lon: 2.17 }));
    let az: Vec<f64> = set.samples().iter().map(|s| s.azimuth).collect();
    assert_eq!(az, vec![0.0, 359.5, 5.0]);
}

#[test]
fn half_anchor_is_absent() {
    let json = r#"{"ok": true, "lat": 41.38, "long": null, "points": [{"deg": 10, "pwr": -50}]}"#;
    let set = serde_json::from_str::<LivePayload>(json)
        .unwrap()
        .into_sample_set()
        .unwrap();
    assert!(set.anchor().is_none());
    assert_eq!(set.len(), 1);
}

#[test]
fn listing_items_deserialize() {
    let json = r#"[{"name":"a.txt","url":"/guardado360/a.txt","size":10,"mtime":2.0,"equipo":"X"},
                   {"name":"b.txt","url":"/guardado360/b.txt","size":20,"mtime":1.0,"equipo":""}]"#;
    let items: Vec<RecordInfo> = serde_json::from_str(json).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].equipo, "");
}

#[test]
fn unsafe_names_are_user_errors() {
    assert!(matches!(validate_record_name("../../etc/passwd.txt"), Err(Error::UserIntent(_))));
    assert!(validate_record_name("save360_7(2025-02-03_11-12-13).txt").is_ok());
}
