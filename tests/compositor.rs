use image::{Rgba, RgbaImage};
use polar360::compositor::{FALLBACK_BACKGROUND, MAP_UNAVAILABLE_CAPTION, PLATE_BACKGROUND};
use polar360::{Compositor, LayoutMode, LogicalSize, PolarRenderer, Sample, SampleSet};

fn polar(w: f32, h: f32, dpr: f32) -> tiny_skia::Pixmap {
    let set = SampleSet::new(vec![Sample::new(45.0, -50.0), Sample::new(200.0, -80.0)], None);
    PolarRenderer::default()
        .render(&set, LogicalSize::new(w, h), dpr)
        .pixmap
}

const MAP_COLOR: Rgba<u8> = Rgba([10, 200, 10, 255]);

#[test]
fn overlay_scales_map_to_polar() {
    let p = polar(200.0, 150.0, 1.0);
    let map = RgbaImage::from_pixel(100, 100, MAP_COLOR);
    let out = Compositor::new().compose(Some(&map), &p, LayoutMode::Overlay, 1.0);
    assert_eq!(out.dimensions(), (200, 150));
    assert_eq!(*out.get_pixel(1, 1), MAP_COLOR);
}

#[test]
fn stacked_puts_map_above_polar() {
    let p = polar(200.0, 150.0, 1.0);
    let map = RgbaImage::from_pixel(100, 50, MAP_COLOR);
    let out = Compositor::new().compose(Some(&map), &p, LayoutMode::Stacked, 1.0);
    // map normalized to 200 wide keeps its 2:1 aspect
    assert_eq!(out.dimensions(), (200, 250));
    assert_eq!(*out.get_pixel(1, 1), MAP_COLOR);
    assert_eq!(*out.get_pixel(1, 102), PLATE_BACKGROUND);
}

#[test]
fn missing_map_falls_back_in_both_modes() {
    let p = polar(160.0, 120.0, 2.0);
    for mode in [LayoutMode::Overlay, LayoutMode::Stacked] {
        let out = Compositor::new().compose(None, &p, mode, 2.0);
        assert_eq!(out.dimensions(), (320, 240), "{mode:?}");
        // dark frame of 4 logical px around a light plate
        assert_eq!(*out.get_pixel(319, 100), FALLBACK_BACKGROUND);
        assert_eq!(*out.get_pixel(309, 100), PLATE_BACKGROUND);
        assert!(out
            .pixels()
            .any(|px| *px != PLATE_BACKGROUND && *px != FALLBACK_BACKGROUND));
    }
}

#[test]
fn empty_map_counts_as_missing() {
    let p = polar(100.0, 100.0, 1.0);
    let map = RgbaImage::new(0, 0);
    let out = Compositor::new().compose(Some(&map), &p, LayoutMode::Stacked, 1.0);
    assert_eq!(out.dimensions(), (100, 100));
}

/// Largest per-channel difference between two pixels.
fn contrast(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    (0..3).map(|i| a[i].abs_diff(b[i])).max().unwrap_or(0)
}

#[test]
fn guide_ink_stands_out_from_every_backdrop() {
    // Odd size puts the center on a half pixel, so the horizontal axis
    // covers row 75 fully; x = 130 sits between the inner guide rings.
    let p = PolarRenderer::default()
        .render(&SampleSet::default(), LogicalSize::new(201.0, 151.0), 1.0)
        .pixmap;
    let axis = (130, 75);
    let light_map = Rgba([221, 221, 221, 255]);
    let map = RgbaImage::from_pixel(201, 100, light_map);
    let c = Compositor::new();

    for mode in [LayoutMode::Overlay, LayoutMode::Stacked] {
        let out = c.compose(None, &p, mode, 1.0);
        let px = out.get_pixel(axis.0, axis.1);
        assert!(contrast(px, &PLATE_BACKGROUND) >= 60, "fallback {mode:?}: {px:?}");
    }

    let out = c.compose(Some(&map), &p, LayoutMode::Stacked, 1.0);
    assert_eq!(*out.get_pixel(axis.0, 100 + 10), PLATE_BACKGROUND);
    let px = out.get_pixel(axis.0, 100 + axis.1);
    assert!(contrast(px, &PLATE_BACKGROUND) >= 60, "stacked band: {px:?}");

    let map = RgbaImage::from_pixel(201, 151, light_map);
    let out = c.compose(Some(&map), &p, LayoutMode::Overlay, 1.0);
    let px = out.get_pixel(axis.0, axis.1);
    assert!(contrast(px, &light_map) >= 60, "overlay: {px:?}");
}

#[test]
fn caption_text_is_fixed() {
    assert_eq!(MAP_UNAVAILABLE_CAPTION, "(map unavailable in capture)");
}
