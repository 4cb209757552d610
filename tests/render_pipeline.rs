use std::time::Duration;

use chrono::{TimeZone as _, Utc};
use inkclock::{
    Align, ClockError, ClockService, FieldSpec, ImageCache, LayoutConfig, Orientation,
    RenderRequest, ResolveOptions, TemplateStore, Theme,
};

fn clock_layout() -> LayoutConfig {
    LayoutConfig {
        template_name: "landscape".to_string(),
        width: 1448,
        height: 1072,
        fields: vec![FieldSpec {
            placeholder: "TIME".to_string(),
            x: 724,
            y: 536,
            font_family: "sans-serif".to_string(),
            font_size: 200,
            color: 0,
            align: Align::Center,
        }],
    }
}

#[test]
fn rendered_bitmap_matches_layout_dimensions() {
    let layout = clock_layout();
    let template = layout.scaffold_svg();
    let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let fields = inkclock::resolve(instant, "UTC", &ResolveOptions::default()).unwrap();

    let bitmap = inkclock::render(&template, &layout, &fields).unwrap();
    assert_eq!((bitmap.width, bitmap.height), (1448, 1072));
    assert_eq!(bitmap.pixels.len(), 1448 * 1072);
}

#[test]
fn substitution_is_complete_before_rasterization() {
    let layout = clock_layout();
    let template = layout.scaffold_svg();
    let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let fields = inkclock::resolve(instant, "UTC", &ResolveOptions::default()).unwrap();

    let composed = inkclock::substitute(&template, &layout, &fields).unwrap();
    assert!(!composed.contains("{{TIME}}"));
    assert!(composed.contains("00:00"));
}

#[test]
fn output_png_is_single_channel_grayscale() {
    let layout = clock_layout();
    let template = layout.scaffold_svg();
    let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let fields = inkclock::resolve(instant, "UTC", &ResolveOptions::default()).unwrap();

    let bitmap = inkclock::render(&template, &layout, &fields).unwrap();
    let png = bitmap.encode_png().unwrap();

    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!(decoded.color(), image::ColorType::L8);
    assert_eq!(decoded.width(), 1448);
    assert_eq!(decoded.height(), 1072);
}

#[test]
fn dark_theme_inverts_the_background() {
    let layout = clock_layout();
    let template = layout.scaffold_svg();
    let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let fields = inkclock::resolve(instant, "UTC", &ResolveOptions::default()).unwrap();

    let light = inkclock::render_themed(&template, &layout, &fields, Theme::Light).unwrap();
    let dark = inkclock::render_themed(&template, &layout, &fields, Theme::Dark).unwrap();

    // corner pixels sit on the background rect
    assert_eq!(light.pixels[0], 255);
    assert_eq!(dark.pixels[0], 0);
}

#[test]
fn undeclared_placeholder_fails_as_missing_field() {
    let mut layout = clock_layout();
    layout.fields.push(FieldSpec {
        placeholder: "HUMIDITY".to_string(),
        x: 10,
        y: 10,
        font_family: "sans-serif".to_string(),
        font_size: 20,
        color: 0,
        align: Align::Left,
    });
    let template = layout.scaffold_svg();
    let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let fields = inkclock::resolve(instant, "UTC", &ResolveOptions::default()).unwrap();

    let err = inkclock::render(&template, &layout, &fields).unwrap_err();
    assert!(matches!(err, ClockError::MissingField(ref p) if p == "HUMIDITY"));
}

#[test]
fn service_renders_end_to_end_and_caches_within_the_minute() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = clock_layout();
    std::fs::write(
        tmp.path().join("landscape.json"),
        serde_json::to_string(&layout).unwrap(),
    )
    .unwrap();
    std::fs::write(tmp.path().join("landscape.svg"), layout.scaffold_svg()).unwrap();

    let service = ClockService::new(
        TemplateStore::new(tmp.path()),
        ImageCache::new(16),
        Duration::from_secs(30),
    );

    let request = RenderRequest {
        orientation: Orientation::Landscape,
        theme: Theme::Light,
        timezone: "UTC".to_string(),
        display_weather: false,
        weather_snapshot: None,
    };
    let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let first = service.handle(&request, instant).unwrap();
    assert_eq!((first.width, first.height), (1448, 1072));
    assert_eq!(first.content_type(), "image/png");
    assert!(!first.png.is_empty());

    let second = service.handle(&request, instant).unwrap();
    assert_eq!(first.png, second.png);

    let stats = service.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn service_surfaces_invalid_timezone() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = clock_layout();
    std::fs::write(
        tmp.path().join("landscape.json"),
        serde_json::to_string(&layout).unwrap(),
    )
    .unwrap();
    std::fs::write(tmp.path().join("landscape.svg"), layout.scaffold_svg()).unwrap();

    let service = ClockService::new(
        TemplateStore::new(tmp.path()),
        ImageCache::new(16),
        Duration::from_secs(30),
    );

    let request = RenderRequest {
        orientation: Orientation::Landscape,
        theme: Theme::Light,
        timezone: "Not/AZone".to_string(),
        display_weather: false,
        weather_snapshot: None,
    };
    let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let err = service.handle(&request, instant).unwrap_err();
    assert!(err.to_string().contains("invalid timezone"));
}
