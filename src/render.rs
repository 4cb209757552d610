use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use anyhow::Context as _;

use crate::{
    error::{ClockError, ClockResult},
    fields::ResolvedFields,
    layout::LayoutConfig,
};

/// Display palette. Dark mode inverts the template's background/text colors
/// for e-paper panels driven with inverted pixels at night.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// Single-channel grayscale bitmap, row-major, one byte per pixel.
#[derive(Clone, Debug)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub const CONTENT_TYPE: &str = "image/png";

impl Bitmap {
    /// Encode as a lossless grayscale PNG.
    pub fn encode_png(&self) -> ClockResult<Vec<u8>> {
        let img = image::GrayImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| ClockError::svg_processing("bitmap buffer/dimension mismatch"))?;

        let mut buf = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .context("encode grayscale png")?;
        Ok(buf)
    }
}

/// Merge a template with resolved values and rasterize it to a grayscale
/// bitmap at exactly the layout's canvas size.
pub fn render(
    template: &str,
    layout: &LayoutConfig,
    fields: &ResolvedFields,
) -> ClockResult<Bitmap> {
    render_themed(template, layout, fields, Theme::Light)
}

#[tracing::instrument(skip(template, layout, fields), fields(template_name = %layout.template_name))]
pub fn render_themed(
    template: &str,
    layout: &LayoutConfig,
    fields: &ResolvedFields,
    theme: Theme,
) -> ClockResult<Bitmap> {
    let composed = substitute(template, layout, fields)?;
    let composed = apply_theme(&composed, theme);

    // A parsed layout is already bounded; this refuses hand-built configs
    // instead of wrapping the cast.
    let width = u32::try_from(layout.width)
        .map_err(|_| ClockError::svg_processing(format!("canvas width {} not renderable", layout.width)))?;
    let height = u32::try_from(layout.height)
        .map_err(|_| ClockError::svg_processing(format!("canvas height {} not renderable", layout.height)))?;
    let rgba = rasterize(&composed, width, height)?;
    let pixels = premul_rgba_to_gray(&rgba, theme);

    tracing::debug!(width, height, "rendered template to grayscale bitmap");
    Ok(Bitmap {
        width,
        height,
        pixels,
    })
}

/// Replace every `{{NAME}}` marker declared by the layout with its resolved
/// value. Every declared placeholder must have a value, and after
/// substitution no declared marker may remain; text outside markers is left
/// untouched.
pub fn substitute(
    template: &str,
    layout: &LayoutConfig,
    fields: &ResolvedFields,
) -> ClockResult<String> {
    let mut composed = template.to_string();
    for field in &layout.fields {
        let value = fields
            .get(&field.placeholder)
            .ok_or_else(|| ClockError::missing_field(field.placeholder.clone()))?;
        let marker = format!("{{{{{}}}}}", field.placeholder);
        composed = composed.replace(&marker, value);
    }

    for field in &layout.fields {
        let marker = format!("{{{{{}}}}}", field.placeholder);
        if composed.contains(&marker) {
            return Err(ClockError::svg_processing(format!(
                "marker '{marker}' reappeared after substitution"
            )));
        }
    }

    Ok(composed)
}

/// Palette substitutions applied in dark mode. Light mode leaves the
/// document as authored. Replacement goes through intermediate tokens so a
/// swapped color is never picked up by a later rule.
const DARK_PALETTE: &[(&str, &str)] = &[
    // background
    ("fill=\"white\"", "fill=\"#000000\""),
    ("fill=\"#FFFFFF\"", "fill=\"#000000\""),
    ("fill=\"#ffffff\"", "fill=\"#000000\""),
    // primary text
    ("fill=\"black\"", "fill=\"#FFFFFF\""),
    ("fill=\"#000000\"", "fill=\"#FFFFFF\""),
    ("fill=\"#444\"", "fill=\"#FFFFFF\""),
    ("fill=\"#444444\"", "fill=\"#FFFFFF\""),
    ("fill=\"#666\"", "fill=\"#FFFFFF\""),
    ("fill=\"#666666\"", "fill=\"#FFFFFF\""),
    // highlight
    ("fill=\"#222\"", "fill=\"#CCCCCC\""),
    ("fill=\"#222222\"", "fill=\"#CCCCCC\""),
];

pub fn apply_theme(svg: &str, theme: Theme) -> String {
    if theme == Theme::Light {
        return svg.to_string();
    }

    let mut out = svg.to_string();
    for (i, (from, _)) in DARK_PALETTE.iter().enumerate() {
        out = out.replace(from, &format!("\u{1}{i}\u{1}"));
    }
    for (i, (_, to)) in DARK_PALETTE.iter().enumerate() {
        out = out.replace(&format!("\u{1}{i}\u{1}"), to);
    }
    out
}

// Keeps one fontdb for the process; loading system fonts per render is slow.
fn fontdb() -> Arc<usvg::fontdb::Database> {
    static FONTDB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    Arc::clone(FONTDB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.faces().count(), "loaded system font database");
        Arc::new(db)
    }))
}

const MAX_DIM: u32 = 16_384;

/// Rasterize an SVG document into premultiplied RGBA8 at exactly
/// `width x height`, scaling the document's own viewport to fit.
fn rasterize(svg: &str, width: u32, height: u32) -> ClockResult<Vec<u8>> {
    if width == 0 || height == 0 || width > MAX_DIM || height > MAX_DIM {
        return Err(ClockError::svg_processing(format!(
            "raster size {width}x{height} out of range (max {MAX_DIM}x{MAX_DIM})"
        )));
    }

    let opts = usvg::Options {
        fontdb: fontdb(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &opts)
        .map_err(|e| ClockError::svg_processing(format!("parse svg template: {e}")))?;

    let size = tree.size();
    if !size.width().is_finite() || size.width() <= 0.0 || size.height() <= 0.0 {
        return Err(ClockError::svg_processing("svg has invalid width/height"));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ClockError::svg_processing("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / size.width();
    let sy = (height as f32) / size.height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);
    resvg::render(&tree, xform, &mut pixmap.as_mut());

    Ok(pixmap.data().to_vec())
}

/// Collapse premultiplied RGBA to single-channel gray: composite over the
/// theme background, then BT.601 luma.
fn premul_rgba_to_gray(rgba: &[u8], theme: Theme) -> Vec<u8> {
    let bg: u32 = match theme {
        Theme::Light => 255,
        Theme::Dark => 0,
    };

    let mut out = Vec::with_capacity(rgba.len() / 4);
    for px in rgba.chunks_exact(4) {
        let a = px[3] as u32;
        let r = px[0] as u32 + bg * (255 - a) / 255;
        let g = px[1] as u32 + bg * (255 - a) / 255;
        let b = px[2] as u32 + bg * (255 - a) / 255;
        let y = (299 * r + 587 * g + 114 * b) / 1000;
        out.push(y.min(255) as u8);
    }
    out
}
