use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::error::{ClockError, ClockResult};

/// Declarative placement of dynamic fields on the display canvas.
///
/// A layout references exactly one template by name; every field addresses a
/// `{{PLACEHOLDER}}` marker inside that template. Validation runs eagerly in
/// [`parse`]: a `LayoutConfig` value that exists is structurally valid and no
/// downstream component re-checks it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LayoutConfig {
    pub template_name: String,
    pub width: i64,
    pub height: i64,
    pub fields: Vec<FieldSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FieldSpec {
    pub placeholder: String,
    pub x: i64,
    pub y: i64,
    pub font_family: String,
    pub font_size: i64,
    /// 8-bit gray level, 0 = black, 255 = white. Output is always grayscale.
    pub color: u8,
    pub align: Align,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn svg_anchor(self) -> &'static str {
        match self {
            Align::Left => "start",
            Align::Center => "middle",
            Align::Right => "end",
        }
    }
}

/// Parse a layout document from JSON and validate it eagerly.
pub fn parse(source: &str) -> ClockResult<LayoutConfig> {
    let layout: LayoutConfig = serde_json::from_str(source)
        .map_err(|e| ClockError::layout_config(format!("malformed layout document: {e}")))?;
    layout.validate()?;
    Ok(layout)
}

/// Upper bound on canvas dimensions; matches the raster-size guard so every
/// validated layout rasterizes without overflow.
pub const MAX_CANVAS_DIM: i64 = 16_384;

impl LayoutConfig {
    pub fn validate(&self) -> ClockResult<()> {
        if self.template_name.trim().is_empty() {
            return Err(ClockError::layout_config("template_name must be non-empty"));
        }
        if self.width <= 0 || self.height <= 0 {
            return Err(ClockError::layout_config(format!(
                "canvas width/height must be > 0 (got {}x{})",
                self.width, self.height
            )));
        }
        if self.width > MAX_CANVAS_DIM || self.height > MAX_CANVAS_DIM {
            return Err(ClockError::layout_config(format!(
                "canvas width/height must be <= {MAX_CANVAS_DIM} (got {}x{})",
                self.width, self.height
            )));
        }
        if self.fields.is_empty() {
            return Err(ClockError::layout_config(
                "layout must declare at least one field",
            ));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.placeholder.trim().is_empty() {
                return Err(ClockError::layout_config("field placeholder must be non-empty"));
            }
            if !seen.insert(field.placeholder.as_str()) {
                return Err(ClockError::layout_config(format!(
                    "duplicate placeholder '{}'",
                    field.placeholder
                )));
            }
            if field.font_size <= 0 {
                return Err(ClockError::layout_config(format!(
                    "field '{}' font_size must be > 0 (got {})",
                    field.placeholder, field.font_size
                )));
            }
            // Rejected, not clamped.
            if field.x < 0 || field.x > self.width || field.y < 0 || field.y > self.height {
                return Err(ClockError::layout_config(format!(
                    "field '{}' position ({},{}) outside canvas {}x{}",
                    field.placeholder, field.x, field.y, self.width, self.height
                )));
            }
        }

        Ok(())
    }

    /// Generate an SVG template for this layout: one positioned `<text>`
    /// element per field whose content is the field's marker, over a
    /// full-canvas white background. The render path substitutes the markers
    /// at request time; dark mode remaps the palette there as well.
    pub fn scaffold_svg(&self) -> String {
        let mut svg = String::new();
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = self.width,
            h = self.height
        );
        let _ = write!(
            svg,
            "  <rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"white\"/>\n",
            self.width, self.height
        );
        for field in &self.fields {
            let _ = write!(
                svg,
                "  <text x=\"{}\" y=\"{}\" font-family=\"{}\" font-size=\"{}\" \
                 fill=\"{}\" text-anchor=\"{}\">{{{{{}}}}}</text>\n",
                field.x,
                field.y,
                field.font_family,
                field.font_size,
                gray_hex(field.color),
                field.align.svg_anchor(),
                field.placeholder
            );
        }
        svg.push_str("</svg>\n");
        svg
    }
}

fn gray_hex(level: u8) -> String {
    format!("#{level:02X}{level:02X}{level:02X}")
}
