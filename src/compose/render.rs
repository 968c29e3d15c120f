use image::RgbaImage;
use resvg::render;
use std::sync::Arc;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree, fontdb};

use super::layout::{TextMeasurer, measure_line};
use super::{BoxStyle, ComposeError, ComposeResult, Dimension, Typeface};

pub struct OverlayImage {
    pub image: RgbaImage,
    pub size: Dimension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxLayout {
    pub size: Dimension,
    pub text_width: u32,
    pub line_height: u32,
}

/// Sizes the overlay box for `lines`. Every line shares one line height:
/// the first non-empty line's measured height plus the font descent.
pub fn layout_box(
    lines: &[String],
    measurer: &dyn TextMeasurer,
    style: &BoxStyle,
) -> ComposeResult<BoxLayout> {
    let mut text_width = 0u32;
    let mut first_height = None;
    for line in lines {
        let (width, height) = measure_line(measurer, line)?;
        text_width = text_width.max(width);
        if first_height.is_none() && !line.is_empty() {
            first_height = Some(height);
        }
    }
    let line_height = first_height
        .map(|height| height.saturating_add(measurer.descent()))
        .unwrap_or(0);

    let padding = style.internal_padding.saturating_mul(2);
    let count = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    let size = Dimension::new(
        text_width.saturating_add(padding),
        line_height.saturating_mul(count).saturating_add(padding),
    );
    Ok(BoxLayout {
        size,
        text_width,
        line_height,
    })
}

pub fn render_overlay(
    lines: &[String],
    measurer: &dyn TextMeasurer,
    typeface: &Typeface,
    style: &BoxStyle,
) -> ComposeResult<OverlayImage> {
    let layout = layout_box(lines, measurer, style)?;
    let size = layout.size;
    if size.width == 0 || size.height == 0 {
        return Ok(OverlayImage {
            image: RgbaImage::new(size.width, size.height),
            size,
        });
    }

    let svg = overlay_svg(lines, &layout, measurer.ascent(), typeface, style);
    let image = rasterize(&svg, size, typeface.data.as_deref().map(Vec::as_slice))?;
    Ok(OverlayImage { image, size })
}

fn overlay_svg(
    lines: &[String],
    layout: &BoxLayout,
    ascent: u32,
    typeface: &Typeface,
    style: &BoxStyle,
) -> String {
    let Dimension { width, height } = layout.size;
    // keep corners circular; resvg would clamp rx and ry independently
    let radius = style.corner_radius.min(width / 2).min(height / 2);
    let padding = style.internal_padding;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<rect x="0" y="0" width="{w}" height="{h}" rx="{r}" ry="{r}" fill="{fill}" fill-opacity="{opacity}"/>"#,
        w = width,
        h = height,
        r = radius,
        fill = style.fill_color.to_hex(),
        opacity = opacity(style.fill_alpha)
    ));

    let family = typeface
        .family
        .as_deref()
        .map(escape_xml)
        .unwrap_or_else(|| "sans-serif".to_string());
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let top = padding + idx as u32 * layout.line_height;
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="{color}" fill-opacity="{opacity}">{text}</text>"#,
            x = padding,
            y = top + ascent,
            size = typeface.size,
            family = family,
            color = style.text_color.to_hex(),
            opacity = opacity(style.text_alpha),
            text = escape_xml(line)
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn rasterize(svg: &str, size: Dimension, font_data: Option<&[u8]>) -> ComposeResult<RgbaImage> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree =
        Tree::from_str(svg, &options).map_err(|err| ComposeError::Raster(err.to_string()))?;
    let mut pixmap = Pixmap::new(size.width, size.height)
        .ok_or_else(|| ComposeError::Raster("empty overlay size".to_string()))?;
    render(&tree, Transform::identity(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha; the paste mask wants straight alpha
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(size.width, size.height, raw)
        .ok_or_else(|| ComposeError::Raster("failed to build image buffer from SVG".to_string()))
}

fn opacity(alpha: u8) -> String {
    format!("{:.4}", f32::from(alpha) / 255.0)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
