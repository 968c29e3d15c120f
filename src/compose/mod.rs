mod canvas;
mod font;
mod layout;
mod placement;
mod render;

use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use thiserror::Error;

pub use canvas::{background_offset, composite, cover_scale, paste_with_mask, scaled_size};
pub use font::{ResolvedOverlayFont, TtfFont, load_font, load_font_from_data, resolve_overlay_font};
pub use layout::{TextMeasurer, measure_line, wrap_text};
pub use placement::{Anchor, resolve_position};
pub use render::{BoxLayout, OverlayImage, layout_box, render_overlay};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to measure text '{text}': {reason}")]
    MeasurementFailure { text: String, reason: String },
    #[error("invalid {what} dimension {width}x{height}")]
    InvalidDimension {
        what: &'static str,
        width: u32,
        height: u32,
    },
    #[error("failed to rasterize overlay: {0}")]
    Raster(String),
}

pub type ComposeResult<T> = std::result::Result<T, ComposeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &DynamicImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub(crate) fn ensure_non_zero(self, what: &'static str) -> ComposeResult<Self> {
        if self.width == 0 || self.height == 0 {
            return Err(ComposeError::InvalidDimension {
                what,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    /// Parses `#rrggbb` or `rrggbb`.
    pub fn parse_hex(value: &str) -> Option<Rgb> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
        Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapConfig {
    pub wrap_width: usize,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self { wrap_width: 20 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxStyle {
    pub corner_radius: u32,
    pub fill_color: Rgb,
    pub fill_alpha: u8,
    pub text_color: Rgb,
    pub text_alpha: u8,
    pub internal_padding: u32,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            corner_radius: 20,
            fill_color: Rgb::WHITE,
            fill_alpha: 128,
            text_color: Rgb::BLACK,
            text_alpha: 255,
            internal_padding: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementConfig {
    pub anchor: Anchor,
    pub external_padding: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            anchor: Anchor::TopCenter,
            external_padding: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub wrap: WrapConfig,
    pub style: BoxStyle,
    pub placement: PlacementConfig,
    pub background: Rgb,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            wrap: WrapConfig::default(),
            style: BoxStyle::default(),
            placement: PlacementConfig::default(),
            background: Rgb::BLACK,
        }
    }
}

/// What the rasterizer needs to draw glyphs; measurement goes through
/// [`TextMeasurer`] instead.
#[derive(Debug, Clone)]
pub struct Typeface {
    pub family: Option<String>,
    pub size: f32,
    pub data: Option<Arc<Vec<u8>>>,
}

impl Default for Typeface {
    fn default() -> Self {
        Self {
            family: None,
            size: 14.0,
            data: None,
        }
    }
}

/// Runs one composition pass: cover-scaled background plus, when `text`
/// wraps to at least one line, the overlay box at the configured anchor.
pub fn compose_wallpaper(
    source: &DynamicImage,
    target: Dimension,
    text: &str,
    measurer: &dyn TextMeasurer,
    typeface: &Typeface,
    config: &OverlayConfig,
) -> ComposeResult<RgbaImage> {
    let target = target.ensure_non_zero("target")?;
    Dimension::of(source).ensure_non_zero("source")?;

    let lines = wrap_text(text, config.wrap.wrap_width);
    if lines.is_empty() {
        return composite(source, target, None, config.background);
    }

    let overlay = render_overlay(&lines, measurer, typeface, &config.style)?;
    let position = resolve_position(
        config.placement.anchor,
        target,
        overlay.size,
        config.placement.external_padding,
    );
    composite(
        source,
        target,
        Some((&overlay.image, position)),
        config.background,
    )
}


#[cfg(test)]
mod tests {
    use super::testing::FixedMeasurer;
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 90, 255])
        });
        DynamicImage::ImageRgba8(image)
    }

    #[test]
    fn blank_text_skips_the_overlay() {
        let source = gradient(40, 30);
        let target = Dimension::new(64, 36);
        let config = OverlayConfig::default();
        let composed = compose_wallpaper(
            &source,
            target,
            "   ",
            &FixedMeasurer::default(),
            &Typeface::default(),
            &config,
        )
        .expect("compose");
        let plain = composite(&source, target, None, config.background).expect("composite");
        assert_eq!(composed, plain);
    }

    #[test]
    fn composed_wallpaper_matches_target_size() {
        let source = gradient(30, 40);
        let target = Dimension::new(160, 90);
        let composed = compose_wallpaper(
            &source,
            target,
            "hello there",
            &FixedMeasurer::default(),
            &Typeface::default(),
            &OverlayConfig::default(),
        )
        .expect("compose");
        assert_eq!(composed.dimensions(), (160, 90));
        assert!(composed.pixels().all(|pixel| pixel[3] == 255));
    }

    #[test]
    fn zero_target_is_rejected_before_scaling() {
        let err = compose_wallpaper(
            &gradient(4, 4),
            Dimension::new(0, 1080),
            "text",
            &FixedMeasurer::default(),
            &Typeface::default(),
            &OverlayConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::InvalidDimension { what: "target", .. }
        ));
    }

    #[test]
    fn measurement_failure_propagates() {
        let measurer = FixedMeasurer {
            reject: Some('☃'),
            ..FixedMeasurer::default()
        };
        let err = compose_wallpaper(
            &gradient(4, 4),
            Dimension::new(32, 32),
            "snow ☃",
            &measurer,
            &Typeface::default(),
            &OverlayConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::MeasurementFailure { .. }));
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(Rgb::parse_hex("#ff8000"), Some(Rgb([255, 128, 0])));
        assert_eq!(Rgb::parse_hex("00ff00"), Some(Rgb([0, 255, 0])));
        assert_eq!(Rgb::parse_hex("#fff"), None);
        assert_eq!(Rgb::parse_hex("#gg0000"), None);
        assert_eq!(Rgb::WHITE.to_hex(), "#ffffff");
    }
}
