use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};

use super::{ComposeResult, Dimension, Point, Rgb};

/// Uniform factor that makes `source` cover `target` in both axes.
pub fn cover_scale(source: Dimension, target: Dimension) -> ComposeResult<f64> {
    let source = source.ensure_non_zero("source")?;
    let target = target.ensure_non_zero("target")?;
    let scale_x = f64::from(target.width) / f64::from(source.width);
    let scale_y = f64::from(target.height) / f64::from(source.height);
    Ok(scale_x.max(scale_y))
}

pub fn scaled_size(source: Dimension, target: Dimension) -> ComposeResult<Dimension> {
    let scale = cover_scale(source, target)?;
    let scaled = |length: u32, floor: u32| {
        let value = (f64::from(length) * scale).round();
        (value as u32).max(floor)
    };
    Ok(Dimension::new(
        scaled(source.width, target.width),
        scaled(source.height, target.height),
    ))
}

/// Top-left of a `scaled` image centered on `target`; negative when it
/// overhangs.
pub fn background_offset(scaled: Dimension, target: Dimension) -> (i64, i64) {
    let dx = (i64::from(target.width) - i64::from(scaled.width)).div_euclid(2);
    let dy = (i64::from(target.height) - i64::from(scaled.height)).div_euclid(2);
    (dx, dy)
}

pub fn composite(
    source: &DynamicImage,
    target: Dimension,
    overlay: Option<(&RgbaImage, Point)>,
    background: Rgb,
) -> ComposeResult<RgbaImage> {
    let scaled_dim = scaled_size(Dimension::of(source), target)?;
    let scaled = source
        .resize_exact(scaled_dim.width, scaled_dim.height, FilterType::Lanczos3)
        .to_rgba8();

    let [r, g, b] = background.0;
    let mut canvas = RgbaImage::from_pixel(target.width, target.height, Rgba([r, g, b, 255]));
    let (dx, dy) = background_offset(scaled_dim, target);
    paste_with_mask(&mut canvas, &scaled, dx, dy);

    if let Some((image, position)) = overlay {
        paste_with_mask(
            &mut canvas,
            image,
            i64::from(position.x),
            i64::from(position.y),
        );
    }
    Ok(canvas)
}

/// Pastes `top` at (`x`, `y`) using its alpha channel as the mask. Parts
/// outside `base` are clipped; fully transparent pixels leave `base` as is.
pub fn paste_with_mask(base: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    let base_w = i64::from(base.width());
    let base_h = i64::from(base.height());
    let start_x = (-x).clamp(0, i64::from(top.width()));
    let start_y = (-y).clamp(0, i64::from(top.height()));
    let end_x = (base_w - x).clamp(0, i64::from(top.width()));
    let end_y = (base_h - y).clamp(0, i64::from(top.height()));

    for ty in start_y..end_y {
        for tx in start_x..end_x {
            let pixel = top.get_pixel(tx as u32, ty as u32);
            let alpha = pixel[3];
            if alpha == 0 {
                continue;
            }
            let target = base.get_pixel_mut((tx + x) as u32, (ty + y) as u32);
            if alpha == u8::MAX {
                *target = *pixel;
                continue;
            }
            *target = blend(target, pixel);
        }
    }
}

fn blend(bg: &Rgba<u8>, fg: &Rgba<u8>) -> Rgba<u8> {
    let alpha = u32::from(fg[3]);
    let inv = 255 - alpha;
    let mix = |f: u8, b: u8| ((u32::from(f) * alpha + u32::from(b) * inv + 127) / 255) as u8;
    let out_alpha = alpha + (u32::from(bg[3]) * inv + 127) / 255;
    Rgba([
        mix(fg[0], bg[0]),
        mix(fg[1], bg[1]),
        mix(fg[2], bg[2]),
        out_alpha.min(255) as u8,
    ])
}
