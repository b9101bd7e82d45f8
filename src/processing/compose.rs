//! Software compositor for the presenter: letterboxed layers over black,
//! linearly alpha blended.

use std::borrow::Cow;

use anyhow::Result;
use image::{Rgba, RgbaImage};

use crate::item::Rotation;
use crate::processing::layout::{centered_origin, contain_size};
use crate::processing::resize::resize_rgba;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A layer raster already rotated and scaled to fit a canvas.
#[derive(Debug, Clone)]
pub struct FittedLayer {
    pub image: RgbaImage,
    pub x: u32,
    pub y: u32,
}

/// Rotate `source` for display and scale it to fit inside the canvas,
/// centered, aspect preserved.
pub fn fit_layer(
    source: &RgbaImage,
    rotation: Rotation,
    canvas_w: u32,
    canvas_h: u32,
) -> Result<FittedLayer> {
    let rotated = match rotation {
        Rotation::None => Cow::Borrowed(source),
        other => Cow::Owned(other.apply(source)),
    };
    let (w, h) = contain_size(rotated.width(), rotated.height(), canvas_w, canvas_h);
    let image = resize_rgba(&rotated, w, h)?;
    let (x, y) = centered_origin((w, h), (canvas_w, canvas_h));
    Ok(FittedLayer { image, x, y })
}

pub fn blank_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND)
}

/// Blend `layer` onto `canvas` at `opacity` (0..=1).
pub fn blend_layer(canvas: &mut RgbaImage, layer: &FittedLayer, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }
    let (cw, ch) = canvas.dimensions();
    for (lx, ly, src) in layer.image.enumerate_pixels() {
        let (cx, cy) = (layer.x + lx, layer.y + ly);
        if cx >= cw || cy >= ch {
            continue;
        }
        let a = opacity * f32::from(src[3]) / 255.0;
        let dst = canvas.get_pixel_mut(cx, cy);
        for c in 0..3 {
            let mixed = f32::from(dst[c]) * (1.0 - a) + f32::from(src[c]) * a;
            dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = 255;
    }
}
