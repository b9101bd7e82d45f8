//! Exact-size RGBA resampling.

use std::cell::RefCell;

use anyhow::{Context, Result, ensure};
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbaImage;

thread_local! {
    // Scratch buffers are reused across calls on the same worker thread.
    static RESIZER: RefCell<Resizer> = RefCell::new(Resizer::new());
}

/// Resample `source` to exactly `width`×`height` with a Catmull-Rom filter.
pub fn resize_rgba(source: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage> {
    ensure!(width > 0 && height > 0, "cannot resample to {width}x{height}");
    if source.dimensions() == (width, height) {
        return Ok(source.clone());
    }

    let (src_w, src_h) = source.dimensions();
    let src = ImageRef::new(src_w, src_h, source.as_raw(), PixelType::U8x4)
        .with_context(|| format!("{src_w}x{src_h} source is not an RGBA buffer"))?;
    let mut dst = Image::new(width, height, PixelType::U8x4);
    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom));
    RESIZER
        .with_borrow_mut(|resizer| resizer.resize(&src, &mut dst, &options))
        .with_context(|| format!("resampling {src_w}x{src_h} to {width}x{height} failed"))?;
    RgbaImage::from_raw(width, height, dst.into_vec())
        .context("resampled buffer has the wrong length")
}
