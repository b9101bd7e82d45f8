//! Image decode service: bounded-width decode plus EXIF orientation fix-up.
//!
//! Both entry points are blocking and stateless; callers run them on a
//! blocking worker (`tokio::task::spawn_blocking`). The returned pixels are
//! immutable and shared by `Arc`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, ImageReader, RgbaImage};
use jpeg_decoder::{Decoder as JpegDecoder, PixelFormat};
use tracing::debug;

use crate::error::DecodeError;
use crate::item::{Rotation, SharedImage};
use crate::processing::layout::fit_width;
use crate::processing::resize::resize_rgba;

pub const THUMBNAIL_MAX_WIDTH: u32 = 150;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 90;
pub const PREVIEW_MAX_WIDTH: u32 = 1600;
pub const PREVIEW_MAX_HEIGHT: u32 = 1200;

/// Decode a small image for the browsing list.
pub fn decode_thumbnail(
    path: &Path,
    max_width: u32,
    max_height: u32,
) -> Result<SharedImage, DecodeError> {
    let img = decode_bounded(path, max_width, max_height)?;
    debug!(path = %path.display(), width = img.width(), height = img.height(), "thumbnail decoded");
    Ok(Arc::new(img))
}

/// Decode a presentation-sized image.
pub fn decode_preview(
    path: &Path,
    max_width: u32,
    max_height: u32,
) -> Result<SharedImage, DecodeError> {
    let img = decode_bounded(path, max_width, max_height)?;
    debug!(path = %path.display(), width = img.width(), height = img.height(), "preview decoded");
    Ok(Arc::new(img))
}

/// Orientation fix for an EXIF tag 274 value.
///
/// Only the three pure rotations are corrected. Mirrored orientations
/// (2, 4, 5, 7) are left untouched.
pub fn orientation_correction(orientation: u16) -> Rotation {
    match orientation {
        3 => Rotation::Cw180,
        6 => Rotation::Cw90,
        8 => Rotation::Cw270,
        _ => Rotation::None,
    }
}

// `_max_height` is advisory: width alone drives the decode resolution.
fn decode_bounded(path: &Path, max_width: u32, _max_height: u32) -> Result<RgbaImage, DecodeError> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let scaled = match reader.format() {
        Some(ImageFormat::Jpeg) => match decode_jpeg_scaled(path, max_width) {
            Ok(img) => Some(img),
            Err(err) => {
                debug!("scaled JPEG decode failed for {}: {err}; falling back", path.display());
                None
            }
        },
        _ => None,
    };
    let img = match scaled {
        Some(img) => img,
        None => reader
            .decode()
            .map_err(|source| DecodeError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8(),
    };

    let (target_w, target_h) = fit_width(img.width(), img.height(), max_width);
    let img = resize_rgba(&img, target_w, target_h).map_err(|err| DecodeError::Resize {
        path: path.to_path_buf(),
        reason: format!("{err:#}"),
    })?;

    let correction = read_orientation(path)
        .map(orientation_correction)
        .unwrap_or_default();
    Ok(match correction {
        Rotation::None => img,
        other => other.apply(&img),
    })
}

/// DCT-scaled JPEG decode at the smallest scale still covering the target width.
fn decode_jpeg_scaled(path: &Path, max_width: u32) -> Result<RgbaImage, DecodeError> {
    let jpeg_err = |reason: String| DecodeError::Jpeg {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = JpegDecoder::new(BufReader::new(file));
    decoder.read_info().map_err(|err| jpeg_err(err.to_string()))?;
    let header = decoder
        .info()
        .ok_or_else(|| jpeg_err("missing image info".into()))?;
    let full_w = u32::from(header.width);
    let (target_w, _) = fit_width(full_w, u32::from(header.height), max_width);
    if target_w < full_w {
        // `scale` settles on a size once either axis reaches the request, so an
        // unreachable height leaves the width alone in charge.
        let request_w = u16::try_from(target_w).unwrap_or(u16::MAX);
        let (scaled_w, _) = decoder
            .scale(request_w, u16::MAX)
            .map_err(|err| jpeg_err(err.to_string()))?;
        if u32::from(scaled_w) < target_w {
            return Err(jpeg_err(format!(
                "DCT scale gives width {scaled_w}, need at least {target_w}"
            )));
        }
    }
    let pixels = decoder.decode().map_err(|err| jpeg_err(err.to_string()))?;
    let info = decoder
        .info()
        .ok_or_else(|| jpeg_err("missing image info after decode".into()))?;
    let width = u32::from(info.width);
    let height = u32::from(info.height);

    let rgba = match info.pixel_format {
        PixelFormat::RGB24 => {
            let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
            for chunk in pixels.chunks_exact(3) {
                rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }
            rgba
        }
        PixelFormat::L8 => {
            let mut rgba = Vec::with_capacity(pixels.len() * 4);
            for &v in &pixels {
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
            rgba
        }
        PixelFormat::CMYK32 => {
            let mut rgba = Vec::with_capacity(pixels.len());
            for chunk in pixels.chunks_exact(4) {
                let k = chunk[3] as f32 / 255.0;
                let channel = |v: u8| {
                    let v = v as f32 / 255.0;
                    let v = v * (1.0 - k) + k;
                    ((1.0 - v) * 255.0).round().clamp(0.0, 255.0) as u8
                };
                rgba.extend_from_slice(&[channel(chunk[0]), channel(chunk[1]), channel(chunk[2]), 255]);
            }
            rgba
        }
        PixelFormat::L16 => {
            return Err(jpeg_err("16-bit grayscale JPEGs are not supported by the scaled decoder".into()));
        }
    };

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| jpeg_err("decoded buffer does not match reported dimensions".into()))
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = match &field.value {
        exif::Value::Short(values) => *values.first()?,
        exif::Value::Long(values) => u16::try_from(*values.first()?).ok()?,
        other => {
            debug!("unexpected orientation value {other:?} in {}", path.display());
            return None;
        }
    };
    debug!("exif orientation {} for {}", o, path.display());
    Some(o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn write_orient6(dir: &Path) -> std::path::PathBuf {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let path = dir.join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        path
    }

    #[test]
    fn applies_orientation_six() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_orient6(dir.path());
        let img = decode_thumbnail(&path, THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
        let img = decode_preview(&path, PREVIEW_MAX_WIDTH, PREVIEW_MAX_HEIGHT).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn orientation_table_only_handles_rotations() {
        assert_eq!(orientation_correction(1), Rotation::None);
        assert_eq!(orientation_correction(3), Rotation::Cw180);
        assert_eq!(orientation_correction(6), Rotation::Cw90);
        assert_eq!(orientation_correction(8), Rotation::Cw270);
        for mirrored in [2, 4, 5, 7] {
            assert_eq!(orientation_correction(mirrored), Rotation::None);
        }
        assert_eq!(orientation_correction(0), Rotation::None);
        assert_eq!(orientation_correction(42), Rotation::None);
    }

    #[test]
    fn wide_png_is_downsampled_to_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::from_pixel(400, 100, image::Rgba([10, 200, 30, 255]))
            .save(&path)
            .unwrap();
        let img = decode_thumbnail(&path, 150, 90).unwrap();
        assert_eq!(img.dimensions(), (150, 38));
    }

    #[test]
    fn scaled_jpeg_lands_on_exact_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        image::RgbImage::from_pixel(640, 480, image::Rgb([90, 90, 90]))
            .save(&path)
            .unwrap();
        let img = decode_thumbnail(&path, 150, 90).unwrap();
        assert_eq!(img.dimensions(), (150, 113));
    }

    #[test]
    fn scaled_jpeg_never_lands_below_width_bound() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("odd.jpg");
        image::RgbImage::from_pixel(297, 167, image::Rgb([40, 80, 120]))
            .save(&odd)
            .unwrap();
        let img = decode_thumbnail(&odd, THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT).unwrap();
        assert_eq!(img.dimensions(), (150, 84));

        let large = dir.path().join("large.jpg");
        image::RgbImage::from_pixel(3197, 2131, image::Rgb([40, 80, 120]))
            .save(&large)
            .unwrap();
        let img = decode_preview(&large, PREVIEW_MAX_WIDTH, PREVIEW_MAX_HEIGHT).unwrap();
        assert_eq!(img.dimensions(), (1600, 1066));
        let img = decode_thumbnail(&large, THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT).unwrap();
        assert_eq!(img.dimensions(), (150, 100));
    }

    #[test]
    fn bmp_decodes_without_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.bmp");
        image::RgbImage::from_pixel(8, 4, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();
        let img = decode_preview(&path, PREVIEW_MAX_WIDTH, PREVIEW_MAX_HEIGHT).unwrap();
        assert_eq!(img.dimensions(), (8, 4));
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(decode_thumbnail(&path, 150, 90).is_err());
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_preview(&dir.path().join("gone.png"), 1600, 1200).unwrap_err();
        assert!(matches!(err, DecodeError::Open { .. }), "{err}");
    }
}
