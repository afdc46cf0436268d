//! Image normalization and encoding.
//!
//! Uploaded reference images arrive in arbitrary formats and orientations.
//! [`normalize_image`] turns them into a canonical bitmap the provider can
//! consume: orientation corrected from EXIF metadata, transparency flattened
//! onto white, three-channel RGB, longest side bounded. [`to_base64_png`]
//! serializes a bitmap to the inline representation used both for uploads and
//! for the response payload.

use std::io::Cursor;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use thiserror::Error;

/// Default bound on the longest side of a normalized image, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Errors from image normalization and encoding.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Normalizes raw image bytes into a canonical RGB bitmap.
///
/// Orientation is corrected from the EXIF orientation tag when one is
/// present; missing or malformed EXIF data is ignored rather than failing the
/// operation. Palette and alpha images are composited onto opaque white using
/// the alpha channel as blend weight, and the result is proportionally
/// downscaled with Lanczos resampling if its longest side exceeds `max_size`.
/// Images already within the bound keep their pixel dimensions.
///
/// # Errors
///
/// Returns [`ImageError::Decode`] if the bytes cannot be parsed as an image.
pub fn normalize_image(bytes: &[u8], max_size: u32) -> Result<DynamicImage, ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let oriented = apply_orientation(decoded, read_exif_orientation(bytes));
    let flattened = flatten_onto_white(oriented);
    Ok(bound_dimensions(flattened, max_size))
}

/// Serializes a bitmap to an in-memory PNG and returns its base64 encoding.
///
/// # Errors
///
/// Returns [`ImageError::Encode`] if PNG serialization fails.
pub fn to_base64_png(img: &DynamicImage) -> Result<String, ImageError> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(ImageError::Encode)?;
    Ok(BASE64_STANDARD.encode(&bytes))
}

/// Reads the EXIF orientation tag (0x0112) from raw image bytes.
///
/// Returns 1 (normal) when the bytes carry no EXIF data or the tag is absent
/// or malformed.
fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };
    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

/// Applies an EXIF orientation transform.
///
/// Values: 1 = normal, 2 = mirrored, 3 = 180 deg, 4 = flipped vertically,
/// 5..=8 = the rotated/mirrored combinations. Out-of-range values are treated
/// as normal.
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Composites the image onto an opaque white background and forces RGB.
///
/// Images that are already 8-bit RGB pass through untouched. Everything else
/// goes through RGBA so the alpha channel (255 for formats without one) acts
/// as the blend weight against white.
fn flatten_onto_white(img: DynamicImage) -> DynamicImage {
    if let DynamicImage::ImageRgb8(_) = img {
        return img;
    }
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut flattened = RgbImage::new(width, height);
    for (out, pixel) in flattened.pixels_mut().zip(rgba.pixels()) {
        let alpha = u32::from(pixel[3]);
        for channel in 0..3 {
            let value = u32::from(pixel[channel]) * alpha + 255 * (255 - alpha);
            out[channel] = (value / 255) as u8;
        }
    }
    DynamicImage::ImageRgb8(flattened)
}

/// Proportionally downscales the image if its longest side exceeds `max_size`.
fn bound_dimensions(img: DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let longest = width.max(height);
    if longest <= max_size {
        return img;
    }
    let ratio = f64::from(max_size) / f64::from(longest);
    let new_width = ((f64::from(width) * ratio) as u32).max(1);
    let new_height = ((f64::from(height) * ratio) as u32).max(1);
    img.resize(new_width, new_height, FilterType::Lanczos3)
}
