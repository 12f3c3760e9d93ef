//! Thumbnail generation: decode, normalize color, center-crop, resize, re-encode.
//!
//! The output keeps the source format (a PNG upload gets a PNG thumbnail) and
//! is resized with Lanczos3 after the crop computed by
//! [`compute_crop_and_target`].

use super::calculations::{GeometryError, compute_crop_and_target};
use super::codec::{self, SourceFormat};
use super::params::ThumbnailRequest;
use crate::error::{EngineError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// An encoded thumbnail ready to be written to a blob store.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub format: SourceFormat,
    pub width: u32,
    pub height: u32,
}

impl From<GeometryError> for EngineError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::EmptySource(..) => EngineError::CorruptImage(err.to_string()),
            GeometryError::ZeroTarget(side) => EngineError::invalid(side, err.to_string()),
        }
    }
}

/// Create a thumbnail from encoded PNG or JPEG bytes.
///
/// `file_name` and `content_type` only feed the returned content type; the
/// format itself is sniffed from the bytes.
pub fn create_thumbnail(
    bytes: &[u8],
    file_name: &str,
    content_type: Option<&str>,
    request: &ThumbnailRequest,
) -> Result<Thumbnail> {
    let (img, format) = codec::decode(bytes)?;
    thumbnail_from_decoded(
        img,
        format,
        codec::content_type_for(file_name, content_type),
        request,
    )
}

/// Same as [`create_thumbnail`] for a caller that already decoded the source.
pub fn thumbnail_from_decoded(
    img: DynamicImage,
    format: SourceFormat,
    content_type: String,
    request: &ThumbnailRequest,
) -> Result<Thumbnail> {
    let resized = render_thumbnail(img, request)?;
    let encoded = codec::encode(&resized, format, request.quality)?;

    Ok(Thumbnail {
        bytes: encoded,
        content_type,
        format,
        width: resized.width(),
        height: resized.height(),
    })
}

/// Crop and resize an already decoded image.
pub fn render_thumbnail(img: DynamicImage, request: &ThumbnailRequest) -> Result<DynamicImage> {
    let img = normalize_color(img);
    let plan = compute_crop_and_target((img.width(), img.height()), request.width, request.height)?;

    let region = if plan.crop.is_full(img.width(), img.height()) {
        img
    } else {
        img.crop_imm(
            plan.crop.left,
            plan.crop.top,
            plan.crop.width(),
            plan.crop.height(),
        )
    };

    Ok(region.resize_exact(plan.width, plan.height, FilterType::Lanczos3))
}

/// Gray and RGB pass through, RGBA is composited onto white, and every other
/// color type is converted to 8-bit RGB.
pub fn normalize_color(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        DynamicImage::ImageRgba8(rgba) => {
            let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                let [r, g, b, a] = rgba.get_pixel(x, y).0;
                image::Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
            });
            DynamicImage::ImageRgb8(flattened)
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((channel as u32 * a + 255 * (255 - a) + 127) / 255) as u8
}
