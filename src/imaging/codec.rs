//! Decoding and encoding for the two accepted source formats.
//!
//! | Format | Extensions | Decode | Encode |
//! |---|---|---|---|
//! | PNG | `png` | `image::codecs::png` | `PngEncoder` (quality ignored) |
//! | JPEG | `jpg`, `jpeg` | `image::codecs::jpeg` | `JpegEncoder::new_with_quality` |
//!
//! Anything else is rejected with [`EngineError::UnsupportedFormat`] before a
//! decoder is even selected. Bytes that claim a supported format but fail to
//! decode are [`EngineError::CorruptImage`].

use super::params::Quality;
use crate::error::{EngineError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A decodable and encodable image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Png,
    Jpeg,
}

impl SourceFormat {
    /// Match a file extension (case-insensitive, leading dot allowed).
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim_start_matches('.');
        if ext.eq_ignore_ascii_case("png") {
            Ok(Self::Png)
        } else if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
            Ok(Self::Jpeg)
        } else {
            Err(EngineError::UnsupportedFormat(format!(
                "extension {ext:?} is not png or jpeg"
            )))
        }
    }

    /// Match the extension of a file name or blob handle.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            EngineError::UnsupportedFormat(format!("{} has no extension", path.display()))
        })?;
        Self::from_extension(ext)
    }

    /// Identify the format from the magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|e| EngineError::CorruptImage(format!("unrecognized image data: {e}")))?;
        match format {
            ImageFormat::Png => Ok(Self::Png),
            ImageFormat::Jpeg => Ok(Self::Jpeg),
            other => Err(EngineError::UnsupportedFormat(format!("{other:?}"))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Decode PNG or JPEG bytes.
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, SourceFormat)> {
    let format = SourceFormat::sniff(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format.image_format())
        .map_err(|e| EngineError::CorruptImage(e.to_string()))?;
    Ok((img, format))
}

/// Encode an image in the given format.
///
/// JPEG has no alpha channel and no 16-bit mode, so anything other than
/// 8-bit gray is converted to 8-bit RGB first.
pub fn encode(img: &DynamicImage, format: SourceFormat, quality: Quality) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let written = match format {
        SourceFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        SourceFormat::Jpeg => {
            // 0 and 1 both mean "smallest file" to callers; the encoder floor is 1
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value().max(1));
            match img.color() {
                ColorType::L8 | ColorType::Rgb8 => img.write_with_encoder(encoder),
                _ => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder),
            }
        }
    };
    written.map_err(|e| {
        EngineError::UnsupportedFormat(format!("{} encode failed: {e}", format.extension()))
    })?;
    Ok(buf)
}

/// Content type for a file: the explicit one when given, otherwise
/// `image/<suffix>` from the file name.
pub fn content_type_for(file_name: &str, explicit: Option<&str>) -> String {
    if let Some(ct) = explicit.filter(|ct| !ct.is_empty()) {
        return ct.to_string();
    }
    let suffix = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    format!("image/{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, png_bytes};

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(SourceFormat::from_extension("PNG").unwrap(), SourceFormat::Png);
        assert_eq!(SourceFormat::from_extension(".jpeg").unwrap(), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::from_extension("Jpg").unwrap(), SourceFormat::Jpeg);
    }

    #[test]
    fn other_extensions_are_unsupported() {
        for ext in ["gif", "webp", "tiff", ""] {
            assert!(matches!(
                SourceFormat::from_extension(ext),
                Err(EngineError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn from_path_reads_handle_extension() {
        assert_eq!(
            SourceFormat::from_path("image/dawn_20240101_120000.png").unwrap(),
            SourceFormat::Png
        );
        assert!(SourceFormat::from_path("image/noext").is_err());
    }

    #[test]
    fn sniff_identifies_formats() {
        assert_eq!(SourceFormat::sniff(&png_bytes(4, 4)).unwrap(), SourceFormat::Png);
        assert_eq!(SourceFormat::sniff(&jpeg_bytes(4, 4)).unwrap(), SourceFormat::Jpeg);
    }

    #[test]
    fn sniff_rejects_gif_as_unsupported() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        assert!(matches!(
            SourceFormat::sniff(gif),
            Err(EngineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(
            decode(b"definitely not an image"),
            Err(EngineError::CorruptImage(_))
        ));
    }

    #[test]
    fn truncated_png_is_corrupt() {
        let bytes = png_bytes(32, 32);
        assert!(matches!(
            decode(&bytes[..bytes.len() / 2]),
            Err(EngineError::CorruptImage(_))
        ));
    }

    #[test]
    fn png_roundtrip_is_lossless() {
        let (img, format) = decode(&png_bytes(20, 10)).unwrap();
        assert_eq!(format, SourceFormat::Png);
        let encoded = encode(&img, format, Quality::default()).unwrap();
        let (again, _) = decode(&encoded).unwrap();
        assert_eq!(img.to_rgb8(), again.to_rgb8());
    }

    #[test]
    fn jpeg_encode_flattens_alpha() {
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([10, 20, 30, 128]),
        ));
        let encoded = encode(&rgba, SourceFormat::Jpeg, Quality::new(90)).unwrap();
        let (decoded, format) = decode(&encoded).unwrap();
        assert_eq!(format, SourceFormat::Jpeg);
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn jpeg_encode_accepts_zero_quality() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 8, image::Rgb([90, 90, 90])));
        let encoded = encode(&img, SourceFormat::Jpeg, Quality::new(0)).unwrap();
        assert_eq!(decode(&encoded).unwrap().1, SourceFormat::Jpeg);
    }

    #[test]
    fn content_type_prefers_explicit() {
        assert_eq!(content_type_for("a.png", Some("image/x-custom")), "image/x-custom");
    }

    #[test]
    fn content_type_falls_back_to_suffix() {
        assert_eq!(content_type_for("photo.JPG", None), "image/jpg");
        assert_eq!(content_type_for("photo.png", Some("")), "image/png");
    }
}
