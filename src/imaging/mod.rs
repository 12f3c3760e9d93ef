//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff + decode** | `image::guess_format` + `load_from_memory_with_format` |
//! | **Crop geometry** | [`compute_crop_and_target`] (pure) |
//! | **Thumbnail** | `crop_imm` + `resize_exact` (Lanczos3) |
//! | **Encode** | `PngEncoder` / `JpegEncoder` in the source format |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop and target-size math (unit testable)
//! - **Parameters**: [`Quality`] and [`ThumbnailRequest`]
//! - **Codec**: PNG/JPEG decode, encode and content-type inference
//! - **Thumbnail**: color normalization + crop + resize

mod calculations;
pub mod codec;
mod params;
pub mod thumbnail;

pub use calculations::{CropBox, DEFAULT_TARGET, GeometryError, ResizePlan, compute_crop_and_target};
pub use codec::SourceFormat;
pub use params::{Quality, ThumbnailRequest};
pub use thumbnail::{Thumbnail, create_thumbnail, thumbnail_from_decoded};
