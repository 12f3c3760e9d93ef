//! Pixel work for each [`Transform`].
//!
//! Executors are pure: they read a decoded 8-bit RGB buffer and return either
//! a new buffer or [`DetectedInfo`]. Nothing here touches a store.
//!
//! | Transform | Crate / function |
//! |---|---|
//! | Crop (stretch) | `image::imageops::resize`, `Triangle` (bilinear) |
//! | Flip | `image::imageops::flip_vertical` / `flip_horizontal` |
//! | Rotate | `imageproc::geometric_transformations::rotate_about_center` |
//! | Blur mean / gaussian | `imageproc::filter::separable_filter_equal`, 5 taps |
//! | Blur median | `imageproc::filter::median_filter`, radius 2 (5x5) |

use super::{BlurMode, FlipAxis, Transform};
use crate::models::DetectedInfo;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::filter::{median_filter, separable_filter_equal};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tracing::debug;

/// 5-tap box kernel.
const MEAN_KERNEL: [f32; 5] = [0.2; 5];

/// 5-tap binomial kernel, the fixed 5x5 Gaussian used when no sigma is given.
const GAUSSIAN_KERNEL: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// Exposed corners after a rotation are filled with black.
const ROTATE_FILL: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutput {
    Image(RgbImage),
    Detected(DetectedInfo),
}

/// Run a transform against a decoded image.
pub fn execute(transform: &Transform, pixels: &RgbImage) -> TransformOutput {
    debug!(?transform, width = pixels.width(), height = pixels.height(), "executing transform");
    match *transform {
        Transform::Crop { width, height } => TransformOutput::Image(crop(pixels, width, height)),
        Transform::Flip(axis) => TransformOutput::Image(flip(pixels, axis)),
        Transform::Rotate { angle } => TransformOutput::Image(rotate(pixels, angle)),
        Transform::Blur(mode) => TransformOutput::Image(blur(pixels, mode)),
        Transform::Detect => TransformOutput::Detected(detect(pixels)),
    }
}

/// Resize to exactly `width` x `height`, ignoring aspect ratio.
pub fn crop(pixels: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(pixels, width, height, FilterType::Triangle)
}

pub fn flip(pixels: &RgbImage, axis: FlipAxis) -> RgbImage {
    match axis {
        FlipAxis::Vertical => imageops::flip_vertical(pixels),
        FlipAxis::Horizontal => imageops::flip_horizontal(pixels),
    }
}

/// Rotate counter-clockwise by `angle` degrees about the center, keeping the
/// source canvas size. Whole turns return the pixels unchanged.
pub fn rotate(pixels: &RgbImage, angle: i32) -> RgbImage {
    if angle.rem_euclid(360) == 0 {
        return pixels.clone();
    }
    // rotate_about_center turns clockwise for positive theta
    let theta = -(angle as f32).to_radians();
    rotate_about_center(pixels, theta, Interpolation::Bilinear, ROTATE_FILL)
}

pub fn blur(pixels: &RgbImage, mode: BlurMode) -> RgbImage {
    match mode {
        BlurMode::Mean => separable_filter_equal(pixels, &MEAN_KERNEL),
        BlurMode::Median => median_filter(pixels, 2, 2),
        BlurMode::Gaussian => separable_filter_equal(pixels, &GAUSSIAN_KERNEL),
    }
}

/// Dimensions plus the largest and smallest channel value in the buffer.
pub fn detect(pixels: &RgbImage) -> DetectedInfo {
    let raw = pixels.as_raw();
    DetectedInfo {
        width: pixels.width(),
        height: pixels.height(),
        max: raw.iter().copied().max().unwrap_or(0),
        min: raw.iter().copied().min().unwrap_or(0),
    }
}
