//! Pure calculation functions for thumbnail geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use thiserror::Error;

/// Target used when neither width nor height is requested.
pub const DEFAULT_TARGET: (u32, u32) = (200, 200);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("source image has no pixels ({0}x{1})")]
    EmptySource(u32, u32),
    #[error("requested {0} must be greater than zero")]
    ZeroTarget(&'static str),
}

/// Region of the source image kept before resizing, in source pixel
/// coordinates. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    /// The whole source image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Result of [`compute_crop_and_target`]: crop this box, then resize to
/// `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub crop: CropBox,
    pub width: u32,
    pub height: u32,
}

/// Compute the center crop and final size for a thumbnail.
///
/// - No request → [`DEFAULT_TARGET`].
/// - One side requested → the other is derived from the source aspect ratio.
/// - Target larger than the source on either axis → target becomes the
///   source size (never upscale).
/// - The crop keeps the full width (or height) of the source and trims the
///   other axis symmetrically so the crop has the target's aspect ratio.
///
/// # Examples
/// ```
/// # use lineage::imaging::{compute_crop_and_target, CropBox};
/// // 400x300 → 100x100: trim 50px from the left and right
/// let plan = compute_crop_and_target((400, 300), Some(100), Some(100)).unwrap();
/// assert_eq!(plan.crop, CropBox { left: 50, top: 0, right: 350, bottom: 300 });
/// assert_eq!((plan.width, plan.height), (100, 100));
/// ```
pub fn compute_crop_and_target(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Result<ResizePlan, GeometryError> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return Err(GeometryError::EmptySource(src_w, src_h));
    }
    if width == Some(0) {
        return Err(GeometryError::ZeroTarget("width"));
    }
    if height == Some(0) {
        return Err(GeometryError::ZeroTarget("height"));
    }

    let (tgt_w, tgt_h) = target_dimensions(source, width, height);
    let crop = center_crop(source, (tgt_w, tgt_h));

    Ok(ResizePlan {
        crop,
        width: tgt_w,
        height: tgt_h,
    })
}

/// Fill in the missing side and clamp to the source size.
fn target_dimensions(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (src_w, src_h) = (source.0 as f64, source.1 as f64);

    let (w, h) = match (width, height) {
        (None, None) => (DEFAULT_TARGET.0 as f64, DEFAULT_TARGET.1 as f64),
        (Some(w), None) => (w as f64, w as f64 * src_h / src_w),
        (None, Some(h)) => (h as f64 * src_w / src_h, h as f64),
        (Some(w), Some(h)) => (w as f64, h as f64),
    };

    if w > src_w || h > src_h {
        return source;
    }

    // Derived sides of very thin images can round down to nothing
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Largest centered box of the target's aspect ratio inside the source.
fn center_crop(source: (u32, u32), target: (u32, u32)) -> CropBox {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    // Compare tgt_w/tgt_h against src_w/src_h without float division
    let target_side = tgt_w as u64 * src_h as u64;
    let source_side = src_w as u64 * tgt_h as u64;
    let target_ratio = tgt_w as f64 / tgt_h as f64;

    if target_side > source_side {
        // Target is wider: keep full width, trim top and bottom
        let crop_h = src_w as f64 / target_ratio;
        let top = (src_h as f64 - crop_h) / 2.0;
        CropBox {
            left: 0,
            top: (top.round() as u32).min(src_h),
            right: src_w,
            bottom: ((top + crop_h).round() as u32).min(src_h),
        }
    } else if target_side < source_side {
        // Target is taller: keep full height, trim left and right
        let crop_w = src_h as f64 * target_ratio;
        let left = (src_w as f64 - crop_w) / 2.0;
        CropBox {
            left: (left.round() as u32).min(src_w),
            top: 0,
            right: ((left + crop_w).round() as u32).min(src_w),
            bottom: src_h,
        }
    } else {
        CropBox::full(src_w, src_h)
    }
}
