//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every record leads with its identity (id and name), followed by indented
//! context lines for blobs, dimensions and lineage. Blob handles are
//! secondary: they are how you find the bytes, not what the record is.
//!
//! ```text
//! #3 harbor (640x480)
//!     Source: image/harbor_20260114_093012_5f0c2a9be1d34a7c8e2b61f0d93c5a17.jpg
//!     Thumbnail: thumbnail/harbor_20260114_093012_0b7d91ce42a64f3587c1e0a9d26b3f48.jpg
//!     Generations: 2
//!     Detected: 640x480, max 255, min 0
//!     #5 BLUR (640x480)
//!         Output: generation/blur/blur_c3e8a1f04b6d4975a0e2c7f1b85d3e69.jpg
//!     #4 CROP (100x100)
//!         Output: generation/crop/crop_9a4f0e2d61b74853b6c0e9a2f17d5c30.jpg
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::models::{Generation, Image, ImageDetail};
use crate::pipeline::ActionOutcome;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn dimensions(width: u32, height: u32) -> String {
    format!("{width}x{height}")
}

/// `#3 harbor (640x480)`
fn image_header(image: &Image) -> String {
    format!(
        "#{} {} ({})",
        image.id,
        image.name,
        dimensions(image.width, image.height)
    )
}

/// `#4 CROP (100x100)`
fn generation_header(generation: &Generation) -> String {
    format!(
        "#{} {} ({})",
        generation.id,
        generation.action,
        dimensions(generation.width, generation.height)
    )
}

fn image_lines(image: &Image, depth: usize) -> Vec<String> {
    let pad = indent(depth);
    let mut lines = vec![format!("{pad}{}", image_header(image))];
    lines.push(format!("{pad}    Source: {}", image.image));
    lines.push(format!("{pad}    Thumbnail: {}", image.thumbnail));
    if let Some(owner) = image.owner {
        lines.push(format!("{pad}    Owner: {owner}"));
    }
    if let Some(action) = image.generated_action {
        lines.push(format!("{pad}    Elevated from: {action}"));
    }
    lines.push(format!("{pad}    Generations: {}", image.generation_count));
    if let Some(info) = &image.detected_info {
        lines.push(format!(
            "{pad}    Detected: {}, max {}, min {}",
            dimensions(info.width, info.height),
            info.max,
            info.min
        ));
    }
    lines
}

fn generation_lines(generation: &Generation, depth: usize) -> Vec<String> {
    let pad = indent(depth);
    vec![
        format!("{pad}{}", generation_header(generation)),
        format!("{pad}    Output: {}", generation.processed),
    ]
}

// ============================================================================
// Images
// ============================================================================

/// All images, one header per image.
pub fn format_image_list(images: &[Image]) -> Vec<String> {
    if images.is_empty() {
        return vec!["No images".to_string()];
    }
    images.iter().map(image_header).collect()
}

pub fn print_image_list(images: &[Image]) {
    for line in format_image_list(images) {
        println!("{}", line);
    }
}

pub fn format_image(image: &Image) -> Vec<String> {
    image_lines(image, 0)
}

pub fn print_image(image: &Image) {
    for line in format_image(image) {
        println!("{}", line);
    }
}

/// An image followed by its generations, most recent first.
pub fn format_image_detail(detail: &ImageDetail) -> Vec<String> {
    let mut lines = image_lines(&detail.image, 0);
    for generation in &detail.generations {
        lines.extend(generation_lines(generation, 1));
    }
    lines
}

pub fn print_image_detail(detail: &ImageDetail) {
    for line in format_image_detail(detail) {
        println!("{}", line);
    }
}

// ============================================================================
// Actions
// ============================================================================

pub fn format_outcome(outcome: &ActionOutcome) -> Vec<String> {
    match outcome {
        ActionOutcome::Generated(detail) => {
            let mut lines = generation_lines(&detail.generation, 0);
            lines.push(format!(
                "    From: {}",
                image_header(&detail.original_image)
            ));
            lines
        }
        ActionOutcome::Detected(image) => image_lines(image, 0),
    }
}

pub fn print_outcome(outcome: &ActionOutcome) {
    for line in format_outcome(outcome) {
        println!("{}", line);
    }
}

/// `Deleted 2 of 3 images`
pub fn format_delete_summary(deleted: usize, requested: usize) -> String {
    let noun = if requested == 1 { "image" } else { "images" };
    format!("Deleted {deleted} of {requested} {noun}")
}
