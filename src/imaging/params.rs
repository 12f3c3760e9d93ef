//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. The thumbnail
//! generator and the generation pipeline both take them so callers (config,
//! CLI, tests) never pass bare integers around.
//!
//! - [`Quality`]: lossy encoding quality (0–100). Clamped on construction.
//! - [`ThumbnailRequest`]: optional target width/height plus quality.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (0-100).
///
/// PNG output ignores it; JPEG output passes it to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// What a thumbnail should look like.
///
/// Leaving both sides unset produces the default 200x200 square; leaving one
/// unset derives it from the source aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Quality,
}

impl ThumbnailRequest {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            quality: Quality::default(),
        }
    }

    pub fn with_quality(self, quality: Quality) -> Self {
        Self { quality, ..self }
    }
}
