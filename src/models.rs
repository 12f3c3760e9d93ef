//! Records owned by the record store and returned to callers.
//!
//! An [`Image`] is a first-class upload. A [`Generation`] is an immutable
//! derived image produced by applying one action to an Image; it always
//! points back at that Image through `original`. Lineage is one hop deep:
//! elevating a Generation creates a fresh Image with no link back.

use crate::transform::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

macro_rules! record_id {
    ($name:ident, $kind:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const KIND: &'static str = $kind;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(ImageId, "Image");
record_id!(GenerationId, "Generation");
record_id!(UserId, "User");

/// Opaque reference to bytes in a [`BlobStore`](crate::store::BlobStore).
///
/// Handles are relative paths (`generation/crop/crop_3fa9c2e1d07b4a46a8e1c05f92b7d360.png`);
/// their extension is the stored file's format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        Path::new(&self.0)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.0)
    }
}

impl AsRef<Path> for BlobHandle {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pixel statistics written onto an Image by the `detect` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedInfo {
    pub width: u32,
    pub height: u32,
    pub max: u8,
    pub min: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub name: String,
    /// Cleared (not cascaded) when the owning user goes away.
    pub owner: Option<UserId>,
    pub image: BlobHandle,
    pub thumbnail: BlobHandle,
    /// Decoded dimensions of `image`.
    pub width: u32,
    pub height: u32,
    /// Set when this Image was elevated from a Generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_action: Option<Action>,
    /// Number of Generations ever produced from this Image. Never decremented.
    pub generation_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_info: Option<DetectedInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub id: GenerationId,
    pub action: Action,
    /// The Image this Generation was derived from.
    pub original: ImageId,
    pub processed: BlobHandle,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create an [`Image`]; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub name: String,
    pub owner: Option<UserId>,
    pub image: BlobHandle,
    pub thumbnail: BlobHandle,
    pub width: u32,
    pub height: u32,
    pub generated_action: Option<Action>,
}

/// Fields needed to create a [`Generation`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewGeneration {
    pub action: Action,
    pub original: ImageId,
    pub processed: BlobHandle,
    pub width: u32,
    pub height: u32,
}

/// An Image together with its Generations, most recent first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageDetail {
    #[serde(flatten)]
    pub image: Image,
    pub generations: Vec<Generation>,
}

/// A Generation together with the Image it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationDetail {
    #[serde(flatten)]
    pub generation: Generation,
    pub original_image: Image,
}
