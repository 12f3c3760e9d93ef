//! Generation pipeline: apply a named action to a stored Image.
//!
//! Each request walks through explicit stages, each one a value handed to the
//! next:
//!
//! ```text
//! Requested ──lookup──> source Image ──resolve──> Transform
//!     ──decode──> Decoded ──execute──> pixels | DetectedInfo
//!     ──encode──> Encoded ──persist──> Generation      (image actions)
//!                         ──update───> Image           (detect)
//! ```
//!
//! Any failure before persistence rejects the request without touching a
//! store. During persistence the processed blob is written first; if the
//! Generation record cannot be created the blob is removed again, and if the
//! source's `generation_count` cannot be bumped the Generation is removed
//! with it. Nothing is retried.
//!
//! Requests are independent, so [`Engine::apply_batch`] fans them out over
//! the rayon pool. Pixel buffers are never shared between requests.

use crate::engine::{BlobCleanup, Engine, generation_not_found, image_not_found};
use crate::error::Result;
use crate::imaging::{SourceFormat, codec};
use crate::models::{
    DetectedInfo, Generation, GenerationDetail, GenerationId, Image, ImageId, NewGeneration,
};
use crate::store::{BlobStore, RecordStore};
use crate::transform::{Action, ActionParams, TransformOutput, execute};
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Result of applying an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// An image-producing action created a new Generation.
    Generated(GenerationDetail),
    /// `detect` updated the source Image.
    Detected(Image),
}

impl ActionOutcome {
    pub fn into_generation(self) -> Option<GenerationDetail> {
        match self {
            ActionOutcome::Generated(detail) => Some(detail),
            ActionOutcome::Detected(_) => None,
        }
    }

    pub fn into_image(self) -> Option<Image> {
        match self {
            ActionOutcome::Detected(image) => Some(image),
            ActionOutcome::Generated(_) => None,
        }
    }
}

/// One entry of a batch.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub image: ImageId,
    pub action: String,
    pub params: ActionParams,
}

impl ActionRequest {
    pub fn new(image: ImageId, action: impl Into<String>, params: ActionParams) -> Self {
        Self {
            image,
            action: action.into(),
            params,
        }
    }
}

/// Source pixels plus the format its blob was stored in.
struct Decoded {
    source: Image,
    format: SourceFormat,
    pixels: RgbImage,
}

/// Transformed pixels, encoded and ready to store.
struct Encoded {
    action: Action,
    format: SourceFormat,
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl<B: BlobStore, R: RecordStore> Engine<B, R> {
    /// Apply `action` (matched case-insensitively) with `params` to an Image.
    pub fn apply(
        &self,
        image_id: ImageId,
        action: &str,
        params: &ActionParams,
    ) -> Result<ActionOutcome> {
        let source = self.image(image_id)?;
        let transform = self.registry().resolve(action, params)?;
        let decoded = self.decode_source(source)?;

        match execute(&transform, &decoded.pixels) {
            TransformOutput::Image(pixels) => {
                let encoded = self.encode_output(transform.action(), decoded.format, pixels)?;
                self.persist_generation(decoded.source, encoded)
                    .map(ActionOutcome::Generated)
            }
            TransformOutput::Detected(info) => self
                .record_detection(decoded.source.id, info)
                .map(ActionOutcome::Detected),
        }
    }

    /// Apply many requests in parallel. Results are in request order.
    pub fn apply_batch(&self, requests: &[ActionRequest]) -> Vec<Result<ActionOutcome>> {
        requests
            .par_iter()
            .map(|req| self.apply(req.image, &req.action, &req.params))
            .collect()
    }

    fn decode_source(&self, source: Image) -> Result<Decoded> {
        let bytes = self.blobs().get(&source.image)?;
        let (img, sniffed) = codec::decode(&bytes)?;
        // Output follows the stored file's extension
        let format = SourceFormat::from_path(&source.image).unwrap_or(sniffed);
        debug!(image = %source.id, width = img.width(), height = img.height(), "decoded source");
        Ok(Decoded {
            source,
            format,
            pixels: img.to_rgb8(),
        })
    }

    fn encode_output(
        &self,
        action: Action,
        format: SourceFormat,
        pixels: RgbImage,
    ) -> Result<Encoded> {
        let (width, height) = pixels.dimensions();
        let bytes = codec::encode(
            &DynamicImage::ImageRgb8(pixels),
            format,
            self.settings().generation_quality,
        )?;
        Ok(Encoded {
            action,
            format,
            bytes,
            width,
            height,
        })
    }

    fn persist_generation(&self, source: Image, encoded: Encoded) -> Result<GenerationDetail> {
        let name = encoded.action.name();
        let hint = format!("generation/{name}/{name}.{}", encoded.format.extension());
        let processed = self.blobs().put(&encoded.bytes, &hint)?;

        let new = NewGeneration {
            action: encoded.action,
            original: source.id,
            processed: processed.clone(),
            width: encoded.width,
            height: encoded.height,
        };
        let generation = match self.records().insert_generation(new) {
            Ok(generation) => generation,
            Err(e) => {
                warn!(image = %source.id, error = %e, "generation record failed, removing blob");
                self.discard_blobs(&[&processed]);
                return Err(e.into());
            }
        };

        let original_image = match self.records().increment_generation_count(source.id) {
            Ok(Some(image)) => image,
            Ok(None) => {
                self.undo_generation(&generation);
                return Err(image_not_found(source.id));
            }
            Err(e) => {
                warn!(image = %source.id, error = %e, "generation count update failed");
                self.undo_generation(&generation);
                return Err(e.into());
            }
        };

        info!(
            generation = %generation.id,
            image = %source.id,
            action = %generation.action,
            "created generation"
        );
        Ok(GenerationDetail {
            generation,
            original_image,
        })
    }

    fn undo_generation(&self, generation: &Generation) {
        match self
            .records()
            .delete_generation(generation.id, &BlobCleanup(self.blobs()))
        {
            Ok(true) => {}
            // Already gone with its source; its blob went through the hook.
            Ok(false) => debug!(generation = %generation.id, "generation already removed"),
            Err(e) => {
                warn!(generation = %generation.id, error = %e, "failed to remove generation");
                self.discard_blobs(&[&generation.processed]);
            }
        }
    }

    fn record_detection(&self, id: ImageId, info: DetectedInfo) -> Result<Image> {
        let image = self
            .records()
            .update_image(id, &mut |image| image.detected_info = Some(info))?
            .ok_or_else(|| image_not_found(id))?;
        info!(image = %id, max = info.max, min = info.min, "recorded detection");
        Ok(image)
    }

    /// Bytes of a Generation's processed image.
    pub fn generation_bytes(&self, id: GenerationId) -> Result<Vec<u8>> {
        let generation = self
            .records()
            .generation(id)?
            .ok_or_else(|| generation_not_found(id))?;
        Ok(self.blobs().get(&generation.processed)?)
    }
}
