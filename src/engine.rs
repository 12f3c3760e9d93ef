//! The engine: stores, action registry and settings wired together.
//!
//! Every operation that touches a record lives on [`Engine`]. This module has
//! the Image-level operations (upload, lookup, rename, delete); the
//! transform pipeline and elevation add their methods in
//! [`pipeline`](crate::pipeline) and [`elevate`](crate::elevate).
//!
//! ## Blob ownership
//!
//! Each blob belongs to exactly one record. Operations that write blobs
//! before the record exists remove them again if the record cannot be
//! created, and deletes remove blobs through the store's [`OnDelete`] hook.
//! A failure to remove a blob during cleanup is logged, never raised: the
//! record operation has already succeeded or already failed with its own
//! error.

use crate::config::LineageConfig;
use crate::error::{EngineError, Result};
use crate::imaging::{Quality, SourceFormat, Thumbnail, ThumbnailRequest, codec, thumbnail_from_decoded};
use crate::models::{
    BlobHandle, Generation, GenerationDetail, GenerationId, Image, ImageDetail, ImageId, NewImage,
    UserId,
};
use crate::store::{
    BlobStore, DeletedRecord, FsBlobStore, LocalRecordStore, OnDelete, RecordStore,
};
use crate::transform::{Action, TransformRegistry};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};

/// Knobs the engine needs from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Thumbnail made for uploads and elevations.
    pub thumbnail: ThumbnailRequest,
    /// JPEG quality of transformed output.
    pub generation_quality: Quality,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&LineageConfig::default())
    }
}

impl From<&LineageConfig> for EngineSettings {
    fn from(config: &LineageConfig) -> Self {
        Self {
            thumbnail: config.thumbnail_request(),
            generation_quality: config.generation_quality(),
        }
    }
}

/// A file handed to [`Engine::upload`].
#[derive(Debug, Clone)]
pub struct Upload {
    pub owner: Option<UserId>,
    /// Display name. Defaults to the file stem.
    pub name: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            owner: None,
            name: None,
            file_name: file_name.into(),
            bytes,
            content_type: None,
        }
    }
}

/// Source bytes after validation: decoded dimensions and the thumbnail are
/// computed once here and carried to the persistence step.
#[derive(Debug)]
pub(crate) struct PreparedImage {
    pub bytes: Vec<u8>,
    pub format: SourceFormat,
    pub width: u32,
    pub height: u32,
    pub thumbnail: Thumbnail,
}

/// What to record about a prepared image once its blobs are stored.
#[derive(Debug)]
pub(crate) struct ImageDraft {
    pub name: String,
    pub owner: Option<UserId>,
    /// Blob name hint for the raw bytes, without extension.
    pub hint: String,
    pub width: u32,
    pub height: u32,
    pub generated_action: Option<Action>,
}

pub struct Engine<B, R> {
    blobs: B,
    records: R,
    registry: TransformRegistry,
    settings: EngineSettings,
}

impl Engine<FsBlobStore, LocalRecordStore> {
    /// Open the filesystem-backed engine rooted at `data_dir`:
    /// blobs under `blobs/`, records in `records.json`.
    pub fn open(data_dir: &Path, config: &LineageConfig) -> Result<Self> {
        let blobs = FsBlobStore::open(data_dir.join("blobs"))?;
        let records = LocalRecordStore::open(data_dir.join("records.json"))?;
        debug!(data_dir = %data_dir.display(), "opened engine");
        Ok(Self::new(blobs, records, EngineSettings::from(config)))
    }
}

impl<B: BlobStore, R: RecordStore> Engine<B, R> {
    pub fn new(blobs: B, records: R, settings: EngineSettings) -> Self {
        Self {
            blobs,
            records,
            registry: TransformRegistry::new(),
            settings,
        }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // =========================================================================
    // Upload
    // =========================================================================

    /// Store a new Image from PNG or JPEG bytes.
    ///
    /// The raw bytes are kept as uploaded; width and height come from
    /// decoding them.
    pub fn upload(&self, upload: Upload) -> Result<Image> {
        let Upload {
            owner,
            name,
            file_name,
            bytes,
            content_type,
        } = upload;

        let prepared = self.prepare(bytes, &file_name, content_type.as_deref())?;
        let stem = hint_stem(&file_name);
        let draft = ImageDraft {
            name: name.unwrap_or_else(|| stem.clone()),
            owner,
            hint: format!("image/{stem}_{}", Utc::now().format("%Y%m%d_%H%M%S")),
            width: prepared.width,
            height: prepared.height,
            generated_action: None,
        };
        let image = self.persist_image(prepared, draft)?;
        info!(image = %image.id, name = %image.name, "uploaded image");
        Ok(image)
    }

    /// Decode `bytes` and build the configured thumbnail.
    pub(crate) fn prepare(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<PreparedImage> {
        let (img, format) = codec::decode(&bytes)?;
        let (width, height) = (img.width(), img.height());
        let thumbnail = thumbnail_from_decoded(
            img,
            format,
            codec::content_type_for(file_name, content_type),
            &self.settings.thumbnail,
        )?;
        Ok(PreparedImage {
            bytes,
            format,
            width,
            height,
            thumbnail,
        })
    }

    /// Write the raw and thumbnail blobs, then the Image record. Blobs are
    /// removed again if a later step fails.
    pub(crate) fn persist_image(&self, prepared: PreparedImage, draft: ImageDraft) -> Result<Image> {
        let ext = prepared.format.extension();
        let raw = self
            .blobs
            .put(&prepared.bytes, &format!("{}.{ext}", draft.hint))?;

        let thumb_stem = draft.hint.rsplit('/').next().unwrap_or("thumbnail");
        let thumbnail = match self.blobs.put(
            &prepared.thumbnail.bytes,
            &format!("thumbnail/{thumb_stem}.{}", prepared.thumbnail.format.extension()),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                self.discard_blobs(&[&raw]);
                return Err(e.into());
            }
        };

        let new = NewImage {
            name: draft.name,
            owner: draft.owner,
            image: raw.clone(),
            thumbnail: thumbnail.clone(),
            width: draft.width,
            height: draft.height,
            generated_action: draft.generated_action,
        };
        match self.records.insert_image(new) {
            Ok(image) => Ok(image),
            Err(e) => {
                self.discard_blobs(&[&raw, &thumbnail]);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// All images, most recent first.
    pub fn images(&self) -> Result<Vec<Image>> {
        Ok(self.records.images()?)
    }

    pub fn image(&self, id: ImageId) -> Result<Image> {
        self.records.image(id)?.ok_or_else(|| image_not_found(id))
    }

    /// An Image with its Generations, most recent first.
    pub fn image_detail(&self, id: ImageId) -> Result<ImageDetail> {
        let image = self.image(id)?;
        let generations = self.records.generations_of(id)?;
        Ok(ImageDetail { image, generations })
    }

    pub fn generation(&self, id: GenerationId) -> Result<Generation> {
        self.records
            .generation(id)?
            .ok_or_else(|| generation_not_found(id))
    }

    /// A Generation with the Image it was derived from.
    pub fn generation_detail(&self, id: GenerationId) -> Result<GenerationDetail> {
        let generation = self.generation(id)?;
        let original_image = self.image(generation.original)?;
        Ok(GenerationDetail {
            generation,
            original_image,
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub fn rename_image(&self, id: ImageId, name: &str) -> Result<Image> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::invalid("name", "This field may not be blank."));
        }
        let image = self
            .records
            .update_image(id, &mut |image| image.name = name.to_string())?
            .ok_or_else(|| image_not_found(id))?;
        info!(image = %id, name, "renamed image");
        Ok(image)
    }

    /// Delete an Image, its Generations and every blob they own.
    pub fn delete_image(&self, id: ImageId) -> Result<()> {
        if !self.records.delete_image(id, &BlobCleanup(&self.blobs))? {
            return Err(image_not_found(id));
        }
        info!(image = %id, "deleted image");
        Ok(())
    }

    /// Delete several Images. Ids that do not exist are skipped; returns how
    /// many were deleted.
    pub fn delete_images(&self, ids: &[ImageId]) -> Result<usize> {
        let cleanup = BlobCleanup(&self.blobs);
        let mut deleted = 0;
        for &id in ids {
            if self.records.delete_image(id, &cleanup)? {
                deleted += 1;
            } else {
                debug!(image = %id, "bulk delete skipped missing image");
            }
        }
        info!(requested = ids.len(), deleted, "bulk deleted images");
        Ok(deleted)
    }

    /// Best-effort removal of blobs that no record will own.
    pub(crate) fn discard_blobs(&self, handles: &[&BlobHandle]) {
        for handle in handles {
            if let Err(e) = self.blobs.delete(handle) {
                warn!(blob = %handle, error = %e, "failed to remove orphaned blob");
            }
        }
    }
}

/// Deletes the blobs of each record the record store removes.
pub(crate) struct BlobCleanup<'a, B>(pub &'a B);

impl<B: BlobStore> OnDelete for BlobCleanup<'_, B> {
    fn on_delete(&self, record: DeletedRecord<'_>) {
        for handle in record.owned_blobs() {
            match self.0.delete(handle) {
                Ok(()) => debug!(blob = %handle, "removed blob"),
                Err(e) => warn!(blob = %handle, error = %e, "failed to remove blob"),
            }
        }
    }
}

pub(crate) fn image_not_found(id: ImageId) -> EngineError {
    EngineError::NotFound {
        kind: ImageId::KIND,
        id: id.0,
    }
}

pub(crate) fn generation_not_found(id: GenerationId) -> EngineError {
    EngineError::NotFound {
        kind: GenerationId::KIND,
        id: id.0,
    }
}

/// File stem reduced to characters that are safe in a blob name.
fn hint_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use crate::test_helpers::{FailingRecords, jpeg_bytes, memory_engine, png_bytes};
    use crate::transform::ActionParams;

    // =========================================================================
    // Upload
    // =========================================================================

    #[test]
    fn upload_records_decoded_dimensions() {
        let engine = memory_engine();
        let image = engine
            .upload(Upload::new("dawn.png", png_bytes(300, 200)))
            .unwrap();
        assert_eq!((image.width, image.height), (300, 200));
        assert_eq!(image.name, "dawn");
        assert_eq!(image.generation_count, 0);
        assert!(image.generated_action.is_none());
    }

    #[test]
    fn upload_keeps_raw_bytes_and_stores_thumbnail() {
        let engine = memory_engine();
        let bytes = jpeg_bytes(400, 300);
        let image = engine
            .upload(Upload::new("dusk.jpg", bytes.clone()))
            .unwrap();

        assert_eq!(engine.blobs().get(&image.image).unwrap(), bytes);
        assert!(image.image.as_str().starts_with("image/dusk_"));
        assert!(image.image.as_str().ends_with(".jpg"));

        let (thumb, format) = codec::decode(&engine.blobs().get(&image.thumbnail).unwrap()).unwrap();
        assert_eq!(format, SourceFormat::Jpeg);
        assert_eq!((thumb.width(), thumb.height()), (128, 128));
        assert!(image.thumbnail.as_str().starts_with("thumbnail/"));
    }

    #[test]
    fn upload_uses_explicit_name_and_owner() {
        let engine = memory_engine();
        let image = engine
            .upload(Upload {
                owner: Some(UserId(9)),
                name: Some("Sunrise".into()),
                ..Upload::new("IMG 0001.png", png_bytes(10, 10))
            })
            .unwrap();
        assert_eq!(image.name, "Sunrise");
        assert_eq!(image.owner, Some(UserId(9)));
        assert!(image.image.as_str().starts_with("image/IMG_0001_"));
    }

    #[test]
    fn upload_rejects_garbage() {
        let engine = memory_engine();
        let err = engine
            .upload(Upload::new("notes.png", b"definitely not an image".to_vec()))
            .unwrap_err();
        assert!(matches!(err, EngineError::CorruptImage(_)));
        assert!(engine.blobs().is_empty());
    }

    #[test]
    fn upload_rejects_unsupported_format() {
        let engine = memory_engine();
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        let err = engine.upload(Upload::new("a.gif", gif)).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(_)));
    }

    #[test]
    fn failed_record_insert_removes_blobs() {
        let engine = Engine::new(
            MemoryBlobStore::new(),
            FailingRecords::failing_image_insert(),
            EngineSettings::default(),
        );
        let err = engine
            .upload(Upload::new("a.png", png_bytes(20, 20)))
            .unwrap_err();
        assert!(matches!(err, EngineError::StorageFailure(_)));
        assert!(engine.blobs().is_empty());
    }

    // =========================================================================
    // Lookup and rename
    // =========================================================================

    #[test]
    fn missing_image_is_not_found() {
        let engine = memory_engine();
        let err = engine.image(ImageId(42)).unwrap_err();
        assert_eq!(err.to_string(), "Image 42 not found");
    }

    #[test]
    fn missing_generation_is_not_found() {
        let engine = memory_engine();
        let err = engine.generation_detail(GenerationId(3)).unwrap_err();
        assert_eq!(err.to_string(), "Generation 3 not found");
    }

    #[test]
    fn images_are_most_recent_first() {
        let engine = memory_engine();
        engine.upload(Upload::new("a.png", png_bytes(8, 8))).unwrap();
        engine.upload(Upload::new("b.png", png_bytes(8, 8))).unwrap();
        let names: Vec<_> = engine.images().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn rename_updates_name() {
        let engine = memory_engine();
        let image = engine.upload(Upload::new("a.png", png_bytes(8, 8))).unwrap();
        let renamed = engine.rename_image(image.id, "  Harbor ").unwrap();
        assert_eq!(renamed.name, "Harbor");
        assert_eq!(engine.image(image.id).unwrap().name, "Harbor");
    }

    #[test]
    fn rename_rejects_blank_name() {
        let engine = memory_engine();
        let image = engine.upload(Upload::new("a.png", png_bytes(8, 8))).unwrap();
        assert!(matches!(
            engine.rename_image(image.id, "   "),
            Err(EngineError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rename_missing_image_is_not_found() {
        let engine = memory_engine();
        assert!(matches!(
            engine.rename_image(ImageId(1), "x"),
            Err(EngineError::NotFound { .. })
        ));
    }

    // =========================================================================
    // Delete
    // =========================================================================

    #[test]
    fn delete_image_removes_every_blob() {
        let engine = memory_engine();
        let image = engine.upload(Upload::new("a.png", png_bytes(30, 20))).unwrap();
        let params = ActionParams::new().with("axis", 0);
        engine.apply(image.id, "flip", &params).unwrap();
        engine.apply(image.id, "flip", &params).unwrap();
        assert_eq!(engine.blobs().len(), 4);

        engine.delete_image(image.id).unwrap();
        assert!(engine.blobs().is_empty());
        assert!(engine.records().images().unwrap().is_empty());
        assert!(engine.records().generations_of(image.id).unwrap().is_empty());
    }

    #[test]
    fn delete_missing_image_is_not_found() {
        let engine = memory_engine();
        assert!(matches!(
            engine.delete_image(ImageId(7)),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn bulk_delete_skips_missing_ids() {
        let engine = memory_engine();
        let a = engine.upload(Upload::new("a.png", png_bytes(8, 8))).unwrap();
        let b = engine.upload(Upload::new("b.png", png_bytes(8, 8))).unwrap();
        let keep = engine.upload(Upload::new("c.png", png_bytes(8, 8))).unwrap();

        let deleted = engine.delete_images(&[a.id, ImageId(99), b.id]).unwrap();
        assert_eq!(deleted, 2);

        let remaining: Vec<_> = engine.images().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![keep.id]);
        assert_eq!(engine.blobs().len(), 2);
    }

    #[test]
    fn deleting_an_elevated_image_keeps_its_source_generation() {
        let engine = memory_engine();
        let image = engine.upload(Upload::new("a.png", png_bytes(20, 20))).unwrap();
        let generation = engine
            .apply(image.id, "blur", &ActionParams::new().with("mode", "mean"))
            .unwrap()
            .into_generation()
            .unwrap();
        let elevated = engine.elevate(generation.generation.id, None).unwrap();
        assert_eq!(elevated.generated_action, Some(Action::Blur));

        engine.delete_image(elevated.id).unwrap();
        let still_there = engine.generation(generation.generation.id).unwrap();
        assert!(engine.blobs().contains(&still_there.processed).unwrap());
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn hint_stem_sanitizes() {
        assert_eq!(hint_stem("dawn.png"), "dawn");
        assert_eq!(hint_stem("my photo (1).jpg"), "my_photo__1_");
        assert_eq!(hint_stem("../../etc.png"), "etc");
        assert_eq!(hint_stem("___.png"), "image");
        assert_eq!(hint_stem(""), "image");
    }

    #[test]
    fn settings_follow_config() {
        let mut config = LineageConfig::default();
        config.thumbnails.width = 64;
        config.generations.quality = 50;
        let settings = EngineSettings::from(&config);
        assert_eq!(settings.thumbnail.width, Some(64));
        assert_eq!(settings.generation_quality, Quality(50));
    }
}
