//! Elevation: promote a Generation into an independent Image.
//!
//! The new Image gets a copy of the Generation's processed bytes (its own
//! blob, so each record still owns exactly what it references), a fresh
//! thumbnail, and `generated_action` set to the Generation's action. It is
//! named `{Action}_{generation id}` and starts with no Generations of its own.
//! The source Generation is left untouched.

use crate::engine::{Engine, ImageDraft};
use crate::error::Result;
use crate::imaging::SourceFormat;
use crate::models::{GenerationId, Image, UserId};
use crate::store::{BlobStore, RecordStore};
use tracing::info;

impl<B: BlobStore, R: RecordStore> Engine<B, R> {
    pub fn elevate(&self, generation_id: GenerationId, acting_user: Option<UserId>) -> Result<Image> {
        let generation = self.generation(generation_id)?;
        let bytes = self.blobs().get(&generation.processed)?;
        let file_name = generation.processed.file_name().to_string();

        let mut prepared = self.prepare(bytes, &file_name, None)?;
        // Keep the stored extension, not whatever the bytes sniff as
        if let Ok(format) = SourceFormat::from_path(&generation.processed) {
            prepared.format = format;
        }

        let name = format!("{}_{}", generation.action.label(), generation.id);
        let draft = ImageDraft {
            hint: format!("image/{name}"),
            name,
            owner: acting_user,
            width: generation.width,
            height: generation.height,
            generated_action: Some(generation.action),
        };
        let image = self.persist_image(prepared, draft)?;

        info!(
            generation = %generation.id,
            image = %image.id,
            action = %generation.action,
            "elevated generation"
        );
        Ok(image)
    }
}
