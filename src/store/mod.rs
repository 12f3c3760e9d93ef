//! Storage collaborators: where bytes live and where records live.
//!
//! The engine only talks to the two traits defined here, so deployments can
//! plug in object storage or a database. Two local implementations ship with
//! the crate:
//!
//! - [`MemoryBlobStore`] / [`FsBlobStore`] for bytes
//! - [`LocalRecordStore`] for records (in memory, optionally persisted as JSON)
//!
//! ## Contracts
//!
//! - **Blob put** never overwrites: every call returns a fresh handle.
//! - **Blob delete** is idempotent: deleting a missing handle is `Ok(())`.
//! - **Record delete** of an Image cascades to its Generations. Once the
//!   delete is committed, the store calls the caller's [`OnDelete`] hook
//!   with each removed record so the owned blobs can be removed too. A
//!   delete that fails never reaches the hook.
//! - **`increment_generation_count`** is an atomic read-modify-write.

pub mod blob;
pub mod records;

pub use blob::{FsBlobStore, MemoryBlobStore};
pub use records::LocalRecordStore;

use crate::models::{
    BlobHandle, Generation, GenerationId, Image, ImageId, NewGeneration, NewImage,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Blob not found: {0}")]
    MissingBlob(BlobHandle),
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Byte storage addressed by opaque handles.
pub trait BlobStore: Send + Sync {
    /// Store bytes under a new handle derived from `name_hint`
    /// (e.g. `generation/crop/crop.png`). The hint's directory and extension
    /// are kept; the file stem gets a unique suffix.
    fn put(&self, bytes: &[u8], name_hint: &str) -> Result<BlobHandle, StoreError>;

    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>, StoreError>;

    /// Remove a blob. Missing handles are not an error.
    fn delete(&self, handle: &BlobHandle) -> Result<(), StoreError>;

    fn contains(&self, handle: &BlobHandle) -> Result<bool, StoreError>;

    /// Every stored handle, sorted.
    fn handles(&self) -> Result<Vec<BlobHandle>, StoreError>;
}

/// A record removed by the record store.
#[derive(Debug, Clone, Copy)]
pub enum DeletedRecord<'a> {
    Image(&'a Image),
    Generation(&'a Generation),
}

impl DeletedRecord<'_> {
    /// Blobs owned exclusively by this record.
    pub fn owned_blobs(&self) -> Vec<&BlobHandle> {
        match self {
            DeletedRecord::Image(image) => vec![&image.image, &image.thumbnail],
            DeletedRecord::Generation(generation) => vec![&generation.processed],
        }
    }
}

/// Callback invoked by a [`RecordStore`] for each record removed by a
/// (possibly cascading) delete, after the delete has been committed.
pub trait OnDelete {
    fn on_delete(&self, record: DeletedRecord<'_>);
}

/// Typed record storage with cascade delete and an atomic counter.
pub trait RecordStore: Send + Sync {
    fn insert_image(&self, new: NewImage) -> Result<Image, StoreError>;

    fn image(&self, id: ImageId) -> Result<Option<Image>, StoreError>;

    /// All images, most recent first.
    fn images(&self) -> Result<Vec<Image>, StoreError>;

    /// Apply `change` to a stored image under the store's row lock and bump
    /// `updated_at`. Returns `None` when the image does not exist.
    fn update_image(
        &self,
        id: ImageId,
        change: &mut dyn FnMut(&mut Image),
    ) -> Result<Option<Image>, StoreError>;

    /// Atomically add one to `generation_count`, returning the updated image.
    fn increment_generation_count(&self, id: ImageId) -> Result<Option<Image>, StoreError>;

    /// Delete an image and, first, all of its generations. Returns `false`
    /// when the image does not exist.
    fn delete_image(&self, id: ImageId, hook: &dyn OnDelete) -> Result<bool, StoreError>;

    fn insert_generation(&self, new: NewGeneration) -> Result<Generation, StoreError>;

    fn generation(&self, id: GenerationId) -> Result<Option<Generation>, StoreError>;

    /// Generations derived from `original`, most recent first.
    fn generations_of(&self, original: ImageId) -> Result<Vec<Generation>, StoreError>;

    fn delete_generation(&self, id: GenerationId, hook: &dyn OnDelete)
    -> Result<bool, StoreError>;
}
