//! Shared test utilities for the lineage test suite.
//!
//! Provides in-memory fixture images, an in-memory engine, and a record
//! store wrapper that fails on demand for exercising cleanup paths.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let engine = memory_engine();
//! let image = engine.upload(Upload::new("dawn.png", png_bytes(64, 48))).unwrap();
//! assert_eq!((image.width, image.height), (64, 48));
//! ```

use crate::engine::{Engine, EngineSettings};
use crate::imaging::{Quality, SourceFormat, codec};
use crate::models::{Generation, GenerationId, Image, ImageId, NewGeneration, NewImage};
use crate::store::{LocalRecordStore, MemoryBlobStore, OnDelete, RecordStore, StoreError};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::sync::atomic::{AtomicBool, Ordering};

// =========================================================================
// Fixture images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// An RGB gradient encoded as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    codec::encode(
        &DynamicImage::ImageRgb8(gradient(width, height)),
        SourceFormat::Png,
        Quality::default(),
    )
    .unwrap()
}

/// An RGB gradient encoded as JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    codec::encode(
        &DynamicImage::ImageRgb8(gradient(width, height)),
        SourceFormat::Jpeg,
        Quality::new(90),
    )
    .unwrap()
}

/// A PNG with an alpha channel: opaque on the left half, transparent on the right.
pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        let alpha = if x < width / 2 { 255 } else { 0 };
        Rgba([200, 40, 40, alpha])
    });
    codec::encode(&DynamicImage::ImageRgba8(img), SourceFormat::Png, Quality::default()).unwrap()
}

// =========================================================================
// Engines
// =========================================================================

/// An engine over in-memory stores with default settings.
pub fn memory_engine() -> Engine<MemoryBlobStore, LocalRecordStore> {
    Engine::new(
        MemoryBlobStore::new(),
        LocalRecordStore::in_memory(),
        EngineSettings::default(),
    )
}

// =========================================================================
// Failure injection
// =========================================================================

/// A [`LocalRecordStore`] whose writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FailingRecords {
    inner: LocalRecordStore,
    image_insert: AtomicBool,
    generation_insert: AtomicBool,
    increment: AtomicBool,
}

impl FailingRecords {
    pub fn failing_image_insert() -> Self {
        let records = Self::default();
        records.fail_image_insert(true);
        records
    }

    pub fn fail_image_insert(&self, fail: bool) {
        self.image_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_generation_insert(&self, fail: bool) {
        self.generation_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_increment(&self, fail: bool) {
        self.increment.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Rejected(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FailingRecords {
    fn insert_image(&self, new: NewImage) -> Result<Image, StoreError> {
        Self::check(&self.image_insert, "image insert")?;
        self.inner.insert_image(new)
    }

    fn image(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        self.inner.image(id)
    }

    fn images(&self) -> Result<Vec<Image>, StoreError> {
        self.inner.images()
    }

    fn update_image(
        &self,
        id: ImageId,
        change: &mut dyn FnMut(&mut Image),
    ) -> Result<Option<Image>, StoreError> {
        self.inner.update_image(id, change)
    }

    fn increment_generation_count(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        Self::check(&self.increment, "increment")?;
        self.inner.increment_generation_count(id)
    }

    fn delete_image(&self, id: ImageId, hook: &dyn OnDelete) -> Result<bool, StoreError> {
        self.inner.delete_image(id, hook)
    }

    fn insert_generation(&self, new: NewGeneration) -> Result<Generation, StoreError> {
        Self::check(&self.generation_insert, "generation insert")?;
        self.inner.insert_generation(new)
    }

    fn generation(&self, id: GenerationId) -> Result<Option<Generation>, StoreError> {
        self.inner.generation(id)
    }

    fn generations_of(&self, original: ImageId) -> Result<Vec<Generation>, StoreError> {
        self.inner.generations_of(original)
    }

    fn delete_generation(
        &self,
        id: GenerationId,
        hook: &dyn OnDelete,
    ) -> Result<bool, StoreError> {
        self.inner.delete_generation(id, hook)
    }
}
