//! Local record store: two tables behind a mutex, optionally persisted.
//!
//! With a path, every successful mutation rewrites `records.json`
//! (write to a temp file, then rename). If that write fails the in-memory
//! tables are restored, so memory and disk never disagree.
//!
//! Ids are assigned from per-table counters that are never reused, so
//! "most recent first" is simply descending id.

use super::{DeletedRecord, OnDelete, RecordStore, StoreError};
use crate::models::{Generation, GenerationId, Image, ImageId, NewGeneration, NewImage};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Version of the on-disk format. Files with another version are rejected.
const RECORDS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tables {
    version: u32,
    next_image_id: u64,
    next_generation_id: u64,
    images: BTreeMap<ImageId, Image>,
    generations: BTreeMap<GenerationId, Generation>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            version: RECORDS_VERSION,
            next_image_id: 1,
            next_generation_id: 1,
            images: BTreeMap::new(),
            generations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LocalRecordStore {
    tables: Mutex<Tables>,
    path: Option<PathBuf>,
}

impl LocalRecordStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a JSON-backed store, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = match fs::read_to_string(&path) {
            Ok(content) => {
                let tables: Tables = serde_json::from_str(&content)?;
                if tables.version != RECORDS_VERSION {
                    return Err(StoreError::Rejected(format!(
                        "{} has version {}, expected {RECORDS_VERSION}",
                        path.display(),
                        tables.version
                    )));
                }
                tables
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            tables: Mutex::new(tables),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the tables under the lock and persist the result.
    fn transact<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(path) = &self.path else {
            return f(&mut tables);
        };

        let snapshot = tables.clone();
        let result = f(&mut tables)?;
        if let Err(e) = save(path, &tables) {
            *tables = snapshot;
            return Err(e);
        }
        Ok(result)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.tables.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn save(path: &Path, tables: &Tables) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(tables)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}


impl RecordStore for LocalRecordStore {
    fn insert_image(&self, new: NewImage) -> Result<Image, StoreError> {
        self.transact(|tables| {
            let id = ImageId(tables.next_image_id);
            tables.next_image_id += 1;
            let now = Utc::now();
            let image = Image {
                id,
                name: new.name,
                owner: new.owner,
                image: new.image,
                thumbnail: new.thumbnail,
                width: new.width,
                height: new.height,
                generated_action: new.generated_action,
                generation_count: 0,
                detected_info: None,
                created_at: now,
                updated_at: now,
            };
            tables.images.insert(id, image.clone());
            Ok(image)
        })
    }

    fn image(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        Ok(self.read(|t| t.images.get(&id).cloned()))
    }

    fn images(&self) -> Result<Vec<Image>, StoreError> {
        Ok(self.read(|t| t.images.values().rev().cloned().collect()))
    }

    fn update_image(
        &self,
        id: ImageId,
        change: &mut dyn FnMut(&mut Image),
    ) -> Result<Option<Image>, StoreError> {
        self.transact(|tables| {
            Ok(tables.images.get_mut(&id).map(|image| {
                let generation_count = image.generation_count;
                change(image);
                // Identity and lineage counters are not the caller's to edit
                image.id = id;
                image.generation_count = generation_count;
                image.updated_at = Utc::now();
                image.clone()
            }))
        })
    }

    fn increment_generation_count(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        self.transact(|tables| {
            Ok(tables.images.get_mut(&id).map(|image| {
                image.generation_count += 1;
                image.updated_at = Utc::now();
                image.clone()
            }))
        })
    }

    fn delete_image(&self, id: ImageId, hook: &dyn OnDelete) -> Result<bool, StoreError> {
        let removed = self.transact(|tables| {
            let Some(image) = tables.images.remove(&id) else {
                return Ok(None);
            };
            let children: Vec<GenerationId> = tables
                .generations
                .values()
                .filter(|g| g.original == id)
                .map(|g| g.id)
                .collect();
            let generations: Vec<Generation> = children
                .into_iter()
                .filter_map(|child| tables.generations.remove(&child))
                .collect();
            Ok(Some((image, generations)))
        })?;

        // Hooks run only once the delete is committed
        let Some((image, generations)) = removed else {
            return Ok(false);
        };
        for generation in &generations {
            hook.on_delete(DeletedRecord::Generation(generation));
        }
        hook.on_delete(DeletedRecord::Image(&image));
        Ok(true)
    }

    fn insert_generation(&self, new: NewGeneration) -> Result<Generation, StoreError> {
        self.transact(|tables| {
            if !tables.images.contains_key(&new.original) {
                return Err(StoreError::Rejected(format!(
                    "generation references missing image {}",
                    new.original
                )));
            }
            let id = GenerationId(tables.next_generation_id);
            tables.next_generation_id += 1;
            let generation = Generation {
                id,
                action: new.action,
                original: new.original,
                processed: new.processed,
                width: new.width,
                height: new.height,
                created_at: Utc::now(),
            };
            tables.generations.insert(id, generation.clone());
            Ok(generation)
        })
    }

    fn generation(&self, id: GenerationId) -> Result<Option<Generation>, StoreError> {
        Ok(self.read(|t| t.generations.get(&id).cloned()))
    }

    fn generations_of(&self, original: ImageId) -> Result<Vec<Generation>, StoreError> {
        Ok(self.read(|t| {
            t.generations
                .values()
                .rev()
                .filter(|g| g.original == original)
                .cloned()
                .collect()
        }))
    }

    fn delete_generation(
        &self,
        id: GenerationId,
        hook: &dyn OnDelete,
    ) -> Result<bool, StoreError> {
        let removed = self.transact(|tables| Ok(tables.generations.remove(&id)))?;
        match removed {
            Some(generation) => {
                hook.on_delete(DeletedRecord::Generation(&generation));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
