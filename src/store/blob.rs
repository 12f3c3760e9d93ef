//! Blob stores: an in-memory map and a directory on disk.
//!
//! Both derive handles the same way: the name hint's directory and extension
//! are kept and the stem gets a random v4 UUID suffix.
//!
//! ```text
//! hint:   generation/crop/crop.png
//! handle: generation/crop/crop_5f0c2a9be1d34a7c9b1f04c2a7d35e60.png
//! ```

use super::{BlobStore, StoreError};
use crate::models::BlobHandle;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

/// Reject hints that could escape the store (absolute, `..`, backslashes).
fn validate_hint(hint: &str) -> Result<(), StoreError> {
    let valid = !hint.is_empty()
        && !hint.contains('\\')
        && hint
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    if valid {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!("invalid blob name {hint:?}")))
    }
}

fn unique_handle(name_hint: &str) -> Result<BlobHandle, StoreError> {
    validate_hint(name_hint)?;

    let (dir, file) = match name_hint.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, name_hint),
    };
    let (stem, ext) = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file, None),
    };

    let suffix = Uuid::new_v4().simple();

    let file = match ext {
        Some(ext) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{stem}_{suffix}"),
    };
    Ok(BlobHandle::new(match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }))
}

/// Blobs kept in a map. Used by tests and short-lived engines.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<BlobHandle, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8], name_hint: &str) -> Result<BlobHandle, StoreError> {
        let handle = unique_handle(name_hint)?;
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        if blobs.contains_key(&handle) {
            return Err(StoreError::Rejected(format!("handle {handle} already taken")));
        }
        blobs.insert(handle.clone(), bytes.to_vec());
        Ok(handle)
    }

    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
            .ok_or_else(|| StoreError::MissingBlob(handle.clone()))
    }

    fn delete(&self, handle: &BlobHandle) -> Result<(), StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
        Ok(())
    }

    fn contains(&self, handle: &BlobHandle) -> Result<bool, StoreError> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(handle))
    }

    fn handles(&self) -> Result<Vec<BlobHandle>, StoreError> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}

/// Blobs stored as files below a root directory; the handle is the relative path.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (creating if needed) a blob directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a handle.
    pub fn path_of(&self, handle: &BlobHandle) -> Result<PathBuf, StoreError> {
        validate_hint(handle.as_str())?;
        Ok(self.root.join(handle.as_str()))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8], name_hint: &str) -> Result<BlobHandle, StoreError> {
        let handle = unique_handle(name_hint)?;
        let path = self.path_of(&handle)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // create_new: an existing file is never overwritten
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Rejected(format!("handle {handle} already taken")));
            }
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        debug!(%handle, size = bytes.len(), "blob stored");
        Ok(handle)
    }

    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.path_of(handle)?) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::MissingBlob(handle.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, handle: &BlobHandle) -> Result<(), StoreError> {
        match fs::remove_file(self.path_of(handle)?) {
            Ok(()) => {
                debug!(%handle, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, handle: &BlobHandle) -> Result<bool, StoreError> {
        Ok(self.path_of(handle)?.is_file())
    }

    fn handles(&self) -> Result<Vec<BlobHandle>, StoreError> {
        let mut handles = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            handles.push(BlobHandle::new(parts.join("/")));
        }
        handles.sort();
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Handle derivation
    // =========================================================================

    #[test]
    fn handle_keeps_directory_and_extension() {
        let handle = unique_handle("generation/crop/crop.png").unwrap();
        let s = handle.as_str();
        assert!(s.starts_with("generation/crop/crop_"), "{s}");
        assert!(s.ends_with(".png"), "{s}");
        assert_eq!(s.len(), "generation/crop/crop_".len() + 32 + ".png".len());
    }

    #[test]
    fn handle_without_extension_or_directory() {
        let handle = unique_handle("blob").unwrap();
        assert!(handle.as_str().starts_with("blob_"));
        assert!(!handle.as_str().contains('.'));
    }

    #[test]
    fn same_hint_gets_distinct_handles() {
        let a = unique_handle("a.png").unwrap();
        let b = unique_handle("a.png").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn escaping_hints_are_rejected() {
        for hint in ["", "/etc/passwd", "../up.png", "a//b.png", "a/./b.png", "a\\b.png"] {
            assert!(
                matches!(unique_handle(hint), Err(StoreError::Rejected(_))),
                "{hint:?}"
            );
        }
    }

    // =========================================================================
    // MemoryBlobStore
    // =========================================================================

    #[test]
    fn memory_put_get_delete() {
        let store = MemoryBlobStore::new();
        let handle = store.put(b"pixels", "image/a.png").unwrap();
        assert_eq!(store.get(&handle).unwrap(), b"pixels");
        assert!(store.contains(&handle).unwrap());

        store.delete(&handle).unwrap();
        assert!(!store.contains(&handle).unwrap());
        assert!(matches!(store.get(&handle), Err(StoreError::MissingBlob(_))));
    }

    #[test]
    fn memory_put_never_overwrites() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"one", "image/a.png").unwrap();
        let b = store.put(b"one", "image/a.png").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn memory_delete_missing_is_noop() {
        let store = MemoryBlobStore::new();
        store.delete(&BlobHandle::new("image/nothing.png")).unwrap();
        assert!(store.is_empty());
    }

    // =========================================================================
    // FsBlobStore
    // =========================================================================

    #[test]
    fn fs_put_writes_file_under_root() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::open(tmp.path().join("blobs")).unwrap();
        let handle = store.put(b"bytes", "thumbnail/t.jpg").unwrap();

        let path = store.path_of(&handle).unwrap();
        assert!(path.starts_with(store.root()));
        assert_eq!(fs::read(path).unwrap(), b"bytes");
        assert_eq!(store.get(&handle).unwrap(), b"bytes");
    }

    #[test]
    fn fs_delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::open(tmp.path()).unwrap();
        let handle = store.put(b"x", "image/x.png").unwrap();
        store.delete(&handle).unwrap();
        store.delete(&handle).unwrap();
        assert!(!store.contains(&handle).unwrap());
    }

    #[test]
    fn fs_get_missing_is_missing_blob() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.get(&BlobHandle::new("image/gone.png")),
            Err(StoreError::MissingBlob(_))
        ));
    }

    #[test]
    fn fs_handles_lists_nested_files() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::open(tmp.path()).unwrap();
        let a = store.put(b"a", "image/a.png").unwrap();
        let b = store.put(b"b", "generation/blur/blur.png").unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.handles().unwrap(), expected);
    }

    #[test]
    fn fs_handles_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let handle = {
            let store = FsBlobStore::open(tmp.path()).unwrap();
            store.put(b"keep", "image/k.jpg").unwrap()
        };
        let store = FsBlobStore::open(tmp.path()).unwrap();
        assert_eq!(store.get(&handle).unwrap(), b"keep");
        // A reopened store must not clobber the existing file
        let other = store.put(b"keep", "image/k.jpg").unwrap();
        assert_ne!(other, handle);
        assert_eq!(store.get(&handle).unwrap(), b"keep");
    }

    #[test]
    fn fs_rejects_traversal_handles() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::open(tmp.path()).unwrap();
        assert!(store.get(&BlobHandle::new("../secret")).is_err());
    }
}
