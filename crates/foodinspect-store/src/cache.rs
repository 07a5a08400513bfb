//! Write-once document cache keyed by inspection identifier.
//!
//! The first successful `put` for an identifier wins. Later puts are no-ops:
//! the stored bytes are never compared, replaced, or refreshed, so a cached
//! report is never downloaded twice.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use foodinspect_core::InspectionId;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::StoreError;

const DOCUMENT_FILE: &str = "inspection.html";

/// Storage slot per inspection identifier, shared by the fetch workers.
pub trait DocumentCache: Send + Sync {
    /// Store `bytes` for `id` unless the slot is already occupied.
    ///
    /// Returns `true` if this call created the slot.
    fn put(&self, id: InspectionId, bytes: &[u8]) -> Result<bool, StoreError>;

    /// Read the stored bytes, if any.
    fn get(&self, id: InspectionId) -> Result<Option<Vec<u8>>, StoreError>;

    fn has(&self, id: InspectionId) -> bool;
}

/// Filesystem cache laid out as `<root>/<id>/inspection.html`.
///
/// Extra read-only roots (for example an older cache directory) are consulted
/// after the primary root by `get` and `has`. Writes only ever go to the
/// primary root.
pub struct FsDocumentCache {
    root: PathBuf,
    fallbacks: Vec<PathBuf>,
}

impl FsDocumentCache {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self {
            root,
            fallbacks: Vec::new(),
        })
    }

    /// Add a read-only root consulted after the primary one.
    pub fn with_fallback(mut self, root: impl Into<PathBuf>) -> Self {
        self.fallbacks.push(root.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_dir(root: &Path, id: InspectionId) -> PathBuf {
        root.join(id.to_string())
    }

    fn slot_path(root: &Path, id: InspectionId) -> PathBuf {
        Self::slot_dir(root, id).join(DOCUMENT_FILE)
    }

    fn roots(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.root).chain(self.fallbacks.iter())
    }

    fn locate(&self, id: InspectionId) -> Option<PathBuf> {
        self.roots()
            .map(|root| Self::slot_path(root, id))
            .find(|path| path.is_file())
    }
}

impl DocumentCache for FsDocumentCache {
    fn put(&self, id: InspectionId, bytes: &[u8]) -> Result<bool, StoreError> {
        if self.has(id) {
            return Ok(false);
        }

        let dir = Self::slot_dir(&self.root, id);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        // Write beside the slot, then publish with a no-clobber rename so a
        // concurrent writer for the same id can neither tear nor replace it.
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;

        let path = Self::slot_path(&self.root, id);
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(%id, bytes = bytes.len(), "cached document");
                Ok(true)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::io(&path, e.error)),
        }
    }

    fn get(&self, id: InspectionId) -> Result<Option<Vec<u8>>, StoreError> {
        match self.locate(id) {
            Some(path) => fs::read(&path)
                .map(Some)
                .map_err(|e| StoreError::io(&path, e)),
            None => Ok(None),
        }
    }

    fn has(&self, id: InspectionId) -> bool {
        self.locate(id).is_some()
    }
}

/// In-memory cache with the same write-once semantics.
#[derive(Default)]
pub struct MemoryDocumentCache {
    slots: Mutex<HashMap<InspectionId, Vec<u8>>>,
}

impl MemoryDocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<InspectionId, Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written slot.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentCache for MemoryDocumentCache {
    fn put(&self, id: InspectionId, bytes: &[u8]) -> Result<bool, StoreError> {
        let mut slots = self.lock();
        if slots.contains_key(&id) {
            return Ok(false);
        }
        slots.insert(id, bytes.to_vec());
        Ok(true)
    }

    fn get(&self, id: InspectionId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().get(&id).cloned())
    }

    fn has(&self, id: InspectionId) -> bool {
        self.lock().contains_key(&id)
    }
}
