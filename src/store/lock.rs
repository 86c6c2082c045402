//! Per-image exclusive locks.
//!
//! Every read-modify-write of a page record runs while holding the lock for
//! that page's id. Different pages never contend.
//!
//! A page lock has two layers: an in-process mutex that orders the threads
//! of one store, and an advisory file lock on `<dir>/<id>.json.lock` that
//! orders separate processes (each CLI invocation is its own process). Lock
//! files are left in place after release; deleting them would let a waiter
//! hold a lock on an unlinked file.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::MangalabelError;
use crate::ir::ImageId;

/// File name of the lock serializing image imports.
const IMPORT_LOCK_FILE: &str = ".import.lock";

#[derive(Debug)]
pub(crate) struct ImageLocks {
    dir: PathBuf,
    locks: Mutex<HashMap<ImageId, Arc<Mutex<()>>>>,
    import: Mutex<()>,
}

impl ImageLocks {
    /// Lock files are kept in `dir`, which is created on first use.
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
            import: Mutex::new(()),
        }
    }

    fn handle(&self, id: &ImageId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Drops the map entry for `id` unless another thread holds or waits on it.
    fn release(&self, id: &ImageId, handle: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // one count for the map, one for `handle`
        if Arc::strong_count(&handle) == 2 {
            locks.remove(id);
        }
    }

    /// Runs `f` while holding the lock for `id`.
    ///
    /// The lock is released when `f` returns, whether it succeeded or not.
    /// A lock poisoned by a panicking holder is taken over; records are only
    /// written after a mutation succeeds, so no half-written state leaks.
    pub(crate) fn with_lock<T>(
        &self,
        id: &ImageId,
        f: impl FnOnce() -> Result<T, MangalabelError>,
    ) -> Result<T, MangalabelError> {
        let handle = self.handle(id);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            self.with_file_lock(&format!("{}.json.lock", id), || {
                debug!(image_id = %id, "record lock acquired");
                f()
            })
        };
        self.release(id, handle);
        result
    }

    /// Runs `f` while no other thread or process imports an image.
    pub(crate) fn with_import_lock<T>(
        &self,
        f: impl FnOnce() -> Result<T, MangalabelError>,
    ) -> Result<T, MangalabelError> {
        let _guard = self.import.lock().unwrap_or_else(PoisonError::into_inner);
        self.with_file_lock(IMPORT_LOCK_FILE, f)
    }

    fn with_file_lock<T>(
        &self,
        name: &str,
        f: impl FnOnce() -> Result<T, MangalabelError>,
    ) -> Result<T, MangalabelError> {
        fs::create_dir_all(&self.dir).map_err(|source| MangalabelError::Storage {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| MangalabelError::Storage {
                path: path.clone(),
                source,
            })?;

        let mut lock = fd_lock::RwLock::new(file);
        let _guard = lock
            .write()
            .map_err(|source| MangalabelError::Storage { path, source })?;
        f()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
