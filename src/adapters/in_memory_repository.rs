//! In-memory snapshot repository for testing.
//!
//! This adapter provides a pure in-memory implementation of SnapshotRepository,
//! enabling fast tests without any file system I/O.

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{Result, error::Error, ports::SnapshotRepository, types::EncodedSnapshot};

/// In-memory repository for testing.
///
/// Stores snapshots in a shared HashMap keyed by path. Writes can be made to
/// fail on demand to exercise the retry path.
///
/// # Examples
///
/// ```
/// use squaro_agent::adapters::InMemoryRepository;
/// use squaro_agent::ports::SnapshotRepository;
/// use std::path::Path;
///
/// let repo = InMemoryRepository::new();
/// repo.insert_raw(Path::new("q_table.snapshot"), "not a snapshot");
/// assert!(repo.load(Path::new("q_table.snapshot"))?.is_some());
/// # Ok::<(), squaro_agent::Error>(())
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying storage, so a clone kept by a test
/// observes what the background writer stored.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    storage: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryRepository {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of snapshots currently stored.
    pub fn count(&self) -> usize {
        self.storage.lock().len()
    }

    /// Number of successful saves since creation.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Check if a snapshot exists at the given path.
    pub fn contains(&self, path: &Path) -> bool {
        self.storage.lock().contains_key(&key_for(path))
    }

    /// Store arbitrary text at `path`, bypassing the snapshot type.
    ///
    /// Used to plant corrupt artifacts.
    pub fn insert_raw(&self, path: &Path, text: impl Into<String>) {
        self.storage.lock().insert(key_for(path), text.into());
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Clear all stored snapshots.
    pub fn clear(&self) {
        self.storage.lock().clear();
    }
}

fn key_for(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

impl SnapshotRepository for InMemoryRepository {
    fn save(&self, snapshot: &EncodedSnapshot, path: &Path) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StorageWriteFailure {
                path: path.to_path_buf(),
                message: "in-memory writes are disabled".to_string(),
            });
        }
        self.storage
            .lock()
            .insert(key_for(path), snapshot.as_str().to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Option<EncodedSnapshot>> {
        Ok(self
            .storage
            .lock()
            .get(&key_for(path))
            .cloned()
            .map(EncodedSnapshot::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(text: &str) -> EncodedSnapshot {
        EncodedSnapshot::from(text.to_string())
    }

    #[test]
    fn test_in_memory_save_and_load() {
        let repo = InMemoryRepository::new();
        let path = Path::new("q_table.snapshot");

        assert_eq!(repo.count(), 0);
        assert!(!repo.contains(path));

        repo.save(&snapshot("abc"), path).unwrap();
        assert_eq!(repo.count(), 1);
        assert_eq!(repo.saves(), 1);
        assert!(repo.contains(path));

        assert_eq!(repo.load(path).unwrap(), Some(snapshot("abc")));
    }

    #[test]
    fn test_load_nonexistent_returns_none() {
        let repo = InMemoryRepository::new();
        assert!(repo.load(Path::new("nonexistent")).unwrap().is_none());
    }

    #[test]
    fn test_failed_writes_leave_previous_snapshot() {
        let repo = InMemoryRepository::new();
        let path = Path::new("q");
        repo.save(&snapshot("old"), path).unwrap();

        repo.set_fail_writes(true);
        let err = repo.save(&snapshot("new"), path).unwrap_err();
        assert!(matches!(err, Error::StorageWriteFailure { .. }));
        assert_eq!(repo.load(path).unwrap(), Some(snapshot("old")));

        repo.set_fail_writes(false);
        repo.save(&snapshot("new"), path).unwrap();
        assert_eq!(repo.load(path).unwrap(), Some(snapshot("new")));
    }

    #[test]
    fn test_clone_shares_storage() {
        let repo1 = InMemoryRepository::new();
        let repo2 = repo1.clone();
        let path = Path::new("shared");

        repo1.save(&snapshot("x"), path).unwrap();

        assert_eq!(repo2.load(path).unwrap(), Some(snapshot("x")));
        assert_eq!(repo2.saves(), 1);
        repo2.clear();
        assert_eq!(repo1.count(), 0);
    }
}
