//! Repository port for value-table snapshots.
//!
//! This module defines the trait boundary between the domain and the storage
//! layer. The persistence manager is the only caller.

use std::path::Path;

use crate::{Result, types::EncodedSnapshot};

/// Port for persisting and loading encoded value-table snapshots.
///
/// Implementations must be shareable with the background snapshot writer,
/// hence the `Send + Sync` bound.
///
/// # Examples
///
/// ```
/// use squaro_agent::adapters::InMemoryRepository;
/// use squaro_agent::ports::SnapshotRepository;
/// use squaro_agent::types::EncodedSnapshot;
/// use std::path::Path;
///
/// let repo = InMemoryRepository::new();
/// let path = Path::new("q_table.snapshot");
/// assert!(repo.load(path)?.is_none());
///
/// repo.save(&EncodedSnapshot::from("H4sI".to_string()), path)?;
/// assert!(repo.load(path)?.is_some());
/// # Ok::<(), squaro_agent::Error>(())
/// ```
pub trait SnapshotRepository: Send + Sync {
    /// Replace the snapshot stored at `path`.
    ///
    /// Implementations must never leave a partially written snapshot behind:
    /// readers see either the previous snapshot or the new one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StorageWriteFailure`] if the snapshot cannot be
    /// written.
    fn save(&self, snapshot: &EncodedSnapshot, path: &Path) -> Result<()>;

    /// Read the snapshot stored at `path`.
    ///
    /// Returns `Ok(None)` when nothing has been stored there yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StorageUnavailable`] if the snapshot exists but
    /// cannot be read.
    fn load(&self, path: &Path) -> Result<Option<EncodedSnapshot>>;
}
