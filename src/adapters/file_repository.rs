//! File-system implementation of the snapshot repository.
//!
//! Snapshots are written to a temporary file in the target directory and then
//! renamed over the destination, so a crash mid-write never leaves a torn
//! snapshot behind.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use crate::{Result, error::Error, ports::SnapshotRepository, types::EncodedSnapshot};

/// Snapshot repository backed by plain text files.
///
/// # Examples
///
/// ```no_run
/// use squaro_agent::adapters::FileRepository;
/// use squaro_agent::ports::SnapshotRepository;
/// use std::path::Path;
///
/// let repo = FileRepository::new();
/// match repo.load(Path::new("q_table.snapshot"))? {
///     Some(snapshot) => println!("{} bytes", snapshot.len()),
///     None => println!("no snapshot yet"),
/// }
/// # Ok::<(), squaro_agent::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRepository;

impl FileRepository {
    /// Create a new file repository.
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotRepository for FileRepository {
    fn save(&self, snapshot: &EncodedSnapshot, path: &Path) -> Result<()> {
        let write_failure = |message: String| Error::StorageWriteFailure {
            path: path.to_path_buf(),
            message,
        };

        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .map_err(|e| write_failure(format!("create directory {parent:?}: {e}")))?;

        let mut temp = NamedTempFile::new_in(parent)
            .map_err(|e| write_failure(format!("create temporary file: {e}")))?;
        temp.write_all(snapshot.as_str().as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| write_failure(format!("write temporary file: {e}")))?;
        temp.persist(path)
            .map_err(|e| write_failure(format!("replace snapshot: {}", e.error)))?;

        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Option<EncodedSnapshot>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(EncodedSnapshot::from(text))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::StorageUnavailable {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
