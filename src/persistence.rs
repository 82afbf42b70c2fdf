//! Loading and saving the value table off the decision path.
//!
//! At startup the manager turns whatever the repository holds into a
//! [`ValueStore`], starting empty instead of failing when the snapshot is
//! missing, unreadable or corrupt. While the agent runs, saves are handed to a
//! single background writer thread that owns a detached copy of the table, so
//! the learning loop never waits on compression or disk I/O.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
    Result,
    error::Error,
    ports::SnapshotRepository,
    q_learning::{
        serialization::SnapshotRecords,
        value_store::{LoadReport, ValueStore},
    },
    types::ActionSet,
};

const WRITER_THREAD_NAME: &str = "snapshot-writer";
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why a load produced an empty store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// No snapshot has been written yet
    Missing,
    /// The snapshot exists but could not be read
    Unreadable(String),
    /// The snapshot was read but could not be decoded
    Corrupt(String),
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::Missing => f.write_str("no snapshot found"),
            EmptyReason::Unreadable(message) => write!(f, "snapshot unreadable: {message}"),
            EmptyReason::Corrupt(message) => write!(f, "snapshot corrupt: {message}"),
        }
    }
}

/// Result of loading the value table at startup.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded {
        store: ValueStore,
        report: LoadReport,
    },
    Empty {
        store: ValueStore,
        reason: EmptyReason,
    },
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }

    pub fn store(&self) -> &ValueStore {
        match self {
            LoadOutcome::Loaded { store, .. } | LoadOutcome::Empty { store, .. } => store,
        }
    }

    pub fn into_store(self) -> ValueStore {
        match self {
            LoadOutcome::Loaded { store, .. } | LoadOutcome::Empty { store, .. } => store,
        }
    }
}

/// Whether a save request started a background write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRequest {
    Scheduled,
    /// A write was already in flight, or the writer could not be started
    Skipped,
}

/// What a finished write stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub entries: usize,
    pub bytes: usize,
}

/// Final state of the background writer at shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownStatus {
    /// Nothing was in flight
    Idle,
    Completed(SaveReport),
    Failed(String),
    /// The writer did not finish in time and is still running
    TimedOut,
}

/// Single-slot handle to the background writer.
#[derive(Debug, Default)]
struct SaveTask {
    handle: Option<JoinHandle<Result<SaveReport>>>,
}

impl SaveTask {
    fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Collect the result of a finished write, if any.
    fn reap(&mut self) -> Option<ShutdownStatus> {
        if self.is_running() {
            return None;
        }
        self.handle.take().map(|handle| {
            let status = join_status(handle);
            log_completion(&status);
            status
        })
    }

    fn join(&mut self, timeout: Duration) -> ShutdownStatus {
        let Some(handle) = self.handle.take() else {
            return ShutdownStatus::Idle;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "snapshot writer did not finish in time"
                );
                // Still writing: the slot stays occupied so no second writer
                // targets the same path.
                self.handle = Some(handle);
                return ShutdownStatus::TimedOut;
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        let status = join_status(handle);
        log_completion(&status);
        status
    }
}

fn join_status(handle: JoinHandle<Result<SaveReport>>) -> ShutdownStatus {
    match handle.join() {
        Ok(Ok(report)) => ShutdownStatus::Completed(report),
        Ok(Err(err)) => ShutdownStatus::Failed(err.to_string()),
        Err(_) => ShutdownStatus::Failed("snapshot writer panicked".to_string()),
    }
}

fn log_completion(status: &ShutdownStatus) {
    match status {
        ShutdownStatus::Completed(report) => {
            debug!(entries = report.entries, bytes = report.bytes, "snapshot written");
        }
        ShutdownStatus::Failed(message) => {
            warn!(error = %message, "snapshot write failed; will retry at next save");
        }
        ShutdownStatus::Idle | ShutdownStatus::TimedOut => {}
    }
}

fn write_snapshot(
    repository: &dyn SnapshotRepository,
    path: &Path,
    records: &SnapshotRecords,
) -> Result<SaveReport> {
    let snapshot = records.encode().map_err(|err| Error::StorageWriteFailure {
        path: path.to_path_buf(),
        message: format!("encode snapshot: {err}"),
    })?;
    repository.save(&snapshot, path)?;
    Ok(SaveReport {
        entries: records.len(),
        bytes: snapshot.len(),
    })
}

/// Owns the snapshot location and the background writer.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use squaro_agent::adapters::InMemoryRepository;
/// use squaro_agent::persistence::{EmptyReason, LoadOutcome, PersistenceManager};
/// use squaro_agent::types::ActionSet;
///
/// let manager = PersistenceManager::new(
///     Arc::new(InMemoryRepository::new()),
///     "q_table.snapshot",
///     Duration::from_secs(1),
/// );
/// match manager.load_from(100, ActionSet::default(), 4) {
///     LoadOutcome::Empty { reason, .. } => assert_eq!(reason, EmptyReason::Missing),
///     LoadOutcome::Loaded { .. } => unreachable!(),
/// }
/// ```
pub struct PersistenceManager {
    repository: Arc<dyn SnapshotRepository>,
    path: PathBuf,
    task: SaveTask,
    shutdown_timeout: Duration,
}

impl fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("path", &self.path)
            .field("running", &self.is_running())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl PersistenceManager {
    pub fn new(
        repository: Arc<dyn SnapshotRepository>,
        path: impl Into<PathBuf>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            path: path.into(),
            task: SaveTask::default(),
            shutdown_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Build a store from the persisted snapshot.
    ///
    /// Never fails: a missing, unreadable or corrupt snapshot yields an empty
    /// store together with the reason.
    pub fn load_from(&self, capacity: usize, actions: ActionSet, precision: u32) -> LoadOutcome {
        let mut store = ValueStore::new(capacity, actions, precision);

        let snapshot = match self.repository.load(&self.path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!(path = ?self.path, "no snapshot found; starting with an empty value table");
                return LoadOutcome::Empty {
                    store,
                    reason: EmptyReason::Missing,
                };
            }
            Err(err) => {
                warn!(path = ?self.path, error = %err, "snapshot unreadable; starting fresh");
                return LoadOutcome::Empty {
                    store,
                    reason: EmptyReason::Unreadable(err.to_string()),
                };
            }
        };

        match store.load(&snapshot) {
            Ok(report) => {
                info!(
                    path = ?self.path,
                    loaded = report.loaded,
                    skipped = report.skipped,
                    pruned = report.pruned,
                    "loaded value table"
                );
                LoadOutcome::Loaded { store, report }
            }
            Err(err) => {
                warn!(path = ?self.path, error = %err, "snapshot corrupt; starting fresh");
                LoadOutcome::Empty {
                    store,
                    reason: EmptyReason::Corrupt(err.to_string()),
                }
            }
        }
    }

    /// True while a background write is in flight.
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Start a background write of `records`.
    ///
    /// At most one write runs at a time; a request made while one is in
    /// flight is skipped.
    pub fn save(&mut self, records: SnapshotRecords) -> SaveRequest {
        if self.task.is_running() {
            debug!("snapshot write already in flight; skipping save");
            return SaveRequest::Skipped;
        }
        self.task.reap();

        let repository = Arc::clone(&self.repository);
        let path = self.path.clone();
        let spawned = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || write_snapshot(repository.as_ref(), &path, &records));

        match spawned {
            Ok(handle) => {
                self.task.handle = Some(handle);
                SaveRequest::Scheduled
            }
            Err(err) => {
                warn!(error = %err, "failed to start snapshot writer");
                SaveRequest::Skipped
            }
        }
    }

    /// Wait up to `timeout` for the in-flight write, if any.
    pub fn join_on_shutdown(&mut self, timeout: Duration) -> ShutdownStatus {
        self.task.join(timeout)
    }

    /// Final save at shutdown.
    ///
    /// Waits for an in-flight write first, then writes `records` and waits
    /// for that too. Both waits share the configured shutdown timeout.
    pub fn flush(&mut self, records: SnapshotRecords) -> ShutdownStatus {
        let deadline = Instant::now() + self.shutdown_timeout;

        if self.join_on_shutdown(self.shutdown_timeout) == ShutdownStatus::TimedOut {
            return ShutdownStatus::TimedOut;
        }
        if self.save(records) == SaveRequest::Skipped {
            return ShutdownStatus::Failed("snapshot writer could not be started".to_string());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.join_on_shutdown(remaining)
    }

    /// Write `records` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWriteFailure`] if the snapshot cannot be
    /// encoded or written, or if a background write to the same path is
    /// still running after the shutdown timeout.
    pub fn save_now(&mut self, records: &SnapshotRecords) -> Result<SaveReport> {
        if self.join_on_shutdown(self.shutdown_timeout) == ShutdownStatus::TimedOut {
            return Err(Error::StorageWriteFailure {
                path: self.path.clone(),
                message: "a background snapshot write is still in flight".to_string(),
            });
        }
        let report = write_snapshot(self.repository.as_ref(), &self.path, records)?;
        info!(
            path = ?self.path,
            entries = report.entries,
            bytes = report.bytes,
            "snapshot written"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::{adapters::InMemoryRepository, codec, types::EncodedSnapshot};

    const PATH: &str = "q_table.snapshot";

    fn manager(repo: &InMemoryRepository) -> PersistenceManager {
        PersistenceManager::new(Arc::new(repo.clone()), PATH, Duration::from_secs(5))
    }

    fn populated_store(rows: i64) -> ValueStore {
        let mut store = ValueStore::new(100, ActionSet::default(), 4);
        let up = store.actions().parse("up").unwrap();
        for i in 0..rows {
            let key = codec::encode(&serde_json::json!({ "row": i })).unwrap();
            store.set_value(&key, up, i as f64 / 10.0);
        }
        store
    }

    /// Repository whose writes block until the test releases them.
    struct GatedRepository {
        inner: InMemoryRepository,
        gate: parking_lot::Mutex<mpsc::Receiver<()>>,
    }

    impl SnapshotRepository for GatedRepository {
        fn save(&self, snapshot: &EncodedSnapshot, path: &Path) -> Result<()> {
            let _ = self.gate.lock().recv();
            self.inner.save(snapshot, path)
        }

        fn load(&self, path: &Path) -> Result<Option<EncodedSnapshot>> {
            self.inner.load(path)
        }
    }

    #[test]
    fn missing_snapshot_starts_empty() {
        let repo = InMemoryRepository::new();
        let outcome = manager(&repo).load_from(10, ActionSet::default(), 4);
        assert!(!outcome.is_loaded());
        assert!(matches!(
            outcome,
            LoadOutcome::Empty {
                reason: EmptyReason::Missing,
                ..
            }
        ));
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let repo = InMemoryRepository::new();
        repo.insert_raw(Path::new(PATH), "definitely not base64 %%%");
        let outcome = manager(&repo).load_from(10, ActionSet::default(), 4);
        match outcome {
            LoadOutcome::Empty {
                store,
                reason: EmptyReason::Corrupt(_),
            } => assert!(store.is_empty()),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn save_then_load_restores_the_table() {
        let repo = InMemoryRepository::new();
        let store = populated_store(5);
        let mut persistence = manager(&repo);

        assert_eq!(persistence.save(store.snapshot_records()), SaveRequest::Scheduled);
        let status = persistence.join_on_shutdown(Duration::from_secs(5));
        assert!(matches!(status, ShutdownStatus::Completed(SaveReport { entries: 5, .. })));

        let outcome = persistence.load_from(100, ActionSet::default(), 4);
        assert!(outcome.is_loaded());
        let loaded = outcome.into_store();
        assert_eq!(loaded.len(), 5);
        for (key, row) in store.rows() {
            assert_eq!(loaded.peek(key), Some(row));
        }
    }

    #[test]
    fn second_save_while_running_is_skipped() {
        let (release, gate) = mpsc::channel();
        let inner = InMemoryRepository::new();
        let repo = GatedRepository {
            inner: inner.clone(),
            gate: parking_lot::Mutex::new(gate),
        };
        let mut persistence =
            PersistenceManager::new(Arc::new(repo), PATH, Duration::from_secs(5));
        let store = populated_store(3);

        assert_eq!(persistence.save(store.snapshot_records()), SaveRequest::Scheduled);
        assert!(persistence.is_running());
        assert_eq!(persistence.save(store.snapshot_records()), SaveRequest::Skipped);

        release.send(()).unwrap();
        let status = persistence.join_on_shutdown(Duration::from_secs(5));
        assert!(matches!(status, ShutdownStatus::Completed(_)));
        assert_eq!(inner.saves(), 1);
        assert!(!persistence.is_running());
    }

    #[test]
    fn join_times_out_on_a_stuck_writer() {
        let (release, gate) = mpsc::channel();
        let repo = GatedRepository {
            inner: InMemoryRepository::new(),
            gate: parking_lot::Mutex::new(gate),
        };
        let mut persistence =
            PersistenceManager::new(Arc::new(repo), PATH, Duration::from_millis(20));

        persistence.save(populated_store(1).snapshot_records());
        let status = persistence.join_on_shutdown(Duration::from_millis(20));
        assert_eq!(status, ShutdownStatus::TimedOut);
        assert!(persistence.is_running());
        drop(release);
    }

    #[test]
    fn timed_out_writer_keeps_the_path_to_itself() {
        let (release, gate) = mpsc::channel();
        let inner = InMemoryRepository::new();
        let repo = GatedRepository {
            inner: inner.clone(),
            gate: parking_lot::Mutex::new(gate),
        };
        let mut persistence =
            PersistenceManager::new(Arc::new(repo), PATH, Duration::from_millis(20));
        let store = populated_store(2);

        assert_eq!(persistence.save(store.snapshot_records()), SaveRequest::Scheduled);
        assert_eq!(
            persistence.join_on_shutdown(Duration::from_millis(20)),
            ShutdownStatus::TimedOut
        );
        assert_eq!(persistence.save(store.snapshot_records()), SaveRequest::Skipped);
        assert!(matches!(
            persistence.save_now(&store.snapshot_records()),
            Err(Error::StorageWriteFailure { .. })
        ));
        assert_eq!(inner.saves(), 0);

        release.send(()).unwrap();
        let status = persistence.join_on_shutdown(Duration::from_secs(5));
        assert!(matches!(status, ShutdownStatus::Completed(_)));
        assert_eq!(inner.saves(), 1);

        assert_eq!(persistence.save(store.snapshot_records()), SaveRequest::Scheduled);
        release.send(()).unwrap();
        assert!(matches!(
            persistence.join_on_shutdown(Duration::from_secs(5)),
            ShutdownStatus::Completed(_)
        ));
        assert_eq!(inner.saves(), 2);
    }

    #[test]
    fn failed_write_is_reported() {
        let repo = InMemoryRepository::new();
        repo.set_fail_writes(true);
        let mut persistence = manager(&repo);

        let status = persistence.flush(populated_store(2).snapshot_records());
        assert!(matches!(status, ShutdownStatus::Failed(_)));
        assert!(!repo.contains(Path::new(PATH)));
    }

    #[test]
    fn idle_join_reports_idle() {
        let repo = InMemoryRepository::new();
        let mut persistence = manager(&repo);
        assert_eq!(
            persistence.join_on_shutdown(Duration::from_millis(1)),
            ShutdownStatus::Idle
        );
    }

    #[test]
    fn save_now_writes_synchronously() {
        let repo = InMemoryRepository::new();
        let mut persistence = manager(&repo);
        let report = persistence
            .save_now(&populated_store(4).snapshot_records())
            .unwrap();
        assert_eq!(report.entries, 4);
        assert!(repo.contains(Path::new(PATH)));
    }
}
