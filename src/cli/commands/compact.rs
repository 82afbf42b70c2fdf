//! Compact command - shrink a saved value table to a new capacity

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::{
    adapters::FileRepository,
    app::AgentConfig,
    cli::output::{create_spinner, format_number, print_kv, print_section},
    persistence::{LoadOutcome, PersistenceManager, SaveReport},
    ports::SnapshotRepository,
    q_learning::summarize,
    types::ActionSet,
};

/// Values are carried over as stored, without further rounding.
const PRESERVE_PRECISION: u32 = 12;

#[derive(Parser, Debug)]
#[command(about = "Prune a saved value table down to a capacity")]
pub struct CompactArgs {
    /// Snapshot file to compact
    pub snapshot: PathBuf,

    /// Number of states to keep
    #[arg(long, short = 'n')]
    pub capacity: usize,

    /// Write the result here instead of replacing the input
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Before/after sizes of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactReport {
    pub before: usize,
    pub after: usize,
    pub written: SaveReport,
}

pub fn execute(args: CompactArgs) -> Result<()> {
    let output = args.output.clone().unwrap_or_else(|| args.snapshot.clone());
    let spinner = create_spinner("Compacting snapshot...");
    let report = compact(
        Arc::new(FileRepository::new()),
        &args.snapshot,
        &output,
        args.capacity,
    );
    spinner.finish_and_clear();
    let report = report?;

    print_section(&format!("Compacted {}", args.snapshot.display()));
    print_kv("Entries before", &format_number(report.before));
    print_kv("Entries after", &format_number(report.after));
    print_kv("Written to", &output.display().to_string());
    print_kv("Snapshot size", &format!("{} bytes", format_number(report.written.bytes)));
    Ok(())
}

/// Load `input`, evict least used states down to `capacity` and write the
/// result to `output` synchronously.
pub fn compact(
    repository: Arc<dyn SnapshotRepository>,
    input: &Path,
    output: &Path,
    capacity: usize,
) -> Result<CompactReport> {
    if capacity == 0 {
        bail!("capacity must be at least 1");
    }
    let snapshot = repository
        .load(input)?
        .with_context(|| format!("no snapshot at {}", input.display()))?;
    let summary = summarize(&snapshot)
        .with_context(|| format!("snapshot {} is corrupt", input.display()))?;
    let actions =
        ActionSet::new(summary.actions).context("snapshot has an invalid action set")?;

    let reader = PersistenceManager::new(
        Arc::clone(&repository),
        input,
        AgentConfig::default().shutdown_timeout(),
    );
    let outcome = reader.load_from(summary.records.max(1), actions, PRESERVE_PRECISION);
    let mut store = match outcome {
        LoadOutcome::Loaded { store, .. } => store,
        LoadOutcome::Empty { reason, .. } => bail!("snapshot could not be loaded: {reason}"),
    };
    let before = store.len();

    store.set_capacity(capacity);
    store.prune();

    let mut writer = PersistenceManager::new(
        repository,
        output,
        AgentConfig::default().shutdown_timeout(),
    );
    let written = writer
        .save_now(&store.snapshot_records())
        .with_context(|| format!("failed to write {}", output.display()))?;

    Ok(CompactReport {
        before,
        after: store.len(),
        written,
    })
}
