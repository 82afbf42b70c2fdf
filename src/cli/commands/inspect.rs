//! Inspect command - summarize a saved value table

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use crate::{
    adapters::FileRepository,
    cli::output::{
        abbreviate, create_spinner, format_number, print_kv, print_section, print_subsection,
    },
    ports::SnapshotRepository,
    q_learning::{ValueStore, summarize},
    types::ActionSet,
};

/// Values are shown as stored, so loading must not round them further.
const FULL_PRECISION: u32 = 12;

#[derive(Parser, Debug)]
#[command(about = "Summarize a saved value table")]
pub struct InspectArgs {
    /// Snapshot file to read
    pub snapshot: PathBuf,

    /// Number of most used states to list
    #[arg(long, short = 't', default_value_t = 10)]
    pub top: usize,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotState {
    pub key: String,
    pub usage: u64,
    pub best_action: String,
    pub best_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub version: u32,
    pub actions: Vec<String>,
    pub entries: usize,
    pub skipped_records: usize,
    pub min_usage: u64,
    pub mean_usage: f64,
    pub max_usage: u64,
    pub hottest: Vec<HotState>,
}

pub fn execute(args: InspectArgs) -> Result<()> {
    let spinner = create_spinner("Reading snapshot...");
    let report = build_report(&FileRepository::new(), &args.snapshot, args.top);
    spinner.finish_and_clear();
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_section(&format!("Value table: {}", report.path.display()));
    print_kv("Format version", &report.version.to_string());
    print_kv("Actions", &report.actions.join(", "));
    print_kv("Entries", &format_number(report.entries));
    if report.skipped_records > 0 {
        print_kv("Skipped records", &format_number(report.skipped_records));
    }
    print_kv(
        "Usage (min/mean/max)",
        &format!(
            "{} / {:.1} / {}",
            report.min_usage, report.mean_usage, report.max_usage
        ),
    );

    if !report.hottest.is_empty() {
        print_subsection("Most used states");
        for state in &report.hottest {
            println!(
                "  {:<28} {:>8}  {} ({:+.4})",
                abbreviate(&state.key, 28),
                state.usage,
                state.best_action,
                state.best_value
            );
        }
    }
    Ok(())
}

/// Load the snapshot at `path` and compute its summary.
pub fn build_report(
    repository: &dyn SnapshotRepository,
    path: &Path,
    top: usize,
) -> Result<InspectReport> {
    let snapshot = repository
        .load(path)?
        .with_context(|| format!("no snapshot at {}", path.display()))?;
    let summary = summarize(&snapshot)
        .with_context(|| format!("snapshot {} is corrupt", path.display()))?;
    let actions =
        ActionSet::new(summary.actions.clone()).context("snapshot has an invalid action set")?;

    let mut store = ValueStore::new(summary.records.max(1), actions, FULL_PRECISION);
    let loaded = store
        .load(&snapshot)
        .with_context(|| format!("snapshot {} is corrupt", path.display()))?;

    let usages: Vec<u64> = store.hottest().map(|(_, usage)| usage).collect();
    let hottest = store
        .hottest()
        .take(top)
        .map(|(key, usage)| {
            let row = store.peek(key).unwrap_or_default();
            let (best, value) = row
                .iter()
                .copied()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
                    if v > best.1 { (i, v) } else { best }
                });
            HotState {
                key: key.to_string(),
                usage,
                best_action: store
                    .actions()
                    .get(best)
                    .map(|action| store.actions().token(action).to_string())
                    .unwrap_or_default(),
                best_value: if value.is_finite() { value } else { 0.0 },
            }
        })
        .collect();

    Ok(InspectReport {
        path: path.to_path_buf(),
        version: summary.version,
        actions: summary.actions,
        entries: store.len(),
        skipped_records: loaded.skipped,
        min_usage: usages.iter().copied().min().unwrap_or(0),
        mean_usage: if usages.is_empty() {
            0.0
        } else {
            usages.iter().sum::<u64>() as f64 / usages.len() as f64
        },
        max_usage: usages.first().copied().unwrap_or(0),
        hottest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapters::InMemoryRepository, codec};

    #[test]
    fn report_lists_most_used_states_first() {
        let mut store = ValueStore::new(10, ActionSet::default(), 4);
        let hot = codec::encode(&serde_json::json!("hot")).unwrap();
        let cold = codec::encode(&serde_json::json!("cold")).unwrap();
        let left = store.actions().parse("left").unwrap();
        store.set_value(&cold, left, -0.5);
        store.set_value(&hot, left, 2.0);
        for _ in 0..5 {
            store.get_value(&hot, left);
        }

        let repo = InMemoryRepository::new();
        let path = Path::new("table.snapshot");
        repo.save(&store.snapshot().unwrap(), path).unwrap();

        let report = build_report(&repo, path, 1).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.hottest.len(), 1);
        assert_eq!(report.hottest[0].key, hot.as_str());
        assert_eq!(report.hottest[0].best_action, "left");
        assert_eq!(report.hottest[0].best_value, 2.0);
        assert_eq!(report.max_usage, store.usage(&hot).unwrap());
        assert_eq!(report.min_usage, store.usage(&cold).unwrap());
    }

    #[test]
    fn missing_or_corrupt_snapshot_is_an_error() {
        let repo = InMemoryRepository::new();
        let path = Path::new("table.snapshot");
        assert!(build_report(&repo, path, 5).is_err());

        repo.insert_raw(path, "garbage");
        assert!(build_report(&repo, path, 5).is_err());
    }
}
