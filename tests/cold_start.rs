//! Startup behaviour when the snapshot is missing, unreadable or corrupt.

use std::fs;

use squaro_agent::{
    ActionSet, ValueStore,
    adapters::{FileRepository, InMemoryRepository},
    app::{AgentConfig, App},
    persistence::{EmptyReason, LoadOutcome},
};
use tempfile::TempDir;

mod common;

fn file_app() -> App {
    App::for_testing()
        .with_repository(FileRepository::new())
        .with_default_seed(1)
        .build()
}

#[test]
fn missing_snapshot_gives_empty_store() {
    let dir = TempDir::new().unwrap();
    let config = AgentConfig::default().with_snapshot_path(dir.path().join("q_table.snapshot"));

    match file_app().open_store(&config) {
        LoadOutcome::Empty { store, reason } => {
            assert!(store.is_empty());
            assert_eq!(reason, EmptyReason::Missing);
        }
        LoadOutcome::Loaded { .. } => panic!("nothing was saved"),
    }
}

#[test]
fn garbage_snapshot_gives_empty_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("q_table.snapshot");
    fs::write(&path, "this is not a snapshot").unwrap();
    let config = AgentConfig::default().with_snapshot_path(&path);

    let outcome = file_app().open_store(&config);
    assert!(matches!(
        outcome,
        LoadOutcome::Empty {
            reason: EmptyReason::Corrupt(_),
            ..
        }
    ));
}

#[test]
fn truncated_snapshot_gives_empty_store() {
    let mut store = ValueStore::new(100, ActionSet::default(), 4);
    let up = store.actions().parse("up").unwrap();
    for key in common::keys(40) {
        store.set_value(&key, up, 0.5);
    }
    let full = store.snapshot().unwrap();
    let cut = full.as_str().len() / 2 / 4 * 4;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("q_table.snapshot");
    fs::write(&path, &full.as_str()[..cut]).unwrap();
    let config = AgentConfig::default().with_snapshot_path(&path);

    let outcome = file_app().open_store(&config);
    assert!(!outcome.is_loaded());
    assert!(outcome.store().is_empty());
}

#[test]
fn unreadable_snapshot_gives_empty_store() {
    let dir = TempDir::new().unwrap();
    // A directory in place of the snapshot file cannot be read.
    let config = AgentConfig::default().with_snapshot_path(dir.path());

    let outcome = file_app().open_store(&config);
    assert!(matches!(
        outcome,
        LoadOutcome::Empty {
            reason: EmptyReason::Unreadable(_),
            ..
        }
    ));
}

#[test]
fn agent_recovers_from_corrupt_snapshot_and_overwrites_it() {
    let repo = InMemoryRepository::new();
    let config = AgentConfig::default()
        .with_snapshot_path("q_table.snapshot")
        .with_intervals(0, 0);
    repo.insert_raw(&config.snapshot_path, "%%% corrupt %%%");
    let app = App::for_testing().with_repository(repo.clone()).build();

    let mut agent = app.create_agent(config.clone()).unwrap();
    assert!(agent.store().is_empty());

    let state = common::game_state(10.0, 20.0);
    let action = agent.select_action(&state);
    agent.learn_terminal(&state, action, 1.0);
    agent.shutdown();

    assert!(app.open_store(&config).is_loaded());
    assert_eq!(app.open_store(&config).store().len(), 1);
}
