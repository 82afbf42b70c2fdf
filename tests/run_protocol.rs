//! The stdin/stdout driver against a real snapshot file.

use std::{fmt::Write as _, path::Path};

use squaro_agent::{
    ActionSet, RewardTracker,
    adapters::FileRepository,
    app::{AgentConfig, App},
    cli::commands::{inspect::build_report, run::drive},
};
use tempfile::TempDir;

mod common;

/// Observation lines for `episodes` games of `steps` moves each.
fn transcript(episodes: usize, steps: usize) -> String {
    let mut tracker = RewardTracker::new();
    let mut text = String::new();
    for episode in 0..episodes {
        for step in 0..=steps {
            let state = common::game_state(step as f32, episode as f32);
            let reward = tracker.observe((step * 10) as u64);
            let done = step == steps;
            writeln!(
                text,
                r#"{{"state": {}, "reward": {reward}, "done": {done}}}"#,
                serde_json::to_string(&state).unwrap()
            )
            .unwrap();
        }
    }
    text
}

#[test]
fn driven_run_is_saved_and_resumed() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("q_table.snapshot");
    let app = App::for_testing()
        .with_repository(FileRepository::new())
        .with_default_seed(12)
        .build();
    let config = AgentConfig::default()
        .with_snapshot_path(&snapshot)
        .with_intervals(5, 3);

    let mut agent = app.create_agent(config.clone()).unwrap();
    let mut output = Vec::new();
    let summary = drive(&mut agent, transcript(3, 6).as_bytes(), &mut output).unwrap();
    agent.shutdown();

    assert_eq!(summary.episodes, 3);
    assert_eq!(summary.steps, 18);
    let actions = ActionSet::default();
    let replies: Vec<&str> = std::str::from_utf8(&output).unwrap().lines().collect();
    assert_eq!(replies.len(), 18);
    assert!(replies.iter().all(|token| actions.parse(token).is_some()));
    assert_eq!(agent.stats().updates, 18);
    assert!(agent.stats().saves_scheduled >= 1);

    let report = build_report(&FileRepository::new(), &snapshot, 3).unwrap();
    assert_eq!(report.entries, agent.store().len());
    assert_eq!(report.hottest.len(), 3);

    let resumed = app.create_agent(config).unwrap();
    assert_eq!(resumed.store().len(), agent.store().len());
}

#[test]
fn inspect_reports_missing_snapshot() {
    let dir = TempDir::new().unwrap();
    let result = build_report(
        &FileRepository::new(),
        &dir.path().join(Path::new("absent.snapshot")),
        5,
    );
    assert!(result.is_err());
}
