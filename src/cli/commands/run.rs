//! Run command - drive a game over line-delimited JSON
//!
//! The game side writes one observation per line on stdin:
//!
//! ```text
//! {"state": {...}, "reward": 1.0, "done": false}
//! ```
//!
//! and reads one action token per line from stdout. The reward on a line is
//! the reward earned by the previous action. Lines with `"done": true` close
//! the episode and get no reply.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    RandomController,
    app::App,
    cli::config::ConfigArgs,
    codec,
    persistence::ShutdownStatus,
    ports::Controller,
    types::{Action, StateKey},
};

#[derive(Parser, Debug)]
#[command(about = "Drive a game over stdin/stdout")]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Which controller picks the actions
    #[arg(long, value_enum, default_value_t = ControllerKind::QLearning)]
    pub controller: ControllerKind,

    /// Keep the value table in memory only
    #[arg(long)]
    pub no_save: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    QLearning,
    Random,
}

/// One line of input from the game.
#[derive(Debug, Clone, Deserialize)]
pub struct Observation {
    pub state: serde_json::Value,
    #[serde(default)]
    pub reward: f64,
    #[serde(default)]
    pub done: bool,
}

/// Totals for one run of the protocol loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub steps: u64,
    pub episodes: u64,
    pub malformed_lines: u64,
    pub total_reward: f64,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let app = App::new();

    let mut controller: Box<dyn Controller> = match args.controller {
        ControllerKind::QLearning if args.no_save => Box::new(app.create_ephemeral_agent(config)?),
        ControllerKind::QLearning => Box::new(app.create_agent(config)?),
        ControllerKind::Random => {
            let random = RandomController::new(config.action_set.clone());
            Box::new(match config.seed {
                Some(seed) => random.with_seed(seed),
                None => random,
            })
        }
    };
    info!(controller = controller.name(), "waiting for observations on stdin");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let outcome = drive(controller.as_mut(), stdin.lock(), stdout.lock());
    let status = controller.shutdown();

    let summary = outcome?;
    info!(
        steps = summary.steps,
        episodes = summary.episodes,
        malformed = summary.malformed_lines,
        total_reward = summary.total_reward,
        "run finished"
    );
    match status {
        ShutdownStatus::Failed(message) => {
            anyhow::bail!("final snapshot could not be written: {message}")
        }
        ShutdownStatus::TimedOut => warn!("final snapshot did not finish before shutdown timeout"),
        ShutdownStatus::Idle | ShutdownStatus::Completed(_) => {}
    }
    Ok(())
}

/// Run the observation/action loop until `input` is exhausted.
///
/// Malformed lines are logged and skipped. States that cannot be encoded
/// still get an action but are not learned from.
pub fn drive<R: BufRead, W: Write>(
    controller: &mut dyn Controller,
    input: R,
    mut output: W,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut pending: Option<(StateKey, Action)> = None;

    for (index, line) in input.lines().enumerate() {
        let line = line.context("failed to read observation")?;
        if line.trim().is_empty() {
            continue;
        }
        let observation: Observation = match serde_json::from_str(&line) {
            Ok(observation) => observation,
            Err(err) => {
                summary.malformed_lines += 1;
                warn!(line = index + 1, error = %err, "skipping malformed observation");
                continue;
            }
        };
        summary.total_reward += observation.reward;

        let key = match codec::encode(&observation.state) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(line = index + 1, error = %err, "state could not be encoded");
                None
            }
        };

        if let Some((previous, action)) = pending.take() {
            let next = if observation.done { None } else { key.as_ref() };
            controller.learn(&previous, action, observation.reward, next);
        }

        if observation.done {
            controller.end_episode();
            summary.episodes += 1;
            continue;
        }

        let action = match &key {
            Some(key) => controller.select_action(key),
            None => controller.select_action(&StateKey::from(String::new())),
        };
        writeln!(output, "{}", controller.actions().token(action))
            .and_then(|()| output.flush())
            .context("failed to write action")?;
        summary.steps += 1;
        pending = key.map(|key| (key, action));
    }

    Ok(summary)
}
