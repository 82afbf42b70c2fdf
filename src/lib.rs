//! Tabular Q-learning agent for driving an external game
//!
//! This crate provides:
//! - A deterministic, text-safe state codec
//! - A capacity-bounded value table with usage-based eviction
//! - ε-greedy action selection with action persistence
//! - One-step TD learning
//! - Snapshot persistence off the decision path, with cold-start recovery
//! - A stdin/stdout driver and snapshot maintenance commands

pub mod adapters;
pub mod app;
pub mod baseline;
pub mod cli;
pub mod codec;
pub mod error;
pub mod game;
pub mod persistence;
pub mod ports;
pub mod q_learning;
pub mod types;

pub use baseline::RandomController;
pub use error::{CodecError, Error, Result};
pub use game::{EnemyState, EnemyType, GameState, RewardTracker, Shape, parse_score};
pub use persistence::{LoadOutcome, PersistenceManager, SaveRequest, ShutdownStatus};
pub use q_learning::{AgentStats, Decision, QLearningAgent, ValueStore};
pub use types::{Action, ActionSet, EncodedSnapshot, StateKey};
