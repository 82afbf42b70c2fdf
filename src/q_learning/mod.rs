//! Tabular Q-learning with a bounded value table
//!
//! This module implements one-step Q-learning for a game driven from outside
//! the process. The value table is bounded: once it outgrows its capacity the
//! least used states are evicted, so a long-running agent keeps a stable
//! memory footprint.
//!
//! ## Components
//!
//! - [`ValueStore`]: capacity-bounded `StateKey → [f64]` table with usage
//!   tracking and snapshot support
//! - [`EpsilonGreedyPolicy`]: ε-greedy selection with action persistence
//! - [`TdLearner`]: the TD(0) update and the save/prune cadence
//! - [`QLearningAgent`]: ties the above together with persistence
//!
//! ## Usage Example
//!
//! ```
//! use squaro_agent::app::{AgentConfig, App};
//! use squaro_agent::adapters::InMemoryRepository;
//!
//! let app = App::for_testing()
//!     .with_repository(InMemoryRepository::new())
//!     .build();
//! let mut agent = app.create_agent(AgentConfig::default().with_seed(7))?;
//!
//! let state = serde_json::json!({"player_x": 3, "player_y": 4, "enemies": []});
//! let next = serde_json::json!({"player_x": 3, "player_y": 5, "enemies": []});
//! let action = agent.select_action(&state);
//! agent.learn(&state, action, 1.0, &next);
//! agent.shutdown();
//! # Ok::<(), squaro_agent::Error>(())
//! ```

pub mod agent;
pub mod learner;
pub mod policy;
pub mod serialization;
pub mod value_store;

// Public re-exports
pub use agent::{AgentStats, QLearningAgent};
pub use learner::{LearnSignals, LearnerSettings, PersistenceCounters, TdLearner};
pub use policy::{Decision, EpsilonGreedyPolicy, PolicyRuntimeState, PolicySettings};
pub use serialization::{SnapshotRecords, SnapshotSummary, summarize};
pub use value_store::{LoadReport, NEUTRAL_VALUE, PruneReport, ValueStore};
