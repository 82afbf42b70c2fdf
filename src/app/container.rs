//! Dependency injection container for the agent application.
//!
//! This module provides centralized dependency management following hexagonal
//! architecture principles. The container owns infrastructure dependencies and
//! provides factory methods for creating domain objects.

use std::sync::Arc;

use super::config::AgentConfig;
use crate::{
    Result,
    adapters::FileRepository,
    persistence::{LoadOutcome, PersistenceManager},
    ports::SnapshotRepository,
    q_learning::{EpsilonGreedyPolicy, QLearningAgent, TdLearner, ValueStore},
};

/// Application with dependency injection.
///
/// Centralizes creation and wiring of dependencies following hexagonal architecture.
/// All infrastructure dependencies are owned by the app and injected into
/// domain objects.
///
/// # Examples
///
/// ## Production usage
///
/// ```no_run
/// use squaro_agent::app::{App, AgentConfig};
///
/// let app = App::new();
/// let config = AgentConfig::default().with_snapshot_path("runs/q_table.snapshot");
/// let mut agent = app.create_agent(config)?;
/// agent.shutdown();
/// # Ok::<(), squaro_agent::Error>(())
/// ```
///
/// ## Testing with dependency injection
///
/// ```
/// use squaro_agent::app::App;
/// use squaro_agent::adapters::InMemoryRepository;
///
/// let app = App::for_testing()
///     .with_repository(InMemoryRepository::new())
///     .with_default_seed(42)
///     .build();
/// ```
pub struct App {
    /// Repository for snapshot persistence
    snapshot_repository: Arc<dyn SnapshotRepository>,
    /// Default random seed (None = non-deterministic)
    default_seed: Option<u64>,
}

impl App {
    /// Create a new app with production defaults.
    ///
    /// Uses:
    /// - `FileRepository` for snapshot persistence
    /// - No default seed (non-deterministic RNG)
    pub fn new() -> Self {
        Self {
            snapshot_repository: Arc::new(FileRepository::new()),
            default_seed: None,
        }
    }

    /// Create a builder for constructing app with custom dependencies.
    ///
    /// Primarily used for testing with in-memory dependencies.
    pub fn for_testing() -> AppBuilder {
        AppBuilder::new()
    }

    /// Get the snapshot repository.
    ///
    /// Returns an Arc-wrapped repository that can be shared across threads.
    pub fn snapshot_repository(&self) -> Arc<dyn SnapshotRepository> {
        Arc::clone(&self.snapshot_repository)
    }

    /// Persistence manager for the snapshot location named in `config`.
    pub fn persistence_manager(&self, config: &AgentConfig) -> PersistenceManager {
        PersistenceManager::new(
            self.snapshot_repository(),
            config.snapshot_path.clone(),
            config.shutdown_timeout(),
        )
    }

    /// Load the value table named in `config`, starting empty if necessary.
    pub fn open_store(&self, config: &AgentConfig) -> LoadOutcome {
        self.persistence_manager(config).load_from(
            config.capacity,
            config.action_set.clone(),
            config.value_precision,
        )
    }

    /// Create an agent that resumes from, and saves to, the configured
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfiguration`] if `config` fails
    /// validation. A missing or corrupt snapshot is not an error.
    pub fn create_agent(&self, config: AgentConfig) -> Result<QLearningAgent> {
        config.validate()?;
        let persistence = self.persistence_manager(&config);
        let store = persistence
            .load_from(
                config.capacity,
                config.action_set.clone(),
                config.value_precision,
            )
            .into_store();
        Ok(self.assemble(&config, store).with_persistence(persistence))
    }

    /// Create an agent with an empty table that never touches storage.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfiguration`] if `config` fails
    /// validation.
    pub fn create_ephemeral_agent(&self, config: AgentConfig) -> Result<QLearningAgent> {
        config.validate()?;
        let store = ValueStore::new(
            config.capacity,
            config.action_set.clone(),
            config.value_precision,
        );
        Ok(self.assemble(&config, store))
    }

    fn assemble(&self, config: &AgentConfig, store: ValueStore) -> QLearningAgent {
        // Apply seed from config or use container default
        let seed = config.seed.or(self.default_seed);
        let policy = EpsilonGreedyPolicy::new(config.policy_settings(), seed);
        let learner = TdLearner::new(config.learner_settings());
        QLearningAgent::new(store, policy, learner)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing app with custom dependencies.
///
/// Primarily used for testing to inject in-memory repositories and control
/// randomness.
///
/// # Examples
///
/// ```
/// use squaro_agent::app::AppBuilder;
/// use squaro_agent::adapters::InMemoryRepository;
///
/// let app = AppBuilder::new()
///     .with_repository(InMemoryRepository::new())
///     .with_default_seed(42)
///     .build();
/// ```
pub struct AppBuilder {
    snapshot_repository: Option<Arc<dyn SnapshotRepository>>,
    default_seed: Option<u64>,
}

impl AppBuilder {
    /// Create a new app builder.
    pub fn new() -> Self {
        Self {
            snapshot_repository: None,
            default_seed: None,
        }
    }

    /// Set a custom snapshot repository.
    pub fn with_repository<R: SnapshotRepository + 'static>(mut self, repo: R) -> Self {
        self.snapshot_repository = Some(Arc::new(repo));
        self
    }

    /// Set a default random seed for all agents created by this container.
    ///
    /// Useful for creating deterministic tests.
    pub fn with_default_seed(mut self, seed: u64) -> Self {
        self.default_seed = Some(seed);
        self
    }

    /// Build the app with the configured dependencies.
    ///
    /// If no repository was specified, uses `FileRepository` by default.
    pub fn build(self) -> App {
        App {
            snapshot_repository: self
                .snapshot_repository
                .unwrap_or_else(|| Arc::new(FileRepository::new())),
            default_seed: self.default_seed,
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapters::InMemoryRepository, error::Error};

    #[test]
    fn test_app_creates_agent_with_empty_table() {
        let app = App::for_testing()
            .with_repository(InMemoryRepository::new())
            .build();
        let mut agent = app.create_agent(AgentConfig::default()).unwrap();
        assert!(agent.store().is_empty());
        assert!(agent.persistence().is_some());
        agent.shutdown();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let app = App::for_testing()
            .with_repository(InMemoryRepository::new())
            .build();
        let result = app.create_agent(AgentConfig::default().with_learning_rate(2.0));
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_default_seed_makes_agents_repeatable() {
        let app = App::for_testing()
            .with_repository(InMemoryRepository::new())
            .with_default_seed(42)
            .build();
        let config = AgentConfig::default().with_epsilon(1.0).with_action_persistence(1);

        let mut first = app.create_ephemeral_agent(config.clone()).unwrap();
        let mut second = app.create_ephemeral_agent(config).unwrap();
        for step in 0..20 {
            let state = serde_json::json!({ "step": step });
            assert_eq!(first.select_action(&state), second.select_action(&state));
        }
    }

    #[test]
    fn test_created_agent_resumes_saved_table() {
        let repo = InMemoryRepository::new();
        let app = App::for_testing().with_repository(repo.clone()).build();
        let config = AgentConfig::default().with_intervals(0, 0);
        let state = serde_json::json!({"player_x": 1});

        let mut agent = app.create_agent(config.clone()).unwrap();
        let up = agent.store().actions().parse("up").unwrap();
        agent.learn_terminal(&state, up, 1.0);
        agent.shutdown();

        let resumed = app.create_agent(config.clone()).unwrap();
        assert_eq!(resumed.store().len(), 1);
        assert!(app.open_store(&config).is_loaded());
    }
}
