//! Configuration types for agent creation.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    q_learning::{LearnerSettings, PolicySettings},
    types::ActionSet,
};

/// Configuration for creating a Q-learning agent.
///
/// This type provides a type-safe, builder-style API for configuring agents
/// before creation through the dependency injection container. It also
/// deserializes from JSON; missing fields take their defaults.
///
/// # Examples
///
/// ```
/// use squaro_agent::app::AgentConfig;
///
/// let config = AgentConfig::default()
///     .with_seed(42)
///     .with_capacity(500)
///     .with_epsilon(0.2);
/// assert!(config.validate().is_ok());
///
/// let from_json: AgentConfig = serde_json::from_str(r#"{"capacity": 64}"#)?;
/// assert_eq!(from_json.capacity, 64);
/// assert_eq!(from_json.discount_factor, 0.95);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum number of states kept in the value table
    pub capacity: usize,
    /// TD step size α
    pub learning_rate: f64,
    /// Discount γ applied to the bootstrapped next-state value
    pub discount_factor: f64,
    /// Initial exploration rate
    pub epsilon: f64,
    pub min_epsilon: f64,
    /// Multiplicative decay applied at the end of each episode
    pub epsilon_decay: f64,
    /// Number of consecutive calls that return the same decision
    pub action_persistence_steps: u32,
    /// Updates between background saves (0 disables)
    pub save_interval_updates: u64,
    /// Updates between prune passes (0 disables)
    pub prune_interval_updates: u64,
    pub action_set: ActionSet,
    /// Decimal places values are rounded to before storage
    pub value_precision: u32,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
    pub snapshot_path: PathBuf,
    /// How long shutdown waits for the final snapshot
    pub shutdown_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 0.1,
            min_epsilon: 0.01,
            epsilon_decay: 0.995,
            action_persistence_steps: 5,
            save_interval_updates: 1_000,
            prune_interval_updates: 500,
            action_set: ActionSet::default(),
            value_precision: 4,
            seed: None,
            snapshot_path: PathBuf::from("q_table.snapshot"),
            shutdown_timeout_ms: 5_000,
        }
    }
}

const MAX_VALUE_PRECISION: u32 = 12;

impl AgentConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_discount_factor(mut self, discount_factor: f64) -> Self {
        self.discount_factor = discount_factor;
        self
    }

    /// Set the initial exploration rate.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the decay factor and the floor of the exploration schedule.
    pub fn with_epsilon_schedule(mut self, decay: f64, min_epsilon: f64) -> Self {
        self.epsilon_decay = decay;
        self.min_epsilon = min_epsilon;
        self
    }

    pub fn with_action_persistence(mut self, steps: u32) -> Self {
        self.action_persistence_steps = steps;
        self
    }

    /// Set the save and prune cadence in updates.
    pub fn with_intervals(mut self, save_every: u64, prune_every: u64) -> Self {
        self.save_interval_updates = save_every;
        self.prune_interval_updates = prune_every;
        self
    }

    pub fn with_action_set(mut self, actions: ActionSet) -> Self {
        self.action_set = actions;
        self
    }

    pub fn with_value_precision(mut self, precision: u32) -> Self {
        self.value_precision = precision;
        self
    }

    /// Set the random seed for deterministic behavior.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn policy_settings(&self) -> PolicySettings {
        PolicySettings {
            epsilon: self.epsilon,
            min_epsilon: self.min_epsilon,
            epsilon_decay: self.epsilon_decay,
            action_persistence_steps: self.action_persistence_steps,
        }
    }

    pub fn learner_settings(&self) -> LearnerSettings {
        LearnerSettings {
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            save_interval_updates: self.save_interval_updates,
            prune_interval_updates: self.prune_interval_updates,
        }
    }

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(invalid("capacity must be at least 1"));
        }
        unit_interval("learning_rate", self.learning_rate, false)?;
        unit_interval("discount_factor", self.discount_factor, true)?;
        unit_interval("epsilon", self.epsilon, true)?;
        unit_interval("min_epsilon", self.min_epsilon, true)?;
        unit_interval("epsilon_decay", self.epsilon_decay, false)?;
        if self.min_epsilon > self.epsilon {
            return Err(invalid(format!(
                "min_epsilon ({}) must not exceed epsilon ({})",
                self.min_epsilon, self.epsilon
            )));
        }
        if self.value_precision > MAX_VALUE_PRECISION {
            return Err(invalid(format!(
                "value_precision must be at most {MAX_VALUE_PRECISION}, got {}",
                self.value_precision
            )));
        }
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(invalid("snapshot_path must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfiguration {
        message: message.into(),
    }
}

/// `value` must lie in `(0, 1]`, or `[0, 1]` when `allow_zero` is set.
fn unit_interval(name: &str, value: f64, allow_zero: bool) -> Result<()> {
    let lower_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if lower_ok && value <= 1.0 {
        Ok(())
    } else {
        let range = if allow_zero { "[0, 1]" } else { "(0, 1]" };
        Err(invalid(format!("{name} must be in {range}, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AgentConfig::default();
        config.validate().unwrap();
        assert_eq!(config.capacity, 10_000);
        assert_eq!(config.action_persistence_steps, 5);
        assert_eq!(config.action_set.tokens(), ["up", "down", "left", "right"]);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            AgentConfig::default().with_capacity(0),
            AgentConfig::default().with_learning_rate(0.0),
            AgentConfig::default().with_learning_rate(1.5),
            AgentConfig::default().with_discount_factor(-0.1),
            AgentConfig::default().with_epsilon(f64::NAN),
            AgentConfig::default().with_epsilon_schedule(0.0, 0.01),
            AgentConfig::default().with_epsilon(0.05).with_epsilon_schedule(0.9, 0.1),
            AgentConfig::default().with_value_precision(20),
            AgentConfig::default().with_snapshot_path(""),
        ];
        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, Error::InvalidConfiguration { .. }), "{config:?}");
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"epsilon": 0.3, "action_set": ["fire", "wait"]}"#).unwrap();
        assert_eq!(config.epsilon, 0.3);
        assert_eq!(config.action_set.len(), 2);
        assert_eq!(config.save_interval_updates, 1_000);
    }

    #[test]
    fn invalid_action_set_fails_to_deserialize() {
        let result = serde_json::from_str::<AgentConfig>(r#"{"action_set": []}"#);
        assert!(result.is_err());
    }
}
