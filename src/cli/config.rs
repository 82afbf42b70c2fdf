//! Shared configuration arguments for CLI commands
//!
//! Agent settings come from three layers: built-in defaults, an optional JSON
//! config file, and command-line flags, with later layers winning.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Args;

use crate::{app::AgentConfig, types::ActionSet};

/// Flags that override individual [`AgentConfig`] fields.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON file with agent settings
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Value-table snapshot to resume from and save to
    #[arg(long, short = 's')]
    pub snapshot: Option<PathBuf>,

    /// Maximum number of states kept in memory
    #[arg(long)]
    pub capacity: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    #[arg(long)]
    pub discount: Option<f64>,

    /// Initial exploration rate
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Consecutive steps each decision is held for
    #[arg(long)]
    pub persistence_steps: Option<u32>,

    /// Updates between background saves (0 disables)
    #[arg(long)]
    pub save_every: Option<u64>,

    /// Updates between prune passes (0 disables)
    #[arg(long)]
    pub prune_every: Option<u64>,

    /// Comma-separated action tokens
    #[arg(long, value_delimiter = ',')]
    pub actions: Option<Vec<String>>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ConfigArgs {
    /// Build the effective configuration and validate it.
    pub fn resolve(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => AgentConfig::default(),
        };

        if let Some(path) = &self.snapshot {
            config.snapshot_path = path.clone();
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(rate) = self.learning_rate {
            config.learning_rate = rate;
        }
        if let Some(discount) = self.discount {
            config.discount_factor = discount;
        }
        if let Some(epsilon) = self.epsilon {
            config.epsilon = epsilon;
            config.min_epsilon = config.min_epsilon.min(epsilon);
        }
        if let Some(steps) = self.persistence_steps {
            config.action_persistence_steps = steps;
        }
        if let Some(every) = self.save_every {
            config.save_interval_updates = every;
        }
        if let Some(every) = self.prune_every {
            config.prune_interval_updates = every;
        }
        if let Some(tokens) = &self.actions {
            config.action_set = ActionSet::new(tokens.iter().map(|t| t.trim().to_string()))
                .context("invalid --actions")?;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }

        config.validate().context("invalid agent configuration")?;
        Ok(config)
    }
}

fn load_config_file(path: &Path) -> Result<AgentConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn flags_override_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"capacity": 50, "epsilon": 0.4, "seed": 1}}"#).unwrap();

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            capacity: Some(80),
            actions: Some(vec!["fire".into(), " wait".into()]),
            ..ConfigArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.capacity, 80);
        assert_eq!(config.epsilon, 0.4);
        assert_eq!(config.seed, Some(1));
        assert_eq!(config.action_set.tokens(), ["fire", "wait"]);
    }

    #[test]
    fn lowering_epsilon_lowers_the_floor() {
        let args = ConfigArgs {
            epsilon: Some(0.0),
            ..ConfigArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.epsilon, 0.0);
        assert_eq!(config.min_epsilon, 0.0);
    }

    #[test]
    fn invalid_values_are_reported() {
        let args = ConfigArgs {
            discount: Some(3.0),
            ..ConfigArgs::default()
        };
        assert!(args.resolve().is_err());

        let args = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/agent.json")),
            ..ConfigArgs::default()
        };
        assert!(args.resolve().is_err());
    }
}
