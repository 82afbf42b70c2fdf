//! Epsilon-greedy action selection with action persistence.

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    q_learning::value_store::ValueStore,
    types::{Action, StateKey},
};

/// How an action was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Uniform random action
    Exploring,
    /// Best known action, ties broken at random
    Exploiting,
    /// Previous action repeated while its persistence window is open
    Committed,
}

/// Mutable policy state for the current process. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyRuntimeState {
    pub current_action: Option<Action>,
    pub remaining_persistence_steps: u32,
    pub epsilon: f64,
}

/// Exploration schedule and persistence settings for [`EpsilonGreedyPolicy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicySettings {
    pub epsilon: f64,
    pub min_epsilon: f64,
    pub epsilon_decay: f64,
    pub action_persistence_steps: u32,
}

pub(crate) fn build_rng(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_rng(&mut rand::rng())
    }
}

/// ε-greedy selector that holds each decision for a fixed number of steps.
///
/// A fresh decision is made only when the previous one has been returned
/// `action_persistence_steps` times, so the driven game does not receive a
/// new command on every tick.
#[derive(Debug, Clone)]
pub struct EpsilonGreedyPolicy {
    runtime: PolicyRuntimeState,
    min_epsilon: f64,
    epsilon_decay: f64,
    persistence_steps: u32,
    rng: StdRng,
}

impl EpsilonGreedyPolicy {
    pub fn new(settings: PolicySettings, seed: Option<u64>) -> Self {
        Self {
            runtime: PolicyRuntimeState {
                current_action: None,
                remaining_persistence_steps: 0,
                epsilon: settings.epsilon,
            },
            min_epsilon: settings.min_epsilon,
            epsilon_decay: settings.epsilon_decay,
            persistence_steps: settings.action_persistence_steps,
            rng: build_rng(seed),
        }
    }

    /// Choose the action for `state`.
    ///
    /// `None` stands for a state that could not be encoded; it is treated as
    /// unseen, so every action ties.
    pub fn select_action(
        &mut self,
        store: &mut ValueStore,
        state: Option<&StateKey>,
    ) -> (Action, Decision) {
        if self.runtime.remaining_persistence_steps > 0 {
            if let Some(action) = self.runtime.current_action {
                self.runtime.remaining_persistence_steps -= 1;
                return (action, Decision::Committed);
            }
        }

        let width = store.actions().len();
        let (index, decision) = if self.rng.random::<f64>() < self.runtime.epsilon {
            (self.rng.random_range(0..width), Decision::Exploring)
        } else {
            let values = match state {
                Some(key) => store.action_values(key),
                None => vec![0.0; width],
            };
            (self.greedy_index(&values), Decision::Exploiting)
        };

        let action = store.actions().action_at(index);
        self.runtime.current_action = Some(action);
        self.runtime.remaining_persistence_steps = self.persistence_steps.saturating_sub(1);
        (action, decision)
    }

    /// Index of a maximal value, chosen uniformly among all maxima.
    fn greedy_index(&mut self, values: &[f64]) -> usize {
        let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ties: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, value)| **value == best)
            .map(|(index, _)| index)
            .collect();
        ties.choose(&mut self.rng).copied().unwrap_or(0)
    }

    /// Multiply epsilon by the decay factor, floored at the minimum.
    pub fn decay_epsilon(&mut self) {
        self.runtime.epsilon = (self.runtime.epsilon * self.epsilon_decay).max(self.min_epsilon);
    }

    /// Drop the held action so the next call decides afresh.
    pub fn reset_commitment(&mut self) {
        self.runtime.current_action = None;
        self.runtime.remaining_persistence_steps = 0;
    }

    pub fn epsilon(&self) -> f64 {
        self.runtime.epsilon
    }

    pub fn runtime(&self) -> PolicyRuntimeState {
        self.runtime
    }
}
