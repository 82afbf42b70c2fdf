//! One-step Q-learning update and the persistence cadence counters.

use crate::{
    q_learning::value_store::ValueStore,
    types::{Action, StateKey},
};

/// Updates applied since the last save and the last prune.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceCounters {
    pub updates_since_save: u64,
    pub updates_since_prune: u64,
}

impl PersistenceCounters {
    fn record_update(&mut self) {
        self.updates_since_save += 1;
        self.updates_since_prune += 1;
    }

    pub fn reset_save(&mut self) {
        self.updates_since_save = 0;
    }

    pub fn reset_prune(&mut self) {
        self.updates_since_prune = 0;
    }
}

/// Follow-up work requested by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnSignals {
    /// The save interval has been reached
    pub save_due: bool,
    /// The prune interval has been reached
    pub prune_due: bool,
}

/// Learning hyperparameters and the save/prune cadence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnerSettings {
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Zero disables periodic saves
    pub save_interval_updates: u64,
    /// Zero disables periodic pruning
    pub prune_interval_updates: u64,
}

/// Q-learning update: off-policy TD control
///
/// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TdLearner {
    settings: LearnerSettings,
}

impl TdLearner {
    pub fn new(settings: LearnerSettings) -> Self {
        Self { settings }
    }

    /// Apply one update for the transition `(state, action, reward, next_state)`.
    ///
    /// A `next_state` of `None` marks a terminal transition, whose future
    /// value is zero. The prune counter is reset here when it fires; the save
    /// counter is left to the caller, which only resets it once a save has
    /// actually been scheduled.
    pub fn learn(
        &self,
        store: &mut ValueStore,
        counters: &mut PersistenceCounters,
        state: &StateKey,
        action: Action,
        reward: f64,
        next_state: Option<&StateKey>,
    ) -> LearnSignals {
        let current_q = store.get_value(state, action);
        let max_next_q = next_state.map_or(0.0, |next| store.max_value(next));
        let td_target = reward + self.settings.discount_factor * max_next_q;
        let td_error = td_target - current_q;
        let new_q = current_q + self.settings.learning_rate * td_error;
        store.set_value(state, action, new_q);

        counters.record_update();
        let save_due = interval_reached(
            counters.updates_since_save,
            self.settings.save_interval_updates,
        );
        let prune_due = interval_reached(
            counters.updates_since_prune,
            self.settings.prune_interval_updates,
        );
        if prune_due {
            counters.reset_prune();
        }
        LearnSignals {
            save_due,
            prune_due,
        }
    }

    pub fn settings(&self) -> &LearnerSettings {
        &self.settings
    }
}

fn interval_reached(count: u64, interval: u64) -> bool {
    interval > 0 && count >= interval
}
