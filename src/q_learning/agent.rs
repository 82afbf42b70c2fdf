//! Q-learning agent
//!
//! [`QLearningAgent`] owns everything that makes up a running agent: the
//! value store, the exploration policy, the TD learner, the save/prune
//! counters and, optionally, the persistence manager. Drivers talk to this
//! type only.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    codec,
    persistence::{PersistenceManager, SaveRequest, ShutdownStatus},
    ports::Controller,
    q_learning::{
        learner::{LearnSignals, PersistenceCounters, TdLearner},
        policy::{Decision, EpsilonGreedyPolicy},
        value_store::ValueStore,
    },
    types::{Action, ActionSet, StateKey},
};

/// Running totals for one agent process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub decisions: u64,
    pub explorations: u64,
    pub exploitations: u64,
    pub committed: u64,
    pub updates: u64,
    pub episodes: u64,
    /// States that could not be encoded and were treated as unseen
    pub unencodable_states: u64,
    pub saves_scheduled: u64,
    pub saves_skipped: u64,
    pub prunes: u64,
    pub entries_evicted: u64,
}

/// Tabular Q-learning agent (off-policy TD control)
///
/// The generic [`select_action`](Self::select_action) and
/// [`learn`](Self::learn) accept any serializable state and encode it; the
/// `*_key` variants take keys the caller has already encoded.
#[derive(Debug)]
pub struct QLearningAgent {
    store: ValueStore,
    policy: EpsilonGreedyPolicy,
    learner: TdLearner,
    counters: PersistenceCounters,
    persistence: Option<PersistenceManager>,
    stats: AgentStats,
    shut_down: bool,
}

impl QLearningAgent {
    pub fn new(store: ValueStore, policy: EpsilonGreedyPolicy, learner: TdLearner) -> Self {
        Self {
            store,
            policy,
            learner,
            counters: PersistenceCounters::default(),
            persistence: None,
            stats: AgentStats::default(),
            shut_down: false,
        }
    }

    /// Attach a persistence manager for periodic and final saves.
    pub fn with_persistence(mut self, persistence: PersistenceManager) -> Self {
        self.persistence = Some(persistence);
        self
    }

    fn encode_state<S: Serialize + ?Sized>(&mut self, state: &S) -> Option<StateKey> {
        match codec::encode(state) {
            Ok(key) => Some(key),
            Err(err) => {
                self.stats.unencodable_states += 1;
                warn!(error = %err, "state could not be encoded; treating it as unseen");
                None
            }
        }
    }

    /// Choose the action for `state`.
    pub fn select_action<S: Serialize + ?Sized>(&mut self, state: &S) -> Action {
        let key = self.encode_state(state);
        self.decide(key.as_ref()).0
    }

    /// Choose the action for an already encoded state.
    pub fn select_action_key(&mut self, state: &StateKey) -> Action {
        self.decide(Some(state)).0
    }

    /// Choose an action and report how it was chosen.
    ///
    /// `None` stands for a state that could not be encoded.
    pub fn decide(&mut self, state: Option<&StateKey>) -> (Action, Decision) {
        let (action, decision) = self.policy.select_action(&mut self.store, state);
        self.stats.decisions += 1;
        match decision {
            Decision::Exploring => self.stats.explorations += 1,
            Decision::Exploiting => self.stats.exploitations += 1,
            Decision::Committed => self.stats.committed += 1,
        }
        (action, decision)
    }

    /// Learn from the transition `state --action--> next_state`.
    ///
    /// If `state` cannot be encoded the update is dropped; an unencodable
    /// `next_state` bootstraps from zero like any unseen state.
    pub fn learn<S: Serialize + ?Sized>(
        &mut self,
        state: &S,
        action: Action,
        reward: f64,
        next_state: &S,
    ) {
        let Some(key) = self.encode_state(state) else {
            return;
        };
        let next = self.encode_state(next_state);
        self.learn_key(&key, action, reward, next.as_ref());
    }

    /// Learn from a transition that ended the episode.
    pub fn learn_terminal<S: Serialize + ?Sized>(&mut self, state: &S, action: Action, reward: f64) {
        if let Some(key) = self.encode_state(state) {
            self.learn_key(&key, action, reward, None);
        }
    }

    /// Learn from a transition between encoded states.
    ///
    /// A `next_state` of `None` marks a terminal transition.
    pub fn learn_key(
        &mut self,
        state: &StateKey,
        action: Action,
        reward: f64,
        next_state: Option<&StateKey>,
    ) {
        let evicted_before = self.store.evicted_total();
        let signals = self.learner.learn(
            &mut self.store,
            &mut self.counters,
            state,
            action,
            reward,
            next_state,
        );
        self.stats.updates += 1;
        self.stats.entries_evicted += self.store.evicted_total() - evicted_before;
        self.fire(signals);
    }

    fn fire(&mut self, signals: LearnSignals) {
        if signals.prune_due {
            let report = self.store.prune();
            self.stats.prunes += 1;
            self.stats.entries_evicted += report.evicted as u64;
        }
        if signals.save_due {
            self.request_save();
        }
    }

    /// Hand a copy of the table to the background writer.
    ///
    /// Skipped while a previous write is still in flight; the save counter is
    /// only reset when a write actually starts, so the next update retries.
    /// Nothing is written once the agent has been shut down.
    pub fn request_save(&mut self) -> SaveRequest {
        if self.shut_down {
            return SaveRequest::Skipped;
        }
        let Some(persistence) = self.persistence.as_mut() else {
            return SaveRequest::Skipped;
        };
        if persistence.is_running() {
            self.stats.saves_skipped += 1;
            debug!(
                pending = self.counters.updates_since_save,
                "previous snapshot still being written; will retry"
            );
            return SaveRequest::Skipped;
        }

        let request = persistence.save(self.store.snapshot_records());
        match request {
            SaveRequest::Scheduled => {
                self.stats.saves_scheduled += 1;
                self.counters.reset_save();
            }
            SaveRequest::Skipped => self.stats.saves_skipped += 1,
        }
        request
    }

    /// Multiply epsilon by its decay factor, floored at the minimum.
    pub fn decay_epsilon(&mut self) {
        self.policy.decay_epsilon();
    }

    /// Close an episode: drop the held action and decay epsilon.
    pub fn end_episode(&mut self) {
        self.policy.reset_commitment();
        self.policy.decay_epsilon();
        self.stats.episodes += 1;
        debug!(
            episode = self.stats.episodes,
            epsilon = self.policy.epsilon(),
            "episode finished"
        );
    }

    /// Write the final snapshot and stop the background writer.
    ///
    /// Calling this more than once is harmless; later calls report
    /// [`ShutdownStatus::Idle`].
    pub fn shutdown(&mut self) -> ShutdownStatus {
        if self.shut_down {
            return ShutdownStatus::Idle;
        }
        self.shut_down = true;

        let status = match self.persistence.as_mut() {
            Some(persistence) => persistence.flush(self.store.snapshot_records()),
            None => ShutdownStatus::Idle,
        };
        info!(
            decisions = self.stats.decisions,
            updates = self.stats.updates,
            entries = self.store.len(),
            evicted = self.stats.entries_evicted,
            saves = self.stats.saves_scheduled,
            status = ?status,
            "agent shut down"
        );
        status
    }

    pub fn epsilon(&self) -> f64 {
        self.policy.epsilon()
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn counters(&self) -> PersistenceCounters {
        self.counters
    }

    pub fn policy(&self) -> &EpsilonGreedyPolicy {
        &self.policy
    }

    pub fn persistence(&self) -> Option<&PersistenceManager> {
        self.persistence.as_ref()
    }
}

impl Controller for QLearningAgent {
    fn select_action(&mut self, state: &StateKey) -> Action {
        self.select_action_key(state)
    }

    fn learn(
        &mut self,
        state: &StateKey,
        action: Action,
        reward: f64,
        next_state: Option<&StateKey>,
    ) {
        self.learn_key(state, action, reward, next_state);
    }

    fn end_episode(&mut self) {
        QLearningAgent::end_episode(self);
    }

    fn actions(&self) -> &ActionSet {
        self.store.actions()
    }

    fn name(&self) -> &str {
        "q-learning"
    }

    fn shutdown(&mut self) -> ShutdownStatus {
        QLearningAgent::shutdown(self)
    }
}

impl Drop for QLearningAgent {
    fn drop(&mut self) {
        if !self.shut_down && self.persistence.is_some() {
            self.shutdown();
        }
    }
}
