//! Controller port - the interface a game driver talks to
//!
//! Drivers encode observed states into [`StateKey`]s and hand them to a
//! controller, which answers with actions and learns from the rewards that
//! follow. Keeping the port on pre-encoded keys makes it object-safe, so a
//! driver can switch between the learning agent and baselines at runtime.

use crate::{
    persistence::ShutdownStatus,
    types::{Action, ActionSet, StateKey},
};

/// Unified interface for everything that can drive the game.
///
/// # Examples
///
/// ```
/// use squaro_agent::{codec, ports::Controller, RandomController};
///
/// let mut controller = RandomController::default().with_seed(7);
/// let key = codec::encode(&serde_json::json!({"x": 1}))?;
/// let action = controller.select_action(&key);
/// assert!(controller.actions().get(action.index()).is_some());
/// # Ok::<(), squaro_agent::CodecError>(())
/// ```
pub trait Controller: Send {
    /// Choose the next action for `state`.
    fn select_action(&mut self, state: &StateKey) -> Action;

    /// Learn from one observed transition.
    ///
    /// A `next_state` of `None` marks the end of an episode.
    ///
    /// # Default Implementation
    ///
    /// Does nothing, suitable for non-adaptive controllers.
    fn learn(
        &mut self,
        _state: &StateKey,
        _action: Action,
        _reward: f64,
        _next_state: Option<&StateKey>,
    ) {
    }

    /// Called once an episode has finished.
    fn end_episode(&mut self) {}

    /// The action set this controller chooses from.
    fn actions(&self) -> &ActionSet;

    /// Name used in logs and summaries.
    fn name(&self) -> &str;

    /// Flush state and stop background work.
    ///
    /// # Default Implementation
    ///
    /// Reports [`ShutdownStatus::Idle`]; stateless controllers have nothing
    /// to flush.
    fn shutdown(&mut self) -> ShutdownStatus {
        ShutdownStatus::Idle
    }
}
