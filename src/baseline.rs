//! Non-learning controllers used as baselines.

use rand::{Rng, rngs::StdRng};

use crate::{
    ports::Controller,
    q_learning::policy::build_rng,
    types::{Action, ActionSet, StateKey},
};

/// Picks a uniformly random action every step and never learns.
#[derive(Debug, Clone)]
pub struct RandomController {
    actions: ActionSet,
    rng: StdRng,
}

impl RandomController {
    pub fn new(actions: ActionSet) -> Self {
        Self {
            actions,
            rng: build_rng(None),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = build_rng(Some(seed));
        self
    }
}

impl Default for RandomController {
    fn default() -> Self {
        Self::new(ActionSet::default())
    }
}

impl Controller for RandomController {
    fn select_action(&mut self, _state: &StateKey) -> Action {
        let index = self.rng.random_range(0..self.actions.len());
        self.actions.action_at(index)
    }

    fn actions(&self) -> &ActionSet {
        &self.actions
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_action() {
        let mut controller = RandomController::default().with_seed(3);
        let key = StateKey::from("k");
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[controller.select_action(&key).index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn seeded_controllers_agree() {
        let key = StateKey::from("k");
        let mut a = RandomController::default().with_seed(9);
        let mut b = RandomController::default().with_seed(9);
        for _ in 0..50 {
            assert_eq!(a.select_action(&key), b.select_action(&key));
        }
    }
}
