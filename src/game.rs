//! Observation types and reward helpers for the shape-dodging game.
//!
//! The game streams its state as JSON; [`GameState`] mirrors that shape so a
//! driver can deserialize observations into a typed value and hand them to
//! the agent. The game reports progress only as `Current score: N` lines on
//! its console, which [`parse_score`] and [`RewardTracker`] turn into
//! per-step rewards.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Enemy outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Square,
    Circle,
    Triangle,
}

/// Enemy movement behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyType {
    /// Moves towards the player
    Chaser,
    /// Wanders in a random direction
    Random,
    /// Moves away from the player
    Avoider,
}

impl Shape {
    /// Behaviour the game assigns to enemies of this shape.
    pub fn behaviour(self) -> EnemyType {
        match self {
            Shape::Square => EnemyType::Chaser,
            Shape::Circle => EnemyType::Random,
            Shape::Triangle => EnemyType::Avoider,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    pub x: f32,
    pub y: f32,
    pub shape: Shape,
    pub enemy_type: EnemyType,
}

/// One observation of the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub player_x: f32,
    pub player_y: f32,
    pub enemies: Vec<EnemyState>,
}

impl GameState {
    /// Copy of the state with every coordinate snapped to a grid of `cell`
    /// units, so nearby positions share a key.
    pub fn quantized(&self, cell: f32) -> GameState {
        let snap = |v: f32| if cell > 0.0 { (v / cell).floor() * cell } else { v };
        GameState {
            player_x: snap(self.player_x),
            player_y: snap(self.player_y),
            enemies: self
                .enemies
                .iter()
                .map(|enemy| EnemyState {
                    x: snap(enemy.x),
                    y: snap(enemy.y),
                    ..enemy.clone()
                })
                .collect(),
        }
    }
}

static SCORE_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Current score:\s*(\d+)").ok());

/// Last `Current score: N` value in `output`, if any.
pub fn parse_score(output: &str) -> Option<u64> {
    let pattern = SCORE_LINE.as_ref()?;
    pattern
        .captures_iter(output)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .last()
}

/// Turns a stream of cumulative scores into per-step rewards.
///
/// The reward for an observation is the increase over the previous score. A
/// score lower than the previous one means the game restarted; that step is
/// rewarded with zero and becomes the new baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewardTracker {
    last: Option<u64>,
    best: u64,
    restarts: u64,
}

impl RewardTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a score and return the reward it earned.
    pub fn observe(&mut self, score: u64) -> f64 {
        let reward = match self.last {
            Some(last) if score >= last => (score - last) as f64,
            Some(_) => {
                self.restarts += 1;
                0.0
            }
            None => score as f64,
        };
        self.last = Some(score);
        self.best = self.best.max(score);
        reward
    }

    /// Scan a chunk of console output and reward its last score.
    ///
    /// Returns `None` when the chunk contains no score line.
    pub fn observe_output(&mut self, output: &str) -> Option<f64> {
        parse_score(output).map(|score| self.observe(score))
    }

    pub fn last_score(&self) -> Option<u64> {
        self.last
    }

    pub fn best_score(&self) -> u64 {
        self.best
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn parse_score_takes_last_match() {
        let output = "boot\nCurrent score: 10\nhit\nCurrent score:   42\n";
        assert_eq!(parse_score(output), Some(42));
        assert_eq!(parse_score("Score: 9"), None);
        assert_eq!(parse_score(""), None);
    }

    #[test]
    fn tracker_rewards_increases() {
        let mut tracker = RewardTracker::new();
        assert_eq!(tracker.observe(5), 5.0);
        assert_eq!(tracker.observe(5), 0.0);
        assert_eq!(tracker.observe(12), 7.0);
        assert_eq!(tracker.observe(3), 0.0);
        assert_eq!(tracker.restarts(), 1);
        assert_eq!(tracker.best_score(), 12);
        assert_eq!(tracker.last_score(), Some(3));
        assert_eq!(tracker.observe_output("Current score: 4"), Some(1.0));
        assert_eq!(tracker.observe_output("nothing"), None);
    }

    #[test]
    fn game_state_parses_wire_json() {
        let json = r#"{
            "player_x": 400.0, "player_y": 300.0,
            "enemies": [{"x": 10.5, "y": 20.0, "shape": "Square", "enemy_type": "Chaser"}]
        }"#;
        let state: GameState = serde_json::from_str(json).unwrap();
        assert_eq!(state.enemies.len(), 1);
        assert_eq!(state.enemies[0].shape.behaviour(), state.enemies[0].enemy_type);
    }

    #[test]
    fn quantized_states_share_keys() {
        let a = GameState {
            player_x: 101.0,
            player_y: 52.0,
            enemies: vec![],
        };
        let b = GameState {
            player_x: 109.5,
            player_y: 58.0,
            ..a.clone()
        };
        assert_ne!(codec::encode(&a).unwrap(), codec::encode(&b).unwrap());
        assert_eq!(
            codec::encode(&a.quantized(10.0)).unwrap(),
            codec::encode(&b.quantized(10.0)).unwrap()
        );
    }
}
