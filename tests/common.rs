//! Common test utilities for the squaro-agent test suite.

#![allow(dead_code)]

use std::{
    path::Path,
    sync::mpsc::{self, Receiver, Sender},
};

use parking_lot::Mutex;
use squaro_agent::{
    EncodedSnapshot, EnemyState, EnemyType, GameState, Result, Shape, StateKey,
    adapters::InMemoryRepository, codec, ports::SnapshotRepository,
};

/// A game observation with the player at `(x, y)` and one chasing enemy.
pub fn game_state(x: f32, y: f32) -> GameState {
    GameState {
        player_x: x,
        player_y: y,
        enemies: vec![EnemyState {
            x: 0.0,
            y: 0.0,
            shape: Shape::Square,
            enemy_type: EnemyType::Chaser,
        }],
    }
}

/// Distinct state keys.
pub fn keys(count: usize) -> Vec<StateKey> {
    (0..count)
        .map(|i| codec::encode(&game_state(i as f32, 0.0)).unwrap())
        .collect()
}

/// Repository whose writes block until the test releases them.
pub struct GatedRepository {
    pub inner: InMemoryRepository,
    gate: Mutex<Receiver<()>>,
}

impl GatedRepository {
    /// Returns the repository and the sender that releases one write per
    /// message.
    pub fn new() -> (Self, Sender<()>) {
        let (release, gate) = mpsc::channel();
        let repo = Self {
            inner: InMemoryRepository::new(),
            gate: Mutex::new(gate),
        };
        (repo, release)
    }
}

impl SnapshotRepository for GatedRepository {
    fn save(&self, snapshot: &EncodedSnapshot, path: &Path) -> Result<()> {
        let _ = self.gate.lock().recv();
        self.inner.save(snapshot, path)
    }

    fn load(&self, path: &Path) -> Result<Option<EncodedSnapshot>> {
        self.inner.load(path)
    }
}
