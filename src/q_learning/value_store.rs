//! Bounded, usage-tracked value table for temporal difference learning
//!
//! Each state key owns one row of action values. Every entry carries a usage
//! counter and the tick of its last access; an ordered index over
//! `(usage, last_touch)` keeps entries sorted from least to most used, so a
//! prune pass walks the front of the index instead of re-sorting the table.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::{
    codec,
    error::CodecError,
    q_learning::serialization::{self, RowRecord, SnapshotRecords},
    types::{Action, ActionSet, EncodedSnapshot, StateKey},
};

/// Value returned for states and actions that have never been written.
pub const NEUTRAL_VALUE: f64 = 0.0;

#[derive(Debug, Clone)]
struct Entry {
    values: Box<[f64]>,
    usage: u64,
    last_touch: u64,
}

/// Position of an entry in the eviction order.
type Slot = (u64, u64);

/// Outcome of a prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Number of fixed-fraction passes run
    pub passes: usize,
    /// Number of entries removed
    pub evicted: usize,
}

/// Outcome of a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records inserted into the store
    pub loaded: usize,
    /// Records skipped because their key or values could not be decoded
    pub skipped: usize,
    /// Individual values dropped because their action is not in the action set
    pub ignored_values: usize,
    /// Records that repeated a key already loaded from the same snapshot;
    /// the later copy replaces the earlier one
    pub duplicates: usize,
    /// Entries evicted by the prune that runs once the load completes
    pub pruned: usize,
}

/// Capacity-bounded mapping from state key to action-value row.
///
/// Reads of unseen states or actions return [`NEUTRAL_VALUE`]; no accessor
/// ever fails. Values are quantized to a fixed number of decimal places
/// before they are stored.
#[derive(Debug, Clone)]
pub struct ValueStore {
    entries: HashMap<StateKey, Entry>,
    order: BTreeMap<Slot, StateKey>,
    actions: ActionSet,
    capacity: usize,
    precision: u32,
    scale: f64,
    clock: u64,
    loading: bool,
    evicted_total: u64,
}

impl ValueStore {
    /// Create an empty store.
    ///
    /// A capacity of zero is raised to one so the entry being written can
    /// always be kept.
    pub fn new(capacity: usize, actions: ActionSet, precision: u32) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            actions,
            capacity: capacity.max(1),
            precision,
            scale: 10f64.powi(precision as i32),
            clock: 0,
            loading: false,
            evicted_total: 0,
        }
    }

    /// Get the value of `action` in `state`, counting as an access.
    pub fn get_value(&mut self, state: &StateKey, action: Action) -> f64 {
        self.touch(state.as_str())
            .and_then(|entry| entry.values.get(action.index()).copied())
            .unwrap_or(NEUTRAL_VALUE)
    }

    /// Get the full row for `state`, counting as one access.
    ///
    /// Unseen states yield a row of neutral values.
    pub fn action_values(&mut self, state: &StateKey) -> Vec<f64> {
        let width = self.actions.len();
        self.touch(state.as_str())
            .map(|entry| entry.values.to_vec())
            .unwrap_or_else(|| vec![NEUTRAL_VALUE; width])
    }

    /// Maximum value over all actions in `state`, counting as one access.
    pub fn max_value(&mut self, state: &StateKey) -> f64 {
        self.touch(state.as_str())
            .map(|entry| {
                entry
                    .values
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max)
            })
            .filter(|max| max.is_finite())
            .unwrap_or(NEUTRAL_VALUE)
    }

    /// Upsert the value of `action` in `state`.
    ///
    /// The value is quantized first. If the insert pushes the store over
    /// capacity, a prune runs immediately; the entry just written is never
    /// chosen as its victim.
    pub fn set_value(&mut self, state: &StateKey, action: Action, value: f64) {
        if action.index() >= self.actions.len() {
            debug!(action = %action, "ignoring write for action outside the action set");
            return;
        }
        if !value.is_finite() {
            warn!(state = %state, action = self.actions.token(action), "ignoring non-finite value");
            return;
        }
        let value = self.quantize(value);

        if let Some(entry) = self.touch(state.as_str()) {
            entry.values[action.index()] = value;
            return;
        }

        let mut values = vec![NEUTRAL_VALUE; self.actions.len()].into_boxed_slice();
        values[action.index()] = value;
        self.insert_entry(state.clone(), values, 1);

        if !self.loading && self.entries.len() > self.capacity {
            self.evict(Some(state.as_str()));
        }
    }

    /// Evict least-used entries until the store is within capacity.
    ///
    /// Entries are ordered by ascending usage, ties broken by least recent
    /// access. Each pass removes the lowest tenth of the store (at least one
    /// entry) but stops as soon as the size is back within capacity; passes
    /// repeat until that holds. A store already within capacity is left
    /// untouched.
    pub fn prune(&mut self) -> PruneReport {
        self.evict(None)
    }

    fn evict(&mut self, protected: Option<&str>) -> PruneReport {
        let mut report = PruneReport::default();

        while self.entries.len() > self.capacity {
            let quota = (self.entries.len() / 10).max(1);
            let overflow = self.entries.len() - self.capacity;
            let victims: Vec<Slot> = self
                .order
                .iter()
                .filter(|(_, key)| Some(key.as_str()) != protected)
                .take(quota.min(overflow))
                .map(|(slot, _)| *slot)
                .collect();
            if victims.is_empty() {
                break;
            }

            report.passes += 1;
            for slot in victims {
                if let Some(key) = self.order.remove(&slot) {
                    self.entries.remove(key.as_str());
                    report.evicted += 1;
                }
            }
        }

        if report.evicted > 0 {
            self.evicted_total += report.evicted as u64;
            debug!(
                passes = report.passes,
                evicted = report.evicted,
                remaining = self.entries.len(),
                "pruned value store"
            );
        }
        report
    }

    /// Copy the current contents for encoding elsewhere.
    ///
    /// This is a plain copy of every row, cheap enough to take on the
    /// decision path; compression and encoding happen when the copy is
    /// encoded.
    pub fn snapshot_records(&self) -> SnapshotRecords {
        let records = self
            .entries
            .iter()
            .map(|(key, entry)| RowRecord {
                key: key.clone(),
                usage: entry.usage,
                last_touch: entry.last_touch,
                values: entry.values.clone(),
            })
            .collect();
        SnapshotRecords::new(self.actions.clone(), records)
    }

    /// Encoded, compressed representation of the current contents.
    pub fn snapshot(&self) -> Result<EncodedSnapshot, CodecError> {
        self.snapshot_records().encode()
    }

    /// Bulk-insert the records of an encoded snapshot.
    ///
    /// Eviction is suspended while records are inserted, so a snapshot larger
    /// than the capacity keeps its true usage history; a single prune runs
    /// once every record is in. Records whose key or values fail to decode
    /// are skipped and counted.
    ///
    /// # Errors
    ///
    /// Returns the container error if the snapshot as a whole cannot be
    /// decoded. The store is left empty in that case.
    pub fn load(&mut self, snapshot: &EncodedSnapshot) -> Result<LoadReport, CodecError> {
        let mut file = match serialization::decode_container(snapshot) {
            Ok(file) => file,
            Err(err) => {
                self.clear();
                return Err(err);
            }
        };

        file.records.sort_by_key(|record| record.last_touch);

        let mut report = LoadReport::default();
        let mut seen = HashSet::with_capacity(file.records.len());
        self.loading = true;
        for record in file.records {
            let key = record.key.clone();
            match self.load_record(record) {
                Ok(ignored) => {
                    if seen.insert(key) {
                        report.loaded += 1;
                    } else {
                        report.duplicates += 1;
                    }
                    report.ignored_values += ignored;
                }
                Err((key, err)) => {
                    report.skipped += 1;
                    debug!(key = %key, error = %err, "skipping undecodable snapshot record");
                }
            }
        }
        self.loading = false;

        report.pruned = self.prune().evicted;
        if report.skipped > 0 {
            warn!(
                skipped = report.skipped,
                loaded = report.loaded,
                "snapshot contained undecodable records"
            );
        }
        Ok(report)
    }

    fn load_record(
        &mut self,
        record: serialization::FileRecord,
    ) -> Result<usize, (StateKey, CodecError)> {
        if let Err(err) = codec::validate(&record.key) {
            return Err((record.key, err));
        }

        let mut values = vec![NEUTRAL_VALUE; self.actions.len()].into_boxed_slice();
        let mut ignored = 0;
        for (token, value) in &record.values {
            if !value.is_finite() {
                let err = CodecError::NonFiniteValue {
                    action: token.clone(),
                };
                return Err((record.key, err));
            }
            match self.actions.parse(token) {
                Some(action) => values[action.index()] = self.quantize(*value),
                None => ignored += 1,
            }
        }

        self.remove(record.key.as_str());
        self.insert_entry(record.key, values, record.usage.max(1));
        Ok(ignored)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Change the capacity. Takes effect at the next prune.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Decimal places values are rounded to.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Total entries evicted over the lifetime of the store.
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn contains(&self, state: &StateKey) -> bool {
        self.entries.contains_key(state.as_str())
    }

    /// Usage counter of a state, without counting as an access.
    pub fn usage(&self, state: &StateKey) -> Option<u64> {
        self.entries.get(state.as_str()).map(|entry| entry.usage)
    }

    /// Row of a state, without counting as an access.
    pub fn peek(&self, state: &StateKey) -> Option<&[f64]> {
        self.entries.get(state.as_str()).map(|entry| &*entry.values)
    }

    /// Iterate over all rows in no particular order, without touching them.
    pub fn rows(&self) -> impl Iterator<Item = (&StateKey, &[f64])> {
        self.entries
            .iter()
            .map(|(key, entry)| (key, &*entry.values))
    }

    /// Keys ordered from most to least used.
    pub fn hottest(&self) -> impl Iterator<Item = (&StateKey, u64)> {
        self.order
            .iter()
            .rev()
            .map(|((usage, _), key)| (key, *usage))
    }

    fn quantize(&self, value: f64) -> f64 {
        let quantized = (value * self.scale).round() / self.scale;
        if quantized.is_finite() { quantized } else { value }
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, key: &str) -> Option<&mut Entry> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        let owned = self.order.remove(&(entry.usage, entry.last_touch));
        debug_assert!(owned.is_some(), "entry missing from eviction order");

        entry.usage = entry.usage.saturating_add(1);
        entry.last_touch = tick;
        let owned = owned.unwrap_or_else(|| StateKey::from(key));
        self.order.insert((entry.usage, tick), owned);
        Some(entry)
    }

    fn insert_entry(&mut self, key: StateKey, values: Box<[f64]>, usage: u64) {
        let tick = self.next_tick();
        self.order.insert((usage, tick), key.clone());
        self.entries.insert(
            key,
            Entry {
                values,
                usage,
                last_touch: tick,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.order.remove(&(entry.usage, entry.last_touch));
        }
    }
}
