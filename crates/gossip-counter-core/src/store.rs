//! The replicated counter store: one bounded map per known actor.
//!
//! The store enforces the merge law for every path that changes it. Local
//! increments only touch the owner's partition; remote observations (deltas
//! and full snapshots) are folded in by pointwise maximum.
//!
//! A reader/writer lock guards the set of partitions. Increments and merges
//! take it exclusively; reads and snapshots share it, so a snapshot is always
//! a single point-in-time view across every actor. Each partition sits behind
//! its own mutex so that a shared read can still refresh recency.

use std::collections::{BTreeMap, HashMap};
use std::iter;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bounded::{BoundedCounterMap, Raise, DEFAULT_NONZERO_CAPACITY};
use crate::error::{CoreError, Result};
use crate::types::{Actor, Counter, Delta, State};

/// Counts of what a merge did, per (actor, key) entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entries that were unseen and have been inserted.
    pub inserted: usize,
    /// Entries whose counter was raised.
    pub raised: usize,
    /// Entries already at or above the incoming value.
    pub unchanged: usize,
    /// Actors seen for the first time.
    pub new_actors: usize,
}

impl MergeOutcome {
    /// Whether the merge changed anything.
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.raised > 0
    }
}

/// Size statistics for a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub actors: usize,
    pub resident_keys: usize,
    pub evictions: u64,
}

type Partition = Mutex<BoundedCounterMap>;
type Partitions = HashMap<Actor, Partition>;

/// A grow-only counter map replicated across actors.
pub struct ReplicatedCounterStore {
    /// The local actor, the only partition `increment` touches.
    actor: Actor,
    /// Capacity of every per-actor map.
    capacity: NonZeroUsize,
    partitions: RwLock<Partitions>,
}

impl ReplicatedCounterStore {
    /// Create a store for `actor` with a per-actor capacity.
    ///
    /// The store starts with a single, empty partition for its own actor.
    pub fn new(actor: Actor, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CoreError::InvalidCapacity(capacity))?;
        Ok(Self::with_capacity(actor, capacity))
    }

    /// Create a store with [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY) keys per actor.
    pub fn with_default_capacity(actor: Actor) -> Self {
        Self::with_capacity(actor, DEFAULT_NONZERO_CAPACITY)
    }

    fn with_capacity(actor: Actor, capacity: NonZeroUsize) -> Self {
        let mut partitions = Partitions::new();
        partitions.insert(actor.clone(), Mutex::new(BoundedCounterMap::new(capacity)));

        Self {
            actor,
            capacity,
            partitions: RwLock::new(partitions),
        }
    }

    /// The local actor.
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Per-actor key capacity.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Increment the local actor's counter for `key`.
    ///
    /// Returns the delta carrying the new absolute value.
    pub fn increment(&self, key: &str) -> Delta {
        let mut partitions = self.write();
        let capacity = self.capacity;
        let own = exclusive(
            partitions
                .entry(self.actor.clone())
                .or_insert_with(|| Mutex::new(BoundedCounterMap::new(capacity))),
        );

        let next = own.get(key).unwrap_or(0).saturating_add(1);
        own.put(key, next);

        Delta::new(self.actor.clone(), key, next)
    }

    /// Aggregate value of `key`: the sum across every known actor.
    ///
    /// Counts as an access to `key` in every partition that holds it.
    pub fn read(&self, key: &str) -> Counter {
        self.read_guard()
            .values()
            .filter_map(|partition| lock(partition).get(key))
            .fold(0, Counter::saturating_add)
    }

    /// A single actor's counter for `key`, without touching recency.
    pub fn counter(&self, actor: &Actor, key: &str) -> Option<Counter> {
        self.read_guard().get(actor).and_then(|p| lock(p).peek(key))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Merge Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge a remote state by pointwise maximum.
    pub fn merge(&self, state: &State) -> MergeOutcome {
        self.merge_entries(state.iter())
    }

    /// Apply a single delta.
    ///
    /// Equivalent to merging `{delta.actor: delta.value}`.
    pub fn apply_delta(&self, delta: &Delta) -> MergeOutcome {
        self.merge_entries(iter::once((&delta.actor, &delta.value)))
    }

    fn merge_entries<'a, I>(&self, entries: I) -> MergeOutcome
    where
        I: Iterator<Item = (&'a Actor, &'a BTreeMap<String, Counter>)>,
    {
        let mut outcome = MergeOutcome::default();
        let mut partitions = self.write();
        let capacity = self.capacity;

        // An actor with nothing to contribute gets no partition.
        for (actor, values) in entries.filter(|(_, values)| !values.is_empty()) {
            let partition = exclusive(partitions.entry(actor.clone()).or_insert_with(|| {
                outcome.new_actors += 1;
                Mutex::new(BoundedCounterMap::new(capacity))
            }));

            for (key, &value) in values {
                match partition.raise(key, value) {
                    Raise::Inserted => outcome.inserted += 1,
                    Raise::Raised => outcome.raised += 1,
                    Raise::Unchanged => outcome.unchanged += 1,
                }
            }
        }

        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────

    /// Materialize every resident (actor, key, value).
    pub fn snapshot(&self) -> State {
        self.read_guard()
            .iter()
            .map(|(actor, partition)| {
                let entries = lock(partition)
                    .iter()
                    .map(|(key, value)| (key.to_owned(), value))
                    .collect();
                (actor.clone(), entries)
            })
            .collect()
    }

    /// Actors with a partition in this store.
    pub fn actors(&self) -> Vec<Actor> {
        let mut actors: Vec<Actor> = self.read_guard().keys().cloned().collect();
        actors.sort();
        actors
    }

    pub fn stats(&self) -> StoreStats {
        let partitions = self.read_guard();
        let mut stats = StoreStats {
            actors: partitions.len(),
            ..StoreStats::default()
        };
        for partition in partitions.values() {
            let partition = lock(partition);
            stats.resident_keys += partition.len();
            stats.evictions += partition.evictions();
        }
        stats
    }

    // A poisoned lock still holds a valid state: every partially applied
    // merge is a pointwise max of the previous state.
    fn read_guard(&self) -> RwLockReadGuard<'_, Partitions> {
        self.partitions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Partitions> {
        self.partitions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(partition: &Partition) -> MutexGuard<'_, BoundedCounterMap> {
    partition.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Access a partition while holding the store's write guard.
fn exclusive(partition: &mut Partition) -> &mut BoundedCounterMap {
    partition.get_mut().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for ReplicatedCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedCounterStore")
            .field("actor", &self.actor)
            .field("stats", &self.stats())
            .finish()
    }
}
