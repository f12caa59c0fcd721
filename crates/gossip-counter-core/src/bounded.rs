//! Per-actor key/counter container with least-recently-used eviction.
//!
//! A [`BoundedCounterMap`] holds one actor's contribution to the replicated
//! state. Its size is capped; inserting a new key into a full map evicts the
//! least-recently-accessed key.
//!
//! Eviction is a bounded-memory trade-off, not CRDT-correct behavior: an
//! evicted (actor, key) value is lost to this replica and may later reappear
//! at a lower value (or not at all) if no other replica still holds it. The
//! monotonicity guarantee only covers keys that were never evicted.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::error::{CoreError, Result};
use crate::types::Counter;

/// Default maximum number of distinct keys per actor.
pub const DEFAULT_CAPACITY: usize = 1 << 20;

pub(crate) const DEFAULT_NONZERO_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CAPACITY) {
    Some(capacity) => capacity,
    None => panic!("DEFAULT_CAPACITY must be non-zero"),
};

/// Outcome of a pointwise-max update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raise {
    /// The key was absent and has been inserted.
    Inserted,
    /// The key was present with a smaller value and has been raised.
    Raised,
    /// The key was present with an equal or larger value.
    Unchanged,
}

/// A key to counter map bounded to a fixed number of keys.
///
/// Any `get` or `put` counts as an access for eviction purposes. `peek` and
/// the update path of `raise` do not.
///
/// Storage grows with the resident keys; the bound is enforced on insert.
pub struct BoundedCounterMap {
    entries: LruCache<String, Counter>,
    capacity: NonZeroUsize,
    evictions: u64,
}

impl BoundedCounterMap {
    /// Create a map holding at most `capacity` keys.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
            evictions: 0,
        }
    }

    /// Create a map from a raw capacity, rejecting zero.
    pub fn try_new(capacity: usize) -> Result<Self> {
        NonZeroUsize::new(capacity)
            .map(Self::new)
            .ok_or(CoreError::InvalidCapacity(capacity))
    }

    /// Read a counter, marking the key as recently used.
    pub fn get(&mut self, key: &str) -> Option<Counter> {
        self.entries.get(key).copied()
    }

    /// Read a counter without touching recency order.
    pub fn peek(&self, key: &str) -> Option<Counter> {
        self.entries.peek(key).copied()
    }

    /// Insert or overwrite a counter.
    ///
    /// If the map is full and `key` is new, the least-recently-used entry is
    /// evicted and its value is dropped.
    pub fn put(&mut self, key: impl Into<String>, value: Counter) {
        let key = key.into();
        if self.is_full()
            && !self.entries.contains(key.as_str())
            && self.entries.pop_lru().is_some()
        {
            self.evictions += 1;
        }
        self.entries.put(key, value);
    }

    /// Apply `existing = max(existing, value)` for `key`.
    ///
    /// An absent key is inserted (and may evict). A present key is raised in
    /// place without refreshing its recency.
    pub fn raise(&mut self, key: &str, value: Counter) -> Raise {
        if let Some(existing) = self.entries.peek_mut(key) {
            if *existing >= value {
                return Raise::Unchanged;
            }
            *existing = value;
            return Raise::Raised;
        }
        self.put(key, value);
        Raise::Inserted
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Resident keys, most recently used first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Resident entries, most recently used first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Counter)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of entries evicted since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity()
    }
}

impl Default for BoundedCounterMap {
    fn default() -> Self {
        Self::new(DEFAULT_NONZERO_CAPACITY)
    }
}

impl std::fmt::Debug for BoundedCounterMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCounterMap")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("evictions", &self.evictions)
            .finish()
    }
}
