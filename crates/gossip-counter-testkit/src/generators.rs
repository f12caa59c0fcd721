//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use gossip_counter_core::{Actor, Counter, Delta, ReplicatedCounterStore, State};

/// Generate an actor name from a small alphabet so that states overlap.
pub fn actor() -> impl Strategy<Value = Actor> {
    "pod-#[0-4]".prop_map(Actor::from)
}

/// Generate a key from a small alphabet so that states overlap.
pub fn key() -> impl Strategy<Value = String> {
    "[a-f]{1,2}".prop_map(String::from)
}

/// Generate a counter value, biased toward small numbers.
pub fn counter() -> impl Strategy<Value = Counter> {
    prop_oneof![
        8 => 0u64..1_000,
        1 => any::<u64>(),
    ]
}

/// Generate a state with up to `max_actors` partitions of up to `max_keys` keys.
pub fn state(max_actors: usize, max_keys: usize) -> impl Strategy<Value = State> {
    prop::collection::btree_map(
        actor(),
        prop::collection::btree_map(key(), counter(), 0..=max_keys),
        0..=max_actors,
    )
}

/// Generate a delta.
pub fn delta() -> impl Strategy<Value = Delta> {
    (actor(), key(), counter()).prop_map(|(actor, key, value)| Delta::new(actor, key, value))
}

/// One step in a replicated execution.
#[derive(Debug, Clone)]
pub enum Op {
    /// Replica `replica` increments `key` locally.
    Increment { replica: usize, key: String },
    /// Replica `from` ships its full state to replica `to`.
    Sync { from: usize, to: usize },
}

/// A random execution over a fixed number of replicas.
#[derive(Debug, Clone)]
pub struct Script {
    pub replicas: usize,
    pub ops: Vec<Op>,
}

impl Arbitrary for Script {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (2usize..=5)
            .prop_flat_map(|replicas| {
                let op = prop_oneof![
                    3 => (0..replicas, key())
                        .prop_map(|(replica, key)| Op::Increment { replica, key }),
                    1 => (0..replicas, 0..replicas)
                        .prop_map(|(from, to)| Op::Sync { from, to }),
                ];
                (Just(replicas), prop::collection::vec(op, 0..64))
            })
            .prop_map(|(replicas, ops)| Script { replicas, ops })
            .boxed()
    }
}

impl Script {
    /// Replay the script on fresh stores named `pod-#0..`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn run(&self, capacity: usize) -> Vec<ReplicatedCounterStore> {
        let stores: Vec<_> = (0..self.replicas)
            .map(|i| {
                ReplicatedCounterStore::new(Actor::new(format!("pod-#{i}")), capacity)
                    .expect("capacity must be positive")
            })
            .collect();

        for op in &self.ops {
            match op {
                Op::Increment { replica, key } => {
                    stores[*replica].increment(key);
                }
                Op::Sync { from, to } => {
                    let snapshot = stores[*from].snapshot();
                    stores[*to].merge(&snapshot);
                }
            }
        }
        stores
    }

    /// Number of increments per key across the whole script.
    pub fn expected_totals(&self) -> BTreeMap<String, Counter> {
        let mut totals = BTreeMap::new();
        for op in &self.ops {
            if let Op::Increment { key, .. } = op {
                *totals.entry(key.clone()).or_insert(0) += 1;
            }
        }
        totals
    }
}

/// Exchange full state between every pair of stores.
pub fn full_exchange(stores: &[ReplicatedCounterStore]) {
    for from in stores {
        let snapshot = from.snapshot();
        for to in stores {
            to.merge(&snapshot);
        }
    }
}
