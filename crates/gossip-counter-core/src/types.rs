//! Shared data model for the replicated counter.
//!
//! Identifiers are newtypes so that an actor name cannot be confused with a
//! counter key at compile time.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A non-negative counter value for one (actor, key) pair.
pub type Counter = u64;

/// The full replicated structure held by one replica.
///
/// Maps every known actor to that actor's key/counter entries. Ordered maps
/// keep encoding and digests deterministic.
pub type State = BTreeMap<Actor, BTreeMap<String, Counter>>;

/// Identity of a replica, and the partition key of the replicated state.
///
/// Only the owning replica ever increments its own partition. Every other
/// replica observes it through merges.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    /// Create an actor from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The actor name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Actor({})", self.0)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Actor {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Actor {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Actor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Actor {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A single-partition observation: "actor A's counter for key K is now V".
///
/// A delta carries the new absolute value, not a `+1`, so applying it is
/// idempotent and independent of arrival order. In practice `value` holds
/// exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// The actor whose partition changed.
    pub actor: Actor,
    /// Key to new counter value.
    pub value: BTreeMap<String, Counter>,
}

impl Delta {
    /// Create a delta for a single key.
    pub fn new(actor: Actor, key: impl Into<String>, value: Counter) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(key.into(), value);
        Self {
            actor,
            value: entries,
        }
    }

    /// Counter carried for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Counter> {
        self.value.get(key).copied()
    }

    /// Convert into a one-actor state, the shape a full merge accepts.
    pub fn into_state(self) -> State {
        let mut state = State::new();
        state.insert(self.actor, self.value);
        state
    }
}

/// Aggregate value of `key` in `state`: the sum across all actors.
///
/// Absent entries contribute zero. The sum saturates at `u64::MAX`.
pub fn aggregate(state: &State, key: &str) -> Counter {
    state
        .values()
        .filter_map(|entries| entries.get(key))
        .fold(0, |acc: Counter, v| acc.saturating_add(*v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_display_and_debug() {
        let actor = Actor::from("pod-#0");
        assert_eq!(actor.to_string(), "pod-#0");
        assert_eq!(format!("{:?}", actor), "Actor(pod-#0)");
    }

    #[test]
    fn test_state_lookup_by_str() {
        let mut state = State::new();
        state.insert(Actor::from("A"), BTreeMap::new());
        assert!(state.contains_key("A"));
    }

    #[test]
    fn test_delta_into_state() {
        let delta = Delta::new(Actor::from("A"), "x", 3);
        assert_eq!(delta.get("x"), Some(3));

        let state = delta.into_state();
        assert_eq!(state.len(), 1);
        assert_eq!(state["A"]["x"], 3);
    }

    #[test]
    fn test_aggregate_sums_actors() {
        let mut state = State::new();
        state.insert(Actor::from("A"), BTreeMap::from([("x".to_string(), 2)]));
        state.insert(Actor::from("B"), BTreeMap::from([("x".to_string(), 5)]));
        state.insert(Actor::from("C"), BTreeMap::from([("y".to_string(), 9)]));

        assert_eq!(aggregate(&state, "x"), 7);
        assert_eq!(aggregate(&state, "y"), 9);
        assert_eq!(aggregate(&state, "z"), 0);
    }

    #[test]
    fn test_aggregate_saturates() {
        let mut state = State::new();
        state.insert(Actor::from("A"), BTreeMap::from([("x".to_string(), u64::MAX)]));
        state.insert(Actor::from("B"), BTreeMap::from([("x".to_string(), 1)]));

        assert_eq!(aggregate(&state, "x"), u64::MAX);
    }
}
