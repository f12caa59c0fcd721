//! Deterministic digests over replicated state.
//!
//! Two replicas can compare digests instead of full snapshots to check that
//! they have converged. Zero counters and empty partitions hash as if absent,
//! since both contribute nothing to any aggregate.

use std::fmt;

use crate::types::State;

const DOMAIN: &[u8] = b"gossip-counter-state-v0:";

/// A Blake3 digest of a normalized [`State`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateDigest(pub [u8; 32]);

impl StateDigest {
    /// Digest a state.
    ///
    /// Each non-zero entry is hashed as
    /// `len(actor) || actor || len(key) || key || value`, lengths and values
    /// little-endian, in sorted (actor, key) order.
    pub fn of(state: &State) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN);

        for (actor, entries) in state {
            for (key, value) in entries.iter().filter(|(_, v)| **v > 0) {
                hasher.update(&(actor.as_str().len() as u64).to_le_bytes());
                hasher.update(actor.as_str().as_bytes());
                hasher.update(&(key.len() as u64).to_le_bytes());
                hasher.update(key.as_bytes());
                hasher.update(&value.to_le_bytes());
            }
        }

        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Actor;
    use std::collections::BTreeMap;

    #[test]
    fn test_digest_deterministic() {
        let mut state = State::new();
        state.insert(Actor::from("A"), BTreeMap::from([("x".to_string(), 2)]));

        assert_eq!(StateDigest::of(&state), StateDigest::of(&state.clone()));
    }

    #[test]
    fn test_empty_partition_ignored() {
        let mut a = State::new();
        a.insert(Actor::from("A"), BTreeMap::from([("x".to_string(), 2)]));

        let mut b = a.clone();
        b.insert(Actor::from("B"), BTreeMap::new());
        b.insert(Actor::from("C"), BTreeMap::from([("y".to_string(), 0)]));

        assert_eq!(StateDigest::of(&a), StateDigest::of(&b));
    }

    #[test]
    fn test_different_values_differ() {
        let mut a = State::new();
        a.insert(Actor::from("A"), BTreeMap::from([("x".to_string(), 2)]));
        let mut b = State::new();
        b.insert(Actor::from("A"), BTreeMap::from([("x".to_string(), 3)]));

        assert_ne!(StateDigest::of(&a), StateDigest::of(&b));
    }

    #[test]
    fn test_boundaries_are_unambiguous() {
        let mut a = State::new();
        a.insert(Actor::from("ab"), BTreeMap::from([("c".to_string(), 1)]));
        let mut b = State::new();
        b.insert(Actor::from("a"), BTreeMap::from([("bc".to_string(), 1)]));

        assert_ne!(StateDigest::of(&a), StateDigest::of(&b));
    }
}
