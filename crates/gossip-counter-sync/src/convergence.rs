//! Convergence verification for replicated counters.
//!
//! Once gossip has quiesced, replicas can verify they hold the same state by
//! comparing [`StateDigest`]s instead of shipping full snapshots.

use std::collections::BTreeSet;

use gossip_counter_core::{Actor, State, StateDigest};

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both replicas have identical state.
    Converged,
    /// Replicas have not yet converged (may need more rounds).
    NotConverged { reason: String },
}

impl ConvergenceResult {
    /// Check if replicas have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Verify the local state against a digest reported by a peer.
pub fn verify_convergence(local: &State, remote: &StateDigest) -> ConvergenceResult {
    let local_digest = StateDigest::of(local);
    if local_digest == *remote {
        ConvergenceResult::Converged
    } else {
        ConvergenceResult::NotConverged {
            reason: format!("state digest mismatch: local={local_digest}, remote={remote}"),
        }
    }
}

/// (Actor, Key) pairs whose counters differ between two states.
///
/// An absent entry counts as zero.
pub fn diverging_pairs(a: &State, b: &State) -> Vec<(Actor, String)> {
    let actors: BTreeSet<&Actor> = a.keys().chain(b.keys()).collect();
    let mut out = Vec::new();

    for actor in actors {
        let left = a.get(actor);
        let right = b.get(actor);
        let keys: BTreeSet<&String> = left
            .into_iter()
            .chain(right)
            .flat_map(|entries| entries.keys())
            .collect();

        for key in keys {
            let l = left.and_then(|e| e.get(key)).copied().unwrap_or(0);
            let r = right.and_then(|e| e.get(key)).copied().unwrap_or(0);
            if l != r {
                out.push((actor.clone(), key.clone()));
            }
        }
    }
    out
}

/// Check that every state in `states` matches the first.
pub fn verify_all(states: &[State]) -> ConvergenceResult {
    let Some(first) = states.first() else {
        return ConvergenceResult::Converged;
    };
    let expected = StateDigest::of(first);

    for (i, state) in states.iter().enumerate().skip(1) {
        if StateDigest::of(state) != expected {
            let pairs = diverging_pairs(first, state);
            return ConvergenceResult::NotConverged {
                reason: format!("replica {i} diverges on {} pair(s): {pairs:?}", pairs.len()),
            };
        }
    }
    ConvergenceResult::Converged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn state(entries: &[(&str, &str, u64)]) -> State {
        let mut s = State::new();
        for (actor, key, value) in entries {
            s.entry(Actor::from(*actor))
                .or_insert_with(BTreeMap::new)
                .insert(key.to_string(), *value);
        }
        s
    }

    #[test]
    fn test_convergence_verified() {
        let a = state(&[("A", "x", 2), ("B", "x", 5)]);
        let b = a.clone();

        assert!(verify_convergence(&a, &StateDigest::of(&b)).is_converged());
    }

    #[test]
    fn test_convergence_mismatch() {
        let a = state(&[("A", "x", 2)]);
        let b = state(&[("A", "x", 3)]);

        let result = verify_convergence(&a, &StateDigest::of(&b));
        assert!(!result.is_converged());
    }

    #[test]
    fn test_diverging_pairs() {
        let a = state(&[("A", "x", 2), ("A", "y", 1), ("B", "x", 5)]);
        let b = state(&[("A", "x", 2), ("B", "x", 4), ("C", "z", 0)]);

        let pairs = diverging_pairs(&a, &b);
        assert_eq!(
            pairs,
            vec![
                (Actor::from("A"), "y".to_string()),
                (Actor::from("B"), "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_verify_all() {
        let a = state(&[("A", "x", 1)]);
        assert!(verify_all(&[]).is_converged());
        assert!(verify_all(&[a.clone(), a.clone(), a.clone()]).is_converged());

        let b = state(&[("A", "x", 2)]);
        assert!(!verify_all(&[a.clone(), a, b]).is_converged());
    }
}
