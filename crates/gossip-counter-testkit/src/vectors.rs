//! Golden wire vectors.
//!
//! These vectors pin the CBOR encoding of deltas and states so that pods
//! built from different revisions keep understanding each other.

use std::collections::BTreeMap;

use gossip_counter_core::{encode_delta, encode_state, Actor, Counter, Delta, State};
use serde::Serialize;

/// The value a vector encodes.
#[derive(Debug, Clone)]
pub enum VectorPayload {
    Delta {
        actor: &'static str,
        key: &'static str,
        value: Counter,
    },
    /// `(actor, key, value)` triples.
    State(&'static [(&'static str, &'static str, Counter)]),
}

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub payload: VectorPayload,
    /// Expected encoding (hex).
    pub expected_hex: &'static str,
}

impl VectorPayload {
    pub fn to_delta(&self) -> Option<Delta> {
        match self {
            VectorPayload::Delta { actor, key, value } => {
                Some(Delta::new(Actor::from(*actor), *key, *value))
            }
            VectorPayload::State(_) => None,
        }
    }

    pub fn to_state(&self) -> State {
        match self {
            VectorPayload::Delta { .. } => self
                .to_delta()
                .map(Delta::into_state)
                .unwrap_or_default(),
            VectorPayload::State(entries) => {
                let mut state = State::new();
                for (actor, key, value) in entries.iter() {
                    state
                        .entry(Actor::from(*actor))
                        .or_insert_with(BTreeMap::new)
                        .insert(key.to_string(), *value);
                }
                state
            }
        }
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "first increment",
            payload: VectorPayload::Delta {
                actor: "A",
                key: "x",
                value: 1,
            },
            expected_hex: "a2656163746f7261416576616c7565a1617801",
        },
        GoldenVector {
            name: "one-byte counter",
            payload: VectorPayload::Delta {
                actor: "A",
                key: "x",
                value: 24,
            },
            expected_hex: "a2656163746f7261416576616c7565a161781818",
        },
        GoldenVector {
            name: "two-byte counter",
            payload: VectorPayload::Delta {
                actor: "A",
                key: "x",
                value: 500,
            },
            expected_hex: "a2656163746f7261416576616c7565a161781901f4",
        },
        GoldenVector {
            name: "maximum counter",
            payload: VectorPayload::Delta {
                actor: "pod-#0",
                key: "k",
                value: u64::MAX,
            },
            expected_hex: "a2656163746f7266706f642d23306576616c7565a1616b1bffffffffffffffff",
        },
        GoldenVector {
            name: "empty state",
            payload: VectorPayload::State(&[]),
            expected_hex: "a0",
        },
        GoldenVector {
            name: "two actors",
            payload: VectorPayload::State(&[("A", "x", 3), ("B", "x", 5)]),
            expected_hex: "a26141a16178036142a1617805",
        },
    ]
}

/// Encode a vector's payload.
pub fn encode_vector(vector: &GoldenVector) -> Vec<u8> {
    let encoded = match vector.payload.to_delta() {
        Some(delta) => encode_delta(&delta),
        None => encode_state(&vector.payload.to_state()),
    };
    encoded.unwrap_or_default()
}

/// Verify all golden vectors against the current encoder.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = hex::encode(encode_vector(v));
            (v.name.to_string(), hex == v.expected_hex, hex)
        })
        .collect()
}

/// Exported form of a vector, for other implementations to consume.
#[derive(Debug, Serialize)]
pub struct VectorRecord {
    pub name: String,
    pub kind: &'static str,
    pub hex: String,
}

/// All vectors as JSON records.
pub fn export_json() -> serde_json::Result<String> {
    let records: Vec<VectorRecord> = all_vectors()
        .iter()
        .map(|v| VectorRecord {
            name: v.name.to_string(),
            kind: match v.payload {
                VectorPayload::Delta { .. } => "delta",
                VectorPayload::State(_) => "state",
            },
            hex: v.expected_hex.to_string(),
        })
        .collect();
    serde_json::to_string_pretty(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossip_counter_core::{decode_delta, decode_state};

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, hex) in verify_all_vectors() {
            assert!(matches, "vector '{name}' encoded as {hex}");
        }
    }

    #[test]
    fn test_vectors_decode_to_payload() {
        for vector in all_vectors() {
            let bytes = hex::decode(vector.expected_hex).unwrap();
            match vector.payload.to_delta() {
                Some(delta) => assert_eq!(decode_delta(&bytes).unwrap(), delta),
                None => assert_eq!(decode_state(&bytes).unwrap(), vector.payload.to_state()),
            }
        }
    }

    #[test]
    fn test_export_lists_every_vector() {
        let json = export_json().unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), all_vectors().len());
        assert_eq!(parsed[0]["kind"], "delta");
    }
}
