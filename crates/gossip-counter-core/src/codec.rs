//! Wire encoding for deltas and full-state snapshots.
//!
//! Both payloads are CBOR maps, opaque to the transport:
//!
//! ```text
//! Delta: { "actor": text, "value": { key: uint } }
//! State: { actor: { key: uint } }
//! ```
//!
//! Counters are encoded as CBOR unsigned integers, so every `u64` round-trips
//! without loss. Map keys come out in sorted order because the in-memory
//! types are `BTreeMap`s, which keeps the bytes deterministic.

use crate::error::{CoreError, Result};
use crate::types::{Actor, Delta, State};

/// Payload size limits.
pub mod limits {
    /// Maximum keys carried by a single delta.
    ///
    /// A local increment always produces exactly one; the bound only guards
    /// against oversized broadcasts from misbehaving peers.
    pub const MAX_DELTA_KEYS: usize = 64;
}

/// Encode a delta for broadcast.
pub fn encode_delta(delta: &Delta) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(delta, &mut buf).map_err(|e| CoreError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode and validate a broadcast delta.
pub fn decode_delta(bytes: &[u8]) -> Result<Delta> {
    let delta: Delta =
        ciborium::de::from_reader(bytes).map_err(|e| CoreError::Decode(e.to_string()))?;
    validate_delta(&delta)?;
    Ok(delta)
}

/// Encode a full state for push/pull exchange.
pub fn encode_state(state: &State) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(state, &mut buf).map_err(|e| CoreError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode and validate a full state.
///
/// Every partition obeys the same actor rule as a delta, so an observation
/// is accepted or rejected identically on both channels.
pub fn decode_state(bytes: &[u8]) -> Result<State> {
    let state: State =
        ciborium::de::from_reader(bytes).map_err(|e| CoreError::Decode(e.to_string()))?;
    for actor in state.keys() {
        validate_actor(actor)?;
    }
    Ok(state)
}

fn validate_actor(actor: &Actor) -> Result<()> {
    if actor.as_str().is_empty() {
        return Err(CoreError::InvalidPayload("empty actor".into()));
    }
    Ok(())
}

fn validate_delta(delta: &Delta) -> Result<()> {
    validate_actor(&delta.actor)?;
    if delta.value.is_empty() {
        return Err(CoreError::InvalidPayload("delta carries no keys".into()));
    }
    if delta.value.len() > limits::MAX_DELTA_KEYS {
        return Err(CoreError::InvalidPayload(format!(
            "delta carries {} keys, limit is {}",
            delta.value.len(),
            limits::MAX_DELTA_KEYS
        )));
    }
    Ok(())
}
