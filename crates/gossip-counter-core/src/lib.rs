//! # Gossip Counter Core
//!
//! Pure primitives for the gossip counter: a grow-only counter map replicated
//! per actor, and the wire encoding used to disseminate it.
//!
//! This crate contains no I/O, no networking and no async code. Everything
//! here is deterministic computation over the replicated state.
//!
//! ## Key Types
//!
//! - [`Actor`] - Identity of the replica owning a partition of the state
//! - [`BoundedCounterMap`] - Key to counter map with least-recently-used eviction
//! - [`ReplicatedCounterStore`] - One bounded map per known actor, merged by pointwise max
//! - [`Delta`] - A single (actor, key, value) observation produced by an increment
//! - [`State`] - The full replicated structure, as exchanged during anti-entropy
//!
//! ## Merge Law
//!
//! Every merge path (delta or full snapshot) applies the same rule:
//! `existing = max(existing, incoming)` for each (actor, key). The rule is
//! commutative, associative and idempotent, so replicas converge regardless of
//! arrival order, duplication or loss, as long as every increment is
//! eventually observed.
//!
//! ## Wire Format
//!
//! Deltas and snapshots are encoded as CBOR. See the [`codec`] module.

pub mod bounded;
pub mod codec;
pub mod digest;
pub mod error;
pub mod store;
pub mod types;

pub use bounded::{BoundedCounterMap, Raise, DEFAULT_CAPACITY};
pub use codec::{decode_delta, decode_state, encode_delta, encode_state};
pub use digest::StateDigest;
pub use error::{CoreError, Result};
pub use store::{MergeOutcome, ReplicatedCounterStore, StoreStats};
pub use types::{aggregate, Actor, Counter, Delta, State};
