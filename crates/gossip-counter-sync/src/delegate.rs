//! The seam between the replicated store and the gossip transport.
//!
//! The transport knows nothing about counters. It moves opaque byte payloads
//! and calls back into a [`GossipDelegate`] whenever it needs something from
//! the local replica or has something for it.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use gossip_counter_core::{
    decode_delta, decode_state, encode_delta, encode_state, Counter, Delta, ReplicatedCounterStore,
};

use crate::queue::BroadcastQueue;

/// Callbacks a transport invokes on the local replica.
///
/// Implementations must never fail loudly: a malformed payload from a peer is
/// logged and dropped so that it cannot affect availability.
pub trait GossipDelegate: Send + Sync {
    /// A broadcast payload arrived from a peer.
    fn notify_msg(&self, payload: &[u8]);

    /// Payloads to piggyback on the next gossip round, within `limit` bytes.
    fn get_broadcasts(&self, overhead: usize, limit: usize) -> Vec<Bytes>;

    /// Full local state for a push/pull exchange.
    fn local_state(&self, join: bool) -> Bytes;

    /// Full state received from a peer during a push/pull exchange.
    fn merge_remote_state(&self, payload: &[u8], join: bool);
}

/// [`GossipDelegate`] backed by a [`ReplicatedCounterStore`].
pub struct CounterDelegate {
    /// Name used in log lines.
    name: String,
    store: Arc<ReplicatedCounterStore>,
    broadcasts: BroadcastQueue,
}

impl CounterDelegate {
    pub fn new(name: impl Into<String>, store: Arc<ReplicatedCounterStore>, broadcasts: BroadcastQueue) -> Self {
        Self {
            name: name.into(),
            store,
            broadcasts,
        }
    }

    /// Increment `key` locally and queue the resulting delta.
    ///
    /// Returns the aggregate value after the increment. The increment has
    /// already been applied if encoding the delta fails; it will then reach
    /// peers through the next full-state exchange instead.
    pub fn on_increment(&self, key: &str) -> Counter {
        let delta = self.store.increment(key);
        self.queue_delta(key, &delta);
        self.store.read(key)
    }

    fn queue_delta(&self, key: &str, delta: &Delta) {
        match encode_delta(delta) {
            Ok(bytes) => {
                trace!(pod = %self.name, key, "queue delta broadcast");
                let invalidation_key = format!("{}/{}", delta.actor, key);
                self.broadcasts.queue(Bytes::from(bytes), Some(invalidation_key));
            }
            Err(e) => warn!(pod = %self.name, error = %e, "failed to encode delta"),
        }
    }

    pub fn store(&self) -> &Arc<ReplicatedCounterStore> {
        &self.store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of broadcasts still waiting for retransmission.
    pub fn pending_broadcasts(&self) -> usize {
        self.broadcasts.len()
    }
}

impl GossipDelegate for CounterDelegate {
    fn notify_msg(&self, payload: &[u8]) {
        let delta = match decode_delta(payload) {
            Ok(delta) => delta,
            Err(e) => {
                warn!(pod = %self.name, error = %e, "failed to decode delta");
                return;
            }
        };

        let outcome = self.store.apply_delta(&delta);
        debug!(
            pod = %self.name,
            actor = %delta.actor,
            changed = outcome.changed(),
            "applied delta"
        );
    }

    fn get_broadcasts(&self, overhead: usize, limit: usize) -> Vec<Bytes> {
        self.broadcasts.get_broadcasts(overhead, limit)
    }

    fn local_state(&self, join: bool) -> Bytes {
        let snapshot = self.store.snapshot();
        match encode_state(&snapshot) {
            Ok(bytes) => {
                debug!(pod = %self.name, join, bytes = bytes.len(), "send local state");
                Bytes::from(bytes)
            }
            Err(e) => {
                warn!(pod = %self.name, error = %e, "failed to encode state");
                Bytes::new()
            }
        }
    }

    fn merge_remote_state(&self, payload: &[u8], join: bool) {
        let state = match decode_state(payload) {
            Ok(state) => state,
            Err(e) => {
                warn!(pod = %self.name, error = %e, "failed to decode remote state");
                return;
            }
        };

        let outcome = self.store.merge(&state);
        debug!(
            pod = %self.name,
            join,
            actors = state.len(),
            inserted = outcome.inserted,
            raised = outcome.raised,
            "merged remote state"
        );
    }
}

impl std::fmt::Debug for CounterDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterDelegate")
            .field("name", &self.name)
            .field("store", &self.store)
            .field("broadcasts", &self.broadcasts)
            .finish()
    }
}
