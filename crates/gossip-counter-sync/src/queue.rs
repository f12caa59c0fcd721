//! Transmit-limited broadcast queue.
//!
//! Outgoing deltas wait here until the transport drains them. Each message is
//! handed out a bounded number of times that grows with the logarithm of the
//! cluster size, then dropped. Epidemic spreading delivers it everywhere with
//! high probability; anything that slips through is repaired by push/pull.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

/// Source of the current member count, read every time the queue is drained.
pub type MemberCount = Arc<dyn Fn() -> usize + Send + Sync>;

/// Maximum transmissions for a message in a cluster of `members` nodes.
///
/// Computes `retransmit_mult * ceil(log10(members + 1))` in integers.
pub fn retransmit_limit(retransmit_mult: usize, members: usize) -> usize {
    let target = members as u128 + 1;
    let mut scale = 0;
    let mut power: u128 = 1;
    while power < target {
        power *= 10;
        scale += 1;
    }
    retransmit_mult * scale
}

struct Queued {
    id: u64,
    /// Queuing a message with the same key drops this one.
    invalidation_key: Option<String>,
    payload: Bytes,
    transmits: usize,
}

#[derive(Default)]
struct QueueInner {
    items: Vec<Queued>,
    next_id: u64,
}

/// A queue of broadcasts with bounded retransmission.
pub struct BroadcastQueue {
    retransmit_mult: usize,
    num_nodes: MemberCount,
    inner: Mutex<QueueInner>,
}

impl BroadcastQueue {
    /// Create a queue that scales retransmissions by `num_nodes()`.
    pub fn new(retransmit_mult: usize, num_nodes: impl Fn() -> usize + Send + Sync + 'static) -> Self {
        Self {
            retransmit_mult,
            num_nodes: Arc::new(num_nodes),
            inner: Mutex::new(QueueInner::default()),
        }
    }

    /// Queue a payload for dissemination.
    ///
    /// A pending message with the same `invalidation_key` is superseded and
    /// removed.
    pub fn queue(&self, payload: Bytes, invalidation_key: Option<String>) {
        let mut inner = self.lock();

        if let Some(key) = invalidation_key.as_deref() {
            inner
                .items
                .retain(|item| item.invalidation_key.as_deref() != Some(key));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.items.push(Queued {
            id,
            invalidation_key,
            payload,
            transmits: 0,
        });
    }

    /// Drain messages that fit in `limit` bytes, charging `overhead` per message.
    ///
    /// Least-transmitted messages go first, newest first among equals. Every
    /// returned message counts one transmission; messages that reach the
    /// retransmit limit are removed.
    pub fn get_broadcasts(&self, overhead: usize, limit: usize) -> Vec<Bytes> {
        let transmit_limit = self.retransmit_limit();
        let mut inner = self.lock();

        inner
            .items
            .sort_by(|a, b| a.transmits.cmp(&b.transmits).then(b.id.cmp(&a.id)));

        let mut remaining = limit;
        let mut out = Vec::new();

        for item in inner.items.iter_mut() {
            let cost = overhead + item.payload.len();
            if cost > remaining {
                continue;
            }
            remaining -= cost;
            item.transmits += 1;
            out.push(item.payload.clone());
        }

        inner.items.retain(|item| item.transmits < transmit_limit.max(1));
        out
    }

    /// Current per-message transmit limit.
    pub fn retransmit_limit(&self) -> usize {
        retransmit_limit(self.retransmit_mult, (self.num_nodes)())
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Drop every pending message.
    pub fn reset(&self) {
        self.lock().items.clear();
    }

    /// Keep at most `max_retained` messages, dropping the most transmitted.
    pub fn prune(&self, max_retained: usize) {
        let mut inner = self.lock();
        if inner.items.len() <= max_retained {
            return;
        }
        inner
            .items
            .sort_by(|a, b| a.transmits.cmp(&b.transmits).then(b.id.cmp(&a.id)));
        inner.items.truncate(max_retained);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BroadcastQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastQueue")
            .field("retransmit_mult", &self.retransmit_mult)
            .field("pending", &self.len())
            .finish()
    }
}
