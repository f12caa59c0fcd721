//! Service discovery and the request-facing contract.
//!
//! A [`PeerDirectory`] tells a starting pod where an existing member lives
//! and routes client requests to registered pods. [`MemoryDirectory`] is the
//! in-process version used by tests and simulation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use gossip_counter_core::{Counter, State};
use tracing::debug;

use crate::error::Result;

/// What a request router needs from a pod.
pub trait CounterService: Send + Sync {
    /// Name the pod registered under.
    fn name(&self) -> &str;

    /// Increment `key` and return its aggregate value afterwards.
    fn increment(&self, key: &str) -> Result<Counter>;

    /// Aggregate value of `key` across every known actor.
    fn read(&self, key: &str) -> Counter;

    /// Point-in-time copy of the replicated state.
    fn snapshot(&self) -> State;
}

/// Registry of live pods.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Announce a pod and the address of its gossip transport.
    async fn register(&self, service: Arc<dyn CounterService>, gossip_addr: String);

    /// Remove a pod by name. Unknown names are ignored.
    async fn deregister(&self, name: &str);

    /// Gossip address of some registered pod to join through.
    async fn seed_address(&self) -> Option<String>;
}

struct Entry {
    service: Arc<dyn CounterService>,
    gossip_addr: String,
}

#[derive(Default)]
struct DirectoryInner {
    entries: Vec<Entry>,
    next_seed: usize,
    next_service: usize,
}

/// In-memory [`PeerDirectory`] that hands out seeds and services round-robin.
#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<DirectoryInner>,
}

impl MemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next registered pod in round-robin order.
    pub fn next_service(&self) -> Option<Arc<dyn CounterService>> {
        let mut inner = self.lock();
        if inner.entries.is_empty() {
            return None;
        }
        let idx = inner.next_service % inner.entries.len();
        inner.next_service = inner.next_service.wrapping_add(1);
        Some(Arc::clone(&inner.entries[idx].service))
    }

    /// Registered pod with the given name.
    pub fn service(&self, name: &str) -> Option<Arc<dyn CounterService>> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.service.name() == name)
            .map(|e| Arc::clone(&e.service))
    }

    /// Names of registered pods, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.lock()
            .entries
            .iter()
            .map(|e| e.service.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PeerDirectory for MemoryDirectory {
    async fn register(&self, service: Arc<dyn CounterService>, gossip_addr: String) {
        let mut inner = self.lock();
        let name = service.name().to_string();
        inner.entries.retain(|e| e.service.name() != name);
        debug!(pod = %name, addr = %gossip_addr, "registered");
        inner.entries.push(Entry {
            service,
            gossip_addr,
        });
    }

    async fn deregister(&self, name: &str) {
        let mut inner = self.lock();
        inner.entries.retain(|e| e.service.name() != name);
        debug!(pod = %name, "deregistered");
    }

    async fn seed_address(&self) -> Option<String> {
        let mut inner = self.lock();
        if inner.entries.is_empty() {
            return None;
        }
        let idx = inner.next_seed % inner.entries.len();
        inner.next_seed = inner.next_seed.wrapping_add(1);
        Some(inner.entries[idx].gossip_addr.clone())
    }
}

impl std::fmt::Debug for MemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDirectory")
            .field("pods", &self.names())
            .finish()
    }
}
