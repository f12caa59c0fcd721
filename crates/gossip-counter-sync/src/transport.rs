//! Transport abstraction for gossip dissemination.
//!
//! A transport owns group membership and moves opaque payloads between
//! members. It calls into a [`GossipDelegate`] for everything that concerns
//! the replicated data. Implementations may use UDP/TCP gossip, or anything
//! else that offers best-effort broadcast plus periodic full-state exchange.

use std::sync::Arc;

use async_trait::async_trait;

use crate::delegate::GossipDelegate;
use crate::error::Result;

/// A member of the gossip group as seen by the local transport.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Member {
    pub name: String,
    pub addr: String,
}

/// Group membership and payload delivery.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join the group through any of `seeds`.
    ///
    /// Returns the number of seeds successfully contacted. Fails with
    /// [`SyncError::JoinFailed`](crate::SyncError::JoinFailed) if none could be.
    async fn join(&self, seeds: &[String]) -> Result<usize>;

    /// Announce departure and drop out of every peer's view.
    async fn leave(&self) -> Result<()>;

    /// Stop participating. Terminal.
    async fn shutdown(&self) -> Result<()>;

    /// Number of known live members, including the local node.
    fn num_members(&self) -> usize;

    /// Known live members, including the local node.
    fn members(&self) -> Vec<Member>;

    /// Address peers use to reach this node.
    fn local_addr(&self) -> String;

    /// Install the delegate that receives payloads and supplies state.
    fn set_delegate(&self, delegate: Arc<dyn GossipDelegate>);
}

/// An in-process transport for tests and simulation.
///
/// Every node registers with a shared [`MemoryNetwork`](memory::MemoryNetwork).
/// Gossip and push/pull rounds are driven either explicitly or by
/// [`spawn_gossip`](memory::MemoryNetwork::spawn_gossip).
pub mod memory {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
    use std::time::Duration;

    use rand::seq::SliceRandom;
    use rand::Rng;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio::time::MissedTickBehavior;
    use tracing::{debug, info, trace, warn};

    use crate::config::GossipConfig;
    use crate::error::SyncError;

    struct NodeSlot {
        name: String,
        delegate: Option<Arc<dyn GossipDelegate>>,
        /// Addresses of the peers this node believes are alive.
        view: BTreeSet<String>,
        running: bool,
        partitioned: bool,
    }

    #[derive(Default)]
    struct Registry {
        nodes: HashMap<String, NodeSlot>,
        drop_rate: f64,
    }

    impl Registry {
        fn reachable(&self, addr: &str) -> bool {
            self.nodes
                .get(addr)
                .map(|n| n.running && !n.partitioned)
                .unwrap_or(false)
        }

        fn delegate(&self, addr: &str) -> Option<Arc<dyn GossipDelegate>> {
            self.nodes.get(addr).and_then(|n| n.delegate.clone())
        }

        /// Reachable peers in `addr`'s view, or nothing if `addr` itself is cut off.
        fn reachable_view(&self, addr: &str) -> Vec<String> {
            if !self.reachable(addr) {
                return Vec::new();
            }
            self.nodes[addr]
                .view
                .iter()
                .filter(|peer| self.reachable(peer))
                .cloned()
                .collect()
        }

        fn remove_from_views(&mut self, addr: &str) {
            for node in self.nodes.values_mut() {
                node.view.remove(addr);
            }
        }
    }

    /// Shared state for the in-memory network.
    pub struct MemoryNetwork {
        registry: RwLock<Registry>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport listening on `addr`.
        ///
        /// An address can be reused once its previous owner has shut down.
        pub fn create_transport(
            self: &Arc<Self>,
            name: impl Into<String>,
            addr: impl Into<String>,
        ) -> Result<MemoryTransport> {
            let name = name.into();
            let addr = addr.into();

            let mut registry = self.write();
            if registry.nodes.get(&addr).map(|n| n.running).unwrap_or(false) {
                return Err(SyncError::TransportError(format!("address in use: {addr}")));
            }
            registry.nodes.insert(
                addr.clone(),
                NodeSlot {
                    name: name.clone(),
                    delegate: None,
                    view: BTreeSet::new(),
                    running: true,
                    partitioned: false,
                },
            );

            Ok(MemoryTransport {
                name,
                addr,
                network: Arc::clone(self),
            })
        }

        // ─────────────────────────────────────────────────────────────────────
        // Fault injection
        // ─────────────────────────────────────────────────────────────────────

        /// Probability in `[0, 1]` that a single broadcast delivery is lost.
        ///
        /// Push/pull exchanges are not affected.
        pub fn set_drop_rate(&self, rate: f64) {
            let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
            self.write().drop_rate = rate;
        }

        /// Cut `addr` off from every other node.
        pub fn partition(&self, addr: &str) {
            if let Some(node) = self.write().nodes.get_mut(addr) {
                node.partitioned = true;
            }
        }

        /// Undo [`partition`](Self::partition).
        pub fn heal(&self, addr: &str) {
            if let Some(node) = self.write().nodes.get_mut(addr) {
                node.partitioned = false;
            }
        }

        // ─────────────────────────────────────────────────────────────────────
        // Rounds
        // ─────────────────────────────────────────────────────────────────────

        /// Run one gossip round for every node.
        ///
        /// Each node drains its queued broadcasts and sends them to up to
        /// `gossip_nodes` random peers from its view. Returns the number of
        /// payloads delivered.
        pub fn gossip_round(&self, config: &GossipConfig) -> usize {
            let (senders, drop_rate) = {
                let registry = self.read();
                let senders: Vec<_> = registry
                    .nodes
                    .keys()
                    .filter_map(|addr| {
                        let delegate = registry.delegate(addr)?;
                        let view = registry.reachable_view(addr);
                        Some((addr.clone(), delegate, view))
                    })
                    .collect();
                (senders, registry.drop_rate)
            };

            let mut delivered = 0;
            for (addr, delegate, view) in senders {
                let payloads =
                    delegate.get_broadcasts(config.broadcast_overhead, config.max_broadcast_bytes);
                if payloads.is_empty() {
                    continue;
                }

                let targets: Vec<_> = {
                    let mut rng = rand::thread_rng();
                    view.choose_multiple(&mut rng, config.gossip_nodes)
                        .cloned()
                        .collect()
                };

                for target in targets {
                    let Some(peer) = self.read().delegate(&target) else {
                        continue;
                    };
                    for payload in &payloads {
                        if drop_rate > 0.0 && rand::thread_rng().gen_bool(drop_rate) {
                            trace!(from = %addr, to = %target, "broadcast dropped");
                            continue;
                        }
                        peer.notify_msg(payload);
                        delivered += 1;
                    }
                }
            }
            delivered
        }

        /// Run one push/pull round: every node exchanges full state with one
        /// random peer, in both directions. Returns the number of exchanges.
        pub fn push_pull_round(&self) -> usize {
            let pairs: Vec<(String, String)> = {
                let registry = self.read();
                let mut rng = rand::thread_rng();
                registry
                    .nodes
                    .keys()
                    .filter(|addr| registry.delegate(addr).is_some())
                    .filter_map(|addr| {
                        let view = registry.reachable_view(addr);
                        view.choose(&mut rng).map(|peer| (addr.clone(), peer.clone()))
                    })
                    .collect()
            };

            pairs
                .iter()
                .filter(|(a, b)| self.exchange_state(a, b, false))
                .count()
        }

        /// Run gossip and push/pull on their intervals until `shutdown` flips.
        pub fn spawn_gossip(
            self: &Arc<Self>,
            config: GossipConfig,
            mut shutdown: watch::Receiver<bool>,
        ) -> JoinHandle<()> {
            let network = Arc::clone(self);
            tokio::spawn(async move {
                let min = Duration::from_millis(1);
                let mut gossip = tokio::time::interval(config.gossip_interval.max(min));
                let mut push_pull = tokio::time::interval(config.push_pull_interval.max(min));
                gossip.set_missed_tick_behavior(MissedTickBehavior::Delay);
                push_pull.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = gossip.tick() => {
                            network.gossip_round(&config);
                        }
                        _ = push_pull.tick() => {
                            network.push_pull_round();
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                debug!("gossip loop stopped");
            })
        }

        /// Full-state exchange between `a` and `b`. Delegates are called
        /// without holding the registry lock.
        fn exchange_state(&self, a: &str, b: &str, join: bool) -> bool {
            let (left, right) = {
                let registry = self.read();
                if !registry.reachable(a) || !registry.reachable(b) {
                    return false;
                }
                match (registry.delegate(a), registry.delegate(b)) {
                    (Some(left), Some(right)) => (left, right),
                    _ => return false,
                }
            };

            let from_left = left.local_state(join);
            let from_right = right.local_state(join);
            if !from_left.is_empty() {
                right.merge_remote_state(&from_left, join);
            }
            if !from_right.is_empty() {
                left.merge_remote_state(&from_right, join);
            }
            true
        }

        fn read(&self) -> RwLockReadGuard<'_, Registry> {
            self.registry.read().unwrap_or_else(PoisonError::into_inner)
        }

        fn write(&self) -> RwLockWriteGuard<'_, Registry> {
            self.registry.write().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                registry: RwLock::new(Registry::default()),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        name: String,
        addr: String,
        network: Arc<MemoryNetwork>,
    }

    impl MemoryTransport {
        pub fn name(&self) -> &str {
            &self.name
        }

        pub fn network(&self) -> &Arc<MemoryNetwork> {
            &self.network
        }

        fn ensure_running(&self) -> Result<()> {
            let running = self
                .network
                .read()
                .nodes
                .get(&self.addr)
                .map(|n| n.running)
                .unwrap_or(false);
            if running {
                Ok(())
            } else {
                Err(SyncError::NotRunning(self.addr.clone()))
            }
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn join(&self, seeds: &[String]) -> Result<usize> {
            self.ensure_running()?;

            let mut contacted = 0;
            for seed in seeds.iter().filter(|s| **s != self.addr) {
                {
                    let mut registry = self.network.write();
                    if !registry.reachable(&self.addr) || !registry.reachable(seed) {
                        warn!(pod = %self.name, seed = %seed, "seed unreachable");
                        continue;
                    }

                    // Learn the seed's view and announce ourselves to all of it.
                    let mut learned = registry.nodes[seed.as_str()].view.clone();
                    learned.insert(seed.clone());
                    learned.remove(&self.addr);

                    for peer in &learned {
                        if let Some(node) = registry.nodes.get_mut(peer) {
                            node.view.insert(self.addr.clone());
                        }
                    }
                    if let Some(me) = registry.nodes.get_mut(&self.addr) {
                        me.view.extend(learned);
                    }
                }

                self.network.exchange_state(&self.addr, seed, true);
                contacted += 1;
            }

            if contacted == 0 && !seeds.is_empty() {
                return Err(SyncError::JoinFailed(format!(
                    "no seed reachable among {}",
                    seeds.join(", ")
                )));
            }

            info!(pod = %self.name, contacted, members = self.num_members(), "joined group");
            Ok(contacted)
        }

        async fn leave(&self) -> Result<()> {
            self.ensure_running()?;

            let mut registry = self.network.write();
            registry.remove_from_views(&self.addr);
            if let Some(me) = registry.nodes.get_mut(&self.addr) {
                me.view.clear();
            }
            debug!(pod = %self.name, "left group");
            Ok(())
        }

        async fn shutdown(&self) -> Result<()> {
            let mut registry = self.network.write();
            registry.remove_from_views(&self.addr);
            if let Some(me) = registry.nodes.get_mut(&self.addr) {
                me.running = false;
                me.delegate = None;
                me.view.clear();
            }
            debug!(pod = %self.name, "transport shut down");
            Ok(())
        }

        fn num_members(&self) -> usize {
            let registry = self.network.read();
            match registry.nodes.get(&self.addr) {
                Some(me) if me.running => me.view.len() + 1,
                _ => 0,
            }
        }

        fn members(&self) -> Vec<Member> {
            let registry = self.network.read();
            let Some(me) = registry.nodes.get(&self.addr).filter(|n| n.running) else {
                return Vec::new();
            };

            let mut members: Vec<Member> = me
                .view
                .iter()
                .filter_map(|addr| {
                    registry.nodes.get(addr).map(|node| Member {
                        name: node.name.clone(),
                        addr: addr.clone(),
                    })
                })
                .collect();
            members.push(Member {
                name: me.name.clone(),
                addr: self.addr.clone(),
            });
            members.sort();
            members
        }

        fn local_addr(&self) -> String {
            self.addr.clone()
        }

        fn set_delegate(&self, delegate: Arc<dyn GossipDelegate>) {
            if let Some(me) = self.network.write().nodes.get_mut(&self.addr) {
                me.delegate = Some(delegate);
            }
        }
    }

    impl std::fmt::Debug for MemoryTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MemoryTransport")
                .field("name", &self.name)
                .field("addr", &self.addr)
                .finish()
        }
    }
}
