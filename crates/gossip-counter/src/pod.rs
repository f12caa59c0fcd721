//! The pod: one replica of the counter store plus its operational lifecycle.
//!
//! ```text
//! Joining ──► Active ──► ShuttingDown ──► Stopped
//! ```
//!
//! A pod joins through a seed from the directory, registers itself, serves
//! increments and reads, logs the member list on an interval, and leaves the
//! group when its shutdown signal fires.

use std::fmt;
use std::sync::Arc;

use gossip_counter_core::{Actor, Counter, ReplicatedCounterStore, State, StoreStats};
use gossip_counter_sync::{BroadcastQueue, CounterDelegate, Transport};
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::PodConfig;
use crate::directory::{CounterService, PeerDirectory};
use crate::error::{PodError, Result};

/// Operational state of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodState {
    Joining,
    Active,
    ShuttingDown,
    Stopped,
}

impl PodState {
    /// Whether local increments are served in this state.
    pub fn accepts_increments(self) -> bool {
        matches!(self, PodState::Joining | PodState::Active)
    }
}

impl fmt::Display for PodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodState::Joining => "joining",
            PodState::Active => "active",
            PodState::ShuttingDown => "shutting-down",
            PodState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A single replica wired to a gossip transport.
pub struct Pod<T: Transport + 'static> {
    config: PodConfig,
    delegate: Arc<CounterDelegate>,
    transport: Arc<T>,
    state: watch::Sender<PodState>,
}

impl<T: Transport + 'static> Pod<T> {
    /// Create a pod and install its delegate on `transport`.
    ///
    /// Fails only on invalid configuration.
    pub fn new(config: PodConfig, transport: Arc<T>) -> Result<Arc<Self>> {
        config.validate()?;

        let store = Arc::new(ReplicatedCounterStore::new(
            Actor::from(config.name.as_str()),
            config.capacity,
        )?);

        let members = Arc::downgrade(&transport);
        let broadcasts = BroadcastQueue::new(config.gossip.retransmit_mult, move || {
            members.upgrade().map_or(1, |t| t.num_members())
        });

        let delegate = Arc::new(CounterDelegate::new(config.name.clone(), store, broadcasts));
        transport.set_delegate(delegate.clone());

        let (state, _) = watch::channel(PodState::Joining);

        Ok(Arc::new(Self {
            config,
            delegate,
            transport,
            state,
        }))
    }

    pub fn config(&self) -> &PodConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ReplicatedCounterStore> {
        self.delegate.store()
    }

    pub fn delegate(&self) -> &Arc<CounterDelegate> {
        &self.delegate
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PodState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PodState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> StoreStats {
        self.store().stats()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Drive the pod through its whole lifecycle.
    ///
    /// Returns once `shutdown` carries `true` (or its sender is dropped) and
    /// the pod has left the group.
    pub async fn run(
        self: Arc<Self>,
        directory: Arc<dyn PeerDirectory>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.join_cluster(directory.as_ref()).await;

        self.transition(PodState::Active);
        directory
            .register(self.clone(), self.transport.local_addr())
            .await;

        let period = self.config.report_interval;
        let mut report = time::interval_at(Instant::now() + period, period);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let stop = *shutdown.borrow_and_update();
            if stop {
                break;
            }
            tokio::select! {
                _ = report.tick() => self.report(),
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.shutdown(directory.as_ref()).await
    }

    /// Join through a seed from `directory`. A failed join leaves the pod
    /// running on its own; later joiners will find it.
    pub async fn join_cluster(&self, directory: &dyn PeerDirectory) {
        let own_addr = self.transport.local_addr();
        let seed = directory.seed_address().await.filter(|s| *s != own_addr);

        let Some(seed) = seed else {
            info!(pod = %self.config.name, "no seed available, starting alone");
            return;
        };

        match self.transport.join(&[seed.clone()]).await {
            Ok(contacted) => {
                info!(pod = %self.config.name, seed = %seed, contacted, "joined cluster")
            }
            Err(e) => {
                warn!(pod = %self.config.name, seed = %seed, error = %e, "join failed, running isolated")
            }
        }
    }

    /// Log the known members.
    pub fn report(&self) {
        let members: Vec<String> = self
            .transport
            .members()
            .into_iter()
            .map(|m| m.name)
            .collect();
        info!(pod = %self.config.name, count = members.len(), members = ?members, "known pods");

        let stats = self.stats();
        debug!(
            pod = %self.config.name,
            actors = stats.actors,
            keys = stats.resident_keys,
            evictions = stats.evictions,
            pending = self.delegate.pending_broadcasts(),
            "store stats"
        );
    }

    async fn shutdown(&self, directory: &dyn PeerDirectory) -> Result<()> {
        self.transition(PodState::ShuttingDown);
        directory.deregister(&self.config.name).await;

        if let Err(e) = self.transport.leave().await {
            warn!(pod = %self.config.name, error = %e, "leave failed");
        }
        let result = self.transport.shutdown().await;

        self.transition(PodState::Stopped);
        result.map_err(PodError::from)
    }

    fn transition(&self, next: PodState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            info!(pod = %self.config.name, from = %prev, to = %next, "state transition");
        }
    }
}

impl<T: Transport + 'static> CounterService for Pod<T> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn increment(&self, key: &str) -> Result<Counter> {
        let state = self.state();
        if !state.accepts_increments() {
            return Err(PodError::NotAccepting { state });
        }
        Ok(self.delegate.on_increment(key))
    }

    fn read(&self, key: &str) -> Counter {
        self.store().read(key)
    }

    fn snapshot(&self) -> State {
        self.store().snapshot()
    }
}

impl<T: Transport + 'static> fmt::Debug for Pod<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pod")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("addr", &self.transport.local_addr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;
    use async_trait::async_trait;
    use gossip_counter_sync::{GossipConfig, MemoryNetwork, MemoryTransport};
    use std::time::Duration;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn pod(network: &Arc<MemoryNetwork>, name: &str) -> Arc<Pod<MemoryTransport>> {
        let addr = format!("{name}:7946");
        let transport = Arc::new(network.create_transport(name, addr.clone()).unwrap());
        let config = PodConfig::new(name, addr)
            .with_report_interval(Duration::from_millis(50))
            .with_gossip(GossipConfig::local());
        Pod::new(config, transport).unwrap()
    }

    async fn wait_for_state(pod: &Pod<MemoryTransport>, target: PodState) {
        let mut rx = pod.subscribe_state();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .unwrap();
    }

    struct FixedSeed(&'static str);

    #[async_trait]
    impl PeerDirectory for FixedSeed {
        async fn register(&self, _service: Arc<dyn CounterService>, _gossip_addr: String) {}

        async fn deregister(&self, _name: &str) {}

        async fn seed_address(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let network = MemoryNetwork::new();
        let transport = Arc::new(network.create_transport("a", "a:7946").unwrap());
        let config = PodConfig::new("a", "a:7946").with_capacity(0);

        assert!(matches!(
            Pod::new(config, transport),
            Err(PodError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_reaches_stopped() {
        init_tracing();
        let network = MemoryNetwork::new();
        let directory = MemoryDirectory::new();
        let a = pod(&network, "a");
        assert_eq!(a.state(), PodState::Joining);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(a.clone().run(directory.clone(), rx));

        wait_for_state(&a, PodState::Active).await;
        assert_eq!(directory.names(), vec!["a"]);
        assert_eq!(a.increment("x").unwrap(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(a.state(), PodState::Stopped);
        assert!(directory.is_empty());
        assert_eq!(a.transport().num_members(), 0);
    }

    #[tokio::test]
    async fn test_increment_rejected_after_shutdown() {
        let network = MemoryNetwork::new();
        let a = pod(&network, "a");

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(a.clone().run(MemoryDirectory::new(), rx));
        wait_for_state(&a, PodState::Active).await;
        a.increment("x").unwrap();

        drop(tx);
        handle.await.unwrap().unwrap();

        let err = a.increment("x").unwrap_err();
        assert!(matches!(
            err,
            PodError::NotAccepting {
                state: PodState::Stopped
            }
        ));
        // Reads are still served.
        assert_eq!(a.read("x"), 1);
    }

    #[tokio::test]
    async fn test_join_failure_runs_isolated() {
        init_tracing();
        let network = MemoryNetwork::new();
        let a = pod(&network, "a");

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(a.clone().run(Arc::new(FixedSeed("nowhere:7946")), rx));

        wait_for_state(&a, PodState::Active).await;
        assert_eq!(a.transport().num_members(), 1);
        assert_eq!(a.increment("x").unwrap(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_second_pod_joins_through_directory() {
        let network = MemoryNetwork::new();
        let directory = MemoryDirectory::new();
        let a = pod(&network, "a");
        let b = pod(&network, "b");

        let (tx, rx) = watch::channel(false);
        let ha = tokio::spawn(a.clone().run(directory.clone(), rx.clone()));
        wait_for_state(&a, PodState::Active).await;
        a.increment("x").unwrap();

        let hb = tokio::spawn(b.clone().run(directory.clone(), rx));
        wait_for_state(&b, PodState::Active).await;

        // The join exchanged full state.
        assert_eq!(b.read("x"), 1);
        assert_eq!(a.transport().num_members(), 2);

        tx.send(true).unwrap();
        ha.await.unwrap().unwrap();
        hb.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_signal_before_run() {
        let network = MemoryNetwork::new();
        let a = pod(&network, "a");

        let (_tx, rx) = watch::channel(true);
        a.clone().run(MemoryDirectory::new(), rx).await.unwrap();

        assert_eq!(a.state(), PodState::Stopped);
    }
}
