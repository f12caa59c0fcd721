//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: standalone stores and whole
//! in-process clusters of pods.

use std::sync::Arc;
use std::time::Duration;

use gossip_counter::{CounterService, MemoryDirectory, Pod, PodConfig, PodState, Result};
use gossip_counter_core::{Actor, Counter, ReplicatedCounterStore, State};
use gossip_counter_sync::{verify_all, ConvergenceResult, GossipConfig, MemoryNetwork, MemoryTransport};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Install a tracing subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Name of the `i`-th fixture pod.
pub fn pod_name(i: usize) -> String {
    format!("pod-#{i}")
}

/// `count` stores named `pod-#0..` with the given per-actor capacity.
pub fn stores(count: usize, capacity: usize) -> Vec<ReplicatedCounterStore> {
    (0..count)
        .map(|i| {
            ReplicatedCounterStore::new(Actor::new(pod_name(i)), capacity)
                .expect("capacity must be positive")
        })
        .collect()
}

/// A cluster of pods sharing one in-memory network and directory.
pub struct TestCluster {
    pub network: Arc<MemoryNetwork>,
    pub directory: Arc<MemoryDirectory>,
    pub pods: Vec<Arc<Pod<MemoryTransport>>>,
    gossip: GossipConfig,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<Result<()>>>,
    gossip_task: Option<JoinHandle<()>>,
}

impl TestCluster {
    /// Start `count` pods, one after another, each joining through the
    /// directory, with background gossip running.
    pub async fn start(count: usize) -> Self {
        let mut cluster = Self::start_manual(count).await;
        cluster.gossip_task = Some(
            cluster
                .network
                .spawn_gossip(cluster.gossip.clone(), cluster.shutdown.subscribe()),
        );
        cluster
    }

    /// Start `count` pods without background gossip. Drive rounds by hand
    /// through [`gossip_round`](Self::gossip_round) and
    /// [`push_pull_round`](Self::push_pull_round).
    pub async fn start_manual(count: usize) -> Self {
        let network = MemoryNetwork::new();
        let directory = MemoryDirectory::new();
        let (shutdown, _) = watch::channel(false);
        let gossip = GossipConfig::local();

        let mut cluster = Self {
            network,
            directory,
            pods: Vec::with_capacity(count),
            gossip,
            shutdown,
            tasks: Vec::with_capacity(count),
            gossip_task: None,
        };
        for i in 0..count {
            cluster.add_pod(&pod_name(i)).await;
        }
        cluster
    }

    /// Start one more pod and wait until it is active.
    pub async fn add_pod(&mut self, name: &str) -> Arc<Pod<MemoryTransport>> {
        let addr = format!("{name}:7946");
        let transport = Arc::new(
            self.network
                .create_transport(name, addr.clone())
                .expect("fixture address already in use"),
        );
        let config = PodConfig::new(name, addr)
            .with_report_interval(Duration::from_millis(100))
            .with_gossip(self.gossip.clone());
        let pod = Pod::new(config, transport).expect("fixture config is valid");

        let task = tokio::spawn(
            pod.clone()
                .run(self.directory.clone(), self.shutdown.subscribe()),
        );
        wait_for_state(&pod, PodState::Active, Duration::from_secs(5)).await;

        self.tasks.push(task);
        self.pods.push(pod.clone());
        pod
    }

    pub fn pod(&self, i: usize) -> &Arc<Pod<MemoryTransport>> {
        &self.pods[i]
    }

    pub fn gossip_round(&self) -> usize {
        self.network.gossip_round(&self.gossip)
    }

    pub fn push_pull_round(&self) -> usize {
        self.network.push_pull_round()
    }

    /// Snapshot of every pod, in pod order.
    pub fn states(&self) -> Vec<State> {
        self.pods.iter().map(|p| p.snapshot()).collect()
    }

    /// Aggregate of `key` as seen by every pod.
    pub fn read_all(&self, key: &str) -> Vec<Counter> {
        self.pods.iter().map(|p| p.read(key)).collect()
    }

    pub fn convergence(&self) -> ConvergenceResult {
        verify_all(&self.states())
    }

    /// Poll until every pod holds the same state or `timeout` elapses.
    pub async fn wait_converged(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.convergence().is_converged() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Every pod's state as pretty JSON, for assertion messages.
    pub fn dump(&self) -> String {
        let states: Vec<_> = self
            .pods
            .iter()
            .map(|p| (p.name().to_string(), p.snapshot()))
            .collect();
        serde_json::to_string_pretty(&states).unwrap_or_else(|e| format!("<unprintable: {e}>"))
    }

    /// Signal shutdown and wait for every pod to stop.
    pub async fn shutdown(mut self) -> Vec<Result<()>> {
        let _ = self.shutdown.send(true);

        let mut results = Vec::with_capacity(self.tasks.len());
        for task in self.tasks.drain(..) {
            results.push(task.await.expect("pod task panicked"));
        }
        if let Some(task) = self.gossip_task.take() {
            let _ = task.await;
        }
        results
    }
}

/// Wait for `pod` to reach `target`.
///
/// # Panics
///
/// Panics if `timeout` elapses first.
pub async fn wait_for_state(pod: &Pod<MemoryTransport>, target: PodState, timeout: Duration) {
    let mut rx = pod.subscribe_state();
    let reached = tokio::time::timeout(timeout, rx.wait_for(|s| *s == target))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
    assert!(reached, "pod {} never reached {target}", pod.name());
}

#[cfg(test)]
mod tests {
    use gossip_counter::Transport;
    use super::*;

    #[test]
    fn test_stores_have_distinct_actors() {
        let stores = stores(3, 16);
        let actors: Vec<_> = stores.iter().map(|s| s.actor().to_string()).collect();
        assert_eq!(actors, vec!["pod-#0", "pod-#1", "pod-#2"]);
    }

    #[tokio::test]
    async fn test_manual_cluster_starts_active() {
        let cluster = TestCluster::start_manual(3).await;

        assert_eq!(cluster.directory.len(), 3);
        for pod in &cluster.pods {
            assert_eq!(pod.state(), PodState::Active);
            assert_eq!(pod.transport().num_members(), 3);
        }

        for result in cluster.shutdown().await {
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_dump_is_json() {
        let cluster = TestCluster::start_manual(1).await;
        cluster.pod(0).increment("x").unwrap();

        let dump = cluster.dump();
        let parsed: serde_json::Value = serde_json::from_str(&dump).unwrap();
        assert_eq!(parsed[0][1]["pod-#0"]["x"], 1);

        cluster.shutdown().await;
    }
}
