//! End-to-end cluster behavior over the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use gossip_counter::{
    CounterService, MemoryDirectory, PeerDirectory, Pod, PodConfig, PodError, PodState,
};
use gossip_counter_core::StateDigest;
use gossip_counter_sync::{verify_convergence, GossipConfig, MemoryNetwork, Transport};
use gossip_counter_testkit::fixtures::{init_tracing, wait_for_state, TestCluster};
use tokio::sync::watch;

#[tokio::test]
async fn test_cluster_converges_via_deltas() {
    init_tracing();
    let cluster = TestCluster::start_manual(3).await;

    cluster.pod(0).increment("x").unwrap();
    cluster.pod(1).increment("x").unwrap();
    cluster.pod(2).increment("y").unwrap();

    // Three peers, gossip fan-out three: one round reaches everyone.
    cluster.gossip_round();

    assert!(cluster.convergence().is_converged(), "{}", cluster.dump());
    assert_eq!(cluster.read_all("x"), vec![2, 2, 2]);
    assert_eq!(cluster.read_all("y"), vec![1, 1, 1]);

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_push_pull_repairs_total_broadcast_loss() {
    init_tracing();
    let cluster = TestCluster::start_manual(4).await;
    cluster.network.set_drop_rate(1.0);

    for (i, pod) in cluster.pods.iter().enumerate() {
        for _ in 0..=i {
            pod.increment("x").unwrap();
        }
    }
    assert_eq!(cluster.gossip_round(), 0);

    for _ in 0..20 {
        if cluster.convergence().is_converged() {
            break;
        }
        cluster.push_pull_round();
    }

    assert!(cluster.convergence().is_converged(), "{}", cluster.dump());
    assert_eq!(cluster.read_all("x"), vec![10, 10, 10, 10]);

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_background_gossip_converges() {
    init_tracing();
    let cluster = TestCluster::start(3).await;

    for i in 0..30 {
        let pod = cluster.pod(i % 3);
        pod.increment(&format!("k{}", i % 5)).unwrap();
    }

    assert!(
        cluster.wait_converged(Duration::from_secs(5)).await,
        "{}",
        cluster.dump()
    );
    for key in ["k0", "k1", "k2", "k3", "k4"] {
        assert_eq!(cluster.read_all(key), vec![6, 6, 6]);
    }

    // Digests agree once states do.
    let remote = StateDigest::of(&cluster.pod(1).snapshot());
    assert!(verify_convergence(&cluster.pod(0).snapshot(), &remote).is_converged());

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_partitioned_pod_catches_up_after_heal() {
    init_tracing();
    let cluster = TestCluster::start_manual(3).await;
    let isolated = cluster.pod(2).transport().local_addr();

    cluster.network.partition(&isolated);
    cluster.pod(0).increment("x").unwrap();
    cluster.gossip_round();
    cluster.push_pull_round();
    assert_eq!(cluster.read_all("x"), vec![1, 1, 0]);

    cluster.network.heal(&isolated);
    for _ in 0..20 {
        if cluster.convergence().is_converged() {
            break;
        }
        cluster.push_pull_round();
    }
    assert_eq!(cluster.read_all("x"), vec![1, 1, 1]);

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_late_joiner_receives_history() {
    init_tracing();
    let mut cluster = TestCluster::start_manual(2).await;
    cluster.pod(0).increment("x").unwrap();
    cluster.pod(1).increment("x").unwrap();
    cluster.gossip_round();

    let late = cluster.add_pod("pod-#late").await;

    assert_eq!(late.read("x"), 2);
    assert_eq!(late.transport().num_members(), 3);

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_join_failure_against_stale_seed_runs_isolated() {
    init_tracing();
    let network = MemoryNetwork::new();
    let directory = MemoryDirectory::new();

    // A stale registration pointing at an address nobody listens on.
    let ghost_transport = Arc::new(network.create_transport("ghost", "ghost:7946").unwrap());
    let ghost = Pod::new(PodConfig::new("ghost", "ghost:7946"), ghost_transport.clone()).unwrap();
    directory
        .register(ghost.clone(), "ghost:7946".to_string())
        .await;
    ghost_transport.shutdown().await.unwrap();

    let transport = Arc::new(network.create_transport("solo", "solo:7946").unwrap());
    let config = PodConfig::new("solo", "solo:7946").with_gossip(GossipConfig::local());
    let solo = Pod::new(config, transport).unwrap();

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(solo.clone().run(directory.clone(), rx));
    wait_for_state(&solo, PodState::Active, Duration::from_secs(5)).await;

    assert_eq!(solo.transport().num_members(), 1);
    assert_eq!(solo.increment("x").unwrap(), 1);

    tx.send(true).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_every_pod_and_leaves_group() {
    init_tracing();
    let cluster = TestCluster::start_manual(3).await;
    let pods = cluster.pods.clone();
    let directory = cluster.directory.clone();

    let results = cluster.shutdown().await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(directory.is_empty());
    for pod in &pods {
        assert_eq!(pod.state(), PodState::Stopped);
        assert_eq!(pod.transport().num_members(), 0);
        assert!(matches!(
            pod.increment("x"),
            Err(PodError::NotAccepting { .. })
        ));
    }
}

#[tokio::test]
async fn test_bounded_pods_still_agree_on_resident_keys() {
    init_tracing();
    let network = MemoryNetwork::new();
    let directory = MemoryDirectory::new();
    let (tx, rx) = watch::channel(false);

    let mut pods = Vec::new();
    let mut tasks = Vec::new();
    for name in ["a", "b"] {
        let addr = format!("{name}:7946");
        let transport = Arc::new(network.create_transport(name, addr.clone()).unwrap());
        let config = PodConfig::new(name, addr)
            .with_capacity(4)
            .with_gossip(GossipConfig::local());
        let pod = Pod::new(config, transport).unwrap();
        tasks.push(tokio::spawn(pod.clone().run(directory.clone(), rx.clone())));
        wait_for_state(&pod, PodState::Active, Duration::from_secs(5)).await;
        pods.push(pod);
    }

    for i in 0..10 {
        pods[0].increment(&format!("k{i}")).unwrap();
    }
    network.push_pull_round();

    let stats = pods[0].stats();
    assert_eq!(stats.resident_keys, 4);
    assert_eq!(stats.evictions, 6);
    assert_eq!(pods[1].read("k9"), 1);
    assert_eq!(pods[1].read("k0"), 0);

    tx.send(true).unwrap();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
}
