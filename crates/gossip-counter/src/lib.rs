//! # Gossip Counter
//!
//! Distributed increment-only counters replicated by gossip.
//!
//! ## Overview
//!
//! Every pod owns one partition of a G-counter and merges everyone else's.
//! Increments are local and never coordinate; reads sum every known
//! partition. Updates spread by epidemic broadcast and periodic full-state
//! exchange, so all pods converge once traffic quiesces.
//!
//! Per-actor maps are bounded and evict the least recently used key. An
//! evicted counter can come back lower than it was, so bounded replicas trade
//! strict monotonicity for fixed memory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gossip_counter::{CounterService, MemoryDirectory, Pod, PodConfig};
//! use gossip_counter::sync::MemoryNetwork;
//! use tokio::sync::watch;
//!
//! async fn example() -> gossip_counter::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let directory = MemoryDirectory::new();
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let transport = Arc::new(network.create_transport("pod-a", "10.0.0.1:7946")?);
//!     let pod = Pod::new(PodConfig::new("pod-a", "10.0.0.1:7946"), transport)?;
//!     let task = tokio::spawn(pod.clone().run(directory, shutdown_rx));
//!
//!     pod.increment("hits")?;
//!     println!("hits = {}", pod.read("hits"));
//!
//!     let _ = shutdown_tx.send(true);
//!     let _ = task.await;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `gossip_counter::core` - store, codec, digests
//! - `gossip_counter::sync` - delegate, broadcast queue, transports

pub mod config;
pub mod directory;
pub mod error;
pub mod pod;

pub use gossip_counter_core as core;
pub use gossip_counter_sync as sync;

pub use config::PodConfig;
pub use directory::{CounterService, MemoryDirectory, PeerDirectory};
pub use error::{PodError, Result};
pub use pod::{Pod, PodState};

pub use gossip_counter_core::{Actor, Counter, Delta, ReplicatedCounterStore, State};
pub use gossip_counter_sync::{GossipConfig, Transport};
