//! # Gossip Counter Sync
//!
//! Epidemic dissemination of counter updates between pods.
//!
//! ## Overview
//!
//! Two channels keep replicas converging:
//!
//! - **Broadcast**: every local increment produces a delta that is queued and
//!   piggybacked on gossip rounds, retransmitted a bounded number of times.
//! - **Push/pull**: periodically a pod exchanges its full state with one
//!   random peer, repairing anything the broadcast channel lost.
//!
//! Both channels are idempotent and commutative, so duplicates and
//! reordering are harmless.
//!
//! ## Key Types
//!
//! - [`GossipDelegate`]: callbacks the transport invokes on the replica
//! - [`CounterDelegate`]: the delegate backed by a replicated counter store
//! - [`BroadcastQueue`]: transmit-limited outgoing queue
//! - [`Transport`]: group membership and payload delivery
//! - [`MemoryNetwork`]: in-process transport for tests and simulation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gossip_counter_core::{Actor, ReplicatedCounterStore};
//! use gossip_counter_sync::{BroadcastQueue, CounterDelegate, MemoryNetwork, Transport};
//!
//! async fn example() -> gossip_counter_sync::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let transport = network.create_transport("pod-a", "10.0.0.1:7946")?;
//!
//!     let store = Arc::new(ReplicatedCounterStore::with_default_capacity(Actor::from("pod-a")));
//!     let delegate = Arc::new(CounterDelegate::new("pod-a", store, BroadcastQueue::new(5, || 1)));
//!     transport.set_delegate(delegate.clone());
//!
//!     delegate.on_increment("hits");
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Pod A                                  Pod B
//!   | on_increment("x")                    |
//!   |   -> BroadcastQueue                  |
//!   |------- Delta{A,{x:n}} (gossip) ----->| notify_msg -> apply_delta
//!   |                                      |
//!   |------- State (push) ---------------->| merge_remote_state
//!   |<------ State (pull) -----------------|
//!   | merge_remote_state                   |
//! ```

pub mod config;
pub mod convergence;
pub mod delegate;
pub mod error;
pub mod queue;
pub mod transport;

pub use config::GossipConfig;
pub use convergence::{diverging_pairs, verify_all, verify_convergence, ConvergenceResult};
pub use delegate::{CounterDelegate, GossipDelegate};
pub use error::{Result, SyncError};
pub use queue::{retransmit_limit, BroadcastQueue, MemberCount};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Member, Transport};
