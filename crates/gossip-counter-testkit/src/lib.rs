//! # Gossip Counter Testkit
//!
//! Testing utilities for the gossip counter.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: pinned CBOR encodings of deltas and states
//! - **Generators**: proptest strategies for states, deltas and replicated executions
//! - **Fixtures**: standalone stores and whole in-process clusters
//!
//! ## Golden Vectors
//!
//! ```rust
//! use gossip_counter_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use gossip_counter_testkit::generators::{full_exchange, Script};
//!
//! proptest! {
//!     #[test]
//!     fn replicas_converge(script: Script) {
//!         let stores = script.run(1024);
//!         full_exchange(&stores);
//!         // every store now reads the same totals
//!     }
//! }
//! ```
//!
//! ## Cluster Fixtures
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use gossip_counter::CounterService;
//! use gossip_counter_testkit::fixtures::TestCluster;
//!
//! async fn example() {
//!     let cluster = TestCluster::start(3).await;
//!     cluster.pod(0).increment("hits").unwrap();
//!     assert!(cluster.wait_converged(Duration::from_secs(5)).await);
//!     cluster.shutdown().await;
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, stores, TestCluster};
pub use generators::{full_exchange, Op, Script};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
