//! Gossip timing and sizing configuration.

use std::time::Duration;

/// Configuration for the two dissemination channels.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// How often queued deltas are pushed to peers.
    pub gossip_interval: Duration,
    /// How often a full-state exchange runs with one random peer.
    pub push_pull_interval: Duration,
    /// Number of random peers each gossip round targets.
    pub gossip_nodes: usize,
    /// Retransmissions per message scale as `retransmit_mult * ceil(log10(n + 1))`.
    pub retransmit_mult: usize,
    /// Byte budget for broadcasts drained in one gossip round.
    pub max_broadcast_bytes: usize,
    /// Framing overhead charged per broadcast against the budget.
    pub broadcast_overhead: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            gossip_interval: Duration::from_millis(200),
            push_pull_interval: Duration::from_secs(3),
            gossip_nodes: 3,
            retransmit_mult: 5,
            max_broadcast_bytes: 1400,
            broadcast_overhead: 2,
        }
    }
}

impl GossipConfig {
    /// Faster timers for tests and local simulation.
    pub fn local() -> Self {
        Self {
            gossip_interval: Duration::from_millis(20),
            push_pull_interval: Duration::from_millis(100),
            ..Self::default()
        }
    }
}
