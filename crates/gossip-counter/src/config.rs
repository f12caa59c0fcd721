//! Pod configuration.

use std::time::Duration;

use gossip_counter_core::DEFAULT_CAPACITY;
use gossip_counter_sync::GossipConfig;

use crate::error::{PodError, Result};

/// Configuration for a single pod.
#[derive(Debug, Clone)]
pub struct PodConfig {
    /// Pod name. Also the actor under which this pod's increments are recorded,
    /// so it must be unique in the cluster and stable for the pod's lifetime.
    pub name: String,
    /// Address peers use to reach this pod's gossip transport.
    pub gossip_addr: String,
    /// How often the known-member list is logged.
    pub report_interval: Duration,
    /// Per-actor key capacity.
    pub capacity: usize,
    /// Gossip sizing. The pod reads `retransmit_mult` for its broadcast
    /// queue; the timers belong to whatever drives the transport.
    pub gossip: GossipConfig,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            name: "pod-0".to_string(),
            gossip_addr: "127.0.0.1:7946".to_string(),
            report_interval: Duration::from_secs(3),
            capacity: DEFAULT_CAPACITY,
            gossip: GossipConfig::default(),
        }
    }
}

impl PodConfig {
    pub fn new(name: impl Into<String>, gossip_addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gossip_addr: gossip_addr.into(),
            ..Self::default()
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_gossip(mut self, gossip: GossipConfig) -> Self {
        self.gossip = gossip;
        self
    }

    /// Reject configurations the pod cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PodError::InvalidConfig("pod name is empty".into()));
        }
        if self.capacity == 0 {
            return Err(PodError::InvalidConfig("capacity must be positive".into()));
        }
        if self.report_interval.is_zero() {
            return Err(PodError::InvalidConfig("report_interval must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PodConfig::default();
        assert_eq!(config.capacity, 1 << 20);
        assert_eq!(config.report_interval, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PodConfig::new("a", "a:7946").with_capacity(0);
        assert!(matches!(config.validate(), Err(PodError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_report_interval_rejected() {
        let config = PodConfig::new("a", "a:7946").with_report_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(PodError::InvalidConfig(_))));
    }

    #[test]
    fn test_gossip_timers_left_to_transport_driver() {
        let gossip = GossipConfig {
            gossip_interval: Duration::ZERO,
            push_pull_interval: Duration::ZERO,
            ..GossipConfig::default()
        };
        assert!(PodConfig::new("a", "a:7946").with_gossip(gossip).validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(PodConfig::new("", "a:7946").validate().is_err());
    }
}
