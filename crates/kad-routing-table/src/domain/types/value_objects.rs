//! Value Objects for the Routing Table

use serde::{Deserialize, Serialize};

use super::errors::RoutingError;

/// Role the local node plays in the overlay.
///
/// Passive nodes only query the DHT; they keep a shallower tree and probe
/// their contacts less often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    #[default]
    Active,
    Passive,
}

/// Classification of a node record.
///
/// `Unknown` means the record is not (or no longer) registered in a table;
/// holders of a shared record must treat it as non-authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NodeStatus {
    #[default]
    Unknown,
    Good,
    Stale,
    Pending,
}

impl NodeStatus {
    /// The three statuses that correspond to a leaf list.
    pub const LISTED: [NodeStatus; 3] = [NodeStatus::Good, NodeStatus::Stale, NodeStatus::Pending];

    pub fn is_listed(&self) -> bool {
        !matches!(self, NodeStatus::Unknown)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeStatus::Unknown => "unknown",
            NodeStatus::Good => "good",
            NodeStatus::Stale => "stale",
            NodeStatus::Pending => "pending",
        };
        f.write_str(name)
    }
}

/// Purpose of a lookup requested from the lookup collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupMode {
    /// Plain node lookup.
    Node,
    /// Bootstrap lookup (own identifier or bootstrap completion target).
    Bootstrap,
    /// Bucket refresh lookup.
    Refresh,
}

/// Result of a ping, as reported by the RPC collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// The address answered, claiming `id`.
    Reply { id: super::entities::Kuid },
    Timeout,
}

/// Tunable routing-table parameters.
///
/// `k` bounds each of the good, stale and pending lists of a leaf
/// independently.
///
/// `closest_subtree_splits` is the number of extra subdivisions allowed in
/// the subtree that is the sibling of the bucket holding our own KUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Per-list bucket capacity (default: 8)
    pub k: usize,
    /// Role of the local node (default: active)
    pub role: NodeRole,
    /// Maximum bucket depth when active (default: 159)
    pub max_depth_active: usize,
    /// Maximum bucket depth when passive (default: 16)
    pub max_depth_passive: usize,
    /// Extra splits allowed beyond our ancestor chain (default: 2)
    pub closest_subtree_splits: usize,
    /// Maximum nodes from one /24 (IPv4) or /48 (IPv6) per bucket (default: 3)
    pub max_in_net_per_bucket: usize,
    /// Maximum nodes from one subnet across the table (default: 10)
    pub max_in_net_table: usize,
    /// RPC timeouts tolerated before a node is dropped (default: 5)
    pub max_rpc_timeouts: u32,
    /// Alive check period for active nodes (default: 10 minutes)
    pub alive_period_secs: u64,
    /// Alive check period for passive nodes (default: 20 minutes)
    pub alive_period_passive_secs: u64,
    /// Bucket refresh period (default: 1 hour)
    pub refresh_period_secs: u64,
    /// Refresh period of the buckets closest to our KUID (default: 15 minutes)
    pub our_refresh_period_secs: u64,
    /// Stale nodes silent for longer than this are dropped (default: 1 hour)
    pub stale_max_age_secs: u64,
    /// Collision verifications unanswered this long count as silence (default: 1 minute)
    pub verification_timeout_secs: u64,
    /// Lifetime of regional and peer size estimates (default: 1 hour)
    pub estimate_lifetime_secs: u64,
    /// Number of closest nodes used for one size estimate (default: 20)
    pub estimate_samples: usize,
    /// Peer-reported estimates kept per region (default: 8)
    pub peer_estimates_per_region: usize,
    /// Accept loopback addresses, for local test networks (default: false)
    pub allow_loopback: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            k: 8,
            role: NodeRole::Active,
            max_depth_active: 159,
            max_depth_passive: 16,
            closest_subtree_splits: 2,
            max_in_net_per_bucket: 3,
            max_in_net_table: 10,
            max_rpc_timeouts: 5,
            alive_period_secs: 600,
            alive_period_passive_secs: 1200,
            refresh_period_secs: 3600,
            our_refresh_period_secs: 900,
            stale_max_age_secs: 3600,
            verification_timeout_secs: 60,
            estimate_lifetime_secs: 3600,
            estimate_samples: 20,
            peer_estimates_per_region: 8,
            allow_loopback: false,
        }
    }
}

impl RoutingConfig {
    /// Create a config suitable for testing (smaller values)
    pub fn for_testing() -> Self {
        Self {
            k: 4,
            closest_subtree_splits: 1,
            max_in_net_per_bucket: 2,
            max_in_net_table: 4,
            max_rpc_timeouts: 3,
            alive_period_secs: 60,
            alive_period_passive_secs: 120,
            refresh_period_secs: 300,
            our_refresh_period_secs: 100,
            stale_max_age_secs: 600,
            verification_timeout_secs: 30,
            estimate_lifetime_secs: 600,
            estimate_samples: 8,
            peer_estimates_per_region: 3,
            ..Self::default()
        }
    }

    /// Maximum bucket depth for the configured role.
    pub fn max_depth(&self) -> usize {
        match self.role {
            NodeRole::Active => self.max_depth_active,
            NodeRole::Passive => self.max_depth_passive,
        }
    }

    /// Alive check period for the configured role.
    pub fn alive_period(&self) -> u64 {
        match self.role {
            NodeRole::Active => self.alive_period_secs,
            NodeRole::Passive => self.alive_period_passive_secs,
        }
    }

    /// Check the parameters for internal consistency.
    pub fn validate(&self) -> Result<(), RoutingError> {
        let invalid = |reason: &str| Err(RoutingError::InvalidConfig(reason.to_string()));

        if self.k == 0 {
            return invalid("k must be positive");
        }
        if self.max_depth_active >= super::entities::KUID_BITS {
            return invalid("max_depth_active must be below the KUID width");
        }
        if self.max_depth_passive > self.max_depth_active {
            return invalid("max_depth_passive exceeds max_depth_active");
        }
        if self.max_in_net_per_bucket == 0 || self.max_in_net_table < self.max_in_net_per_bucket {
            return invalid("subnet limits are inconsistent");
        }
        if self.alive_period_secs == 0
            || self.alive_period_passive_secs == 0
            || self.refresh_period_secs == 0
            || self.our_refresh_period_secs == 0
            || self.verification_timeout_secs == 0
        {
            return invalid("maintenance periods must be positive");
        }
        if self.estimate_samples < 2 || self.peer_estimates_per_region == 0 {
            return invalid("size estimation needs at least two samples and one peer slot");
        }
        Ok(())
    }
}

/// Subnet mask for IP diversity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetMask {
    /// Prefix length in bits (e.g., 24 for /24)
    pub prefix_length: u8,
}

impl SubnetMask {
    pub fn new(prefix_length: u8) -> Self {
        Self { prefix_length }
    }

    /// Default /24 subnet mask for IPv4
    pub fn ipv4_default() -> Self {
        Self { prefix_length: 24 }
    }

    /// Default /48 subnet mask for IPv6
    pub fn ipv6_default() -> Self {
        Self { prefix_length: 48 }
    }
}

impl Default for SubnetMask {
    fn default() -> Self {
        Self::ipv4_default()
    }
}
