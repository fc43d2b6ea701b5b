//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces the routing table **requires** from the host:
//! an RPC layer that can ping nodes, a lookup layer that walks the overlay,
//! a clock, a configuration source and an observer for table changes.

use async_trait::async_trait;

use crate::domain::{
    BootStatus, KNodeRef, Kuid, LookupError, LookupMode, PingOutcome, RoutingConfig, SocketAddr,
    Timestamp,
};

/// RPC layer used for liveness checks.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; pings run as concurrent tasks.
#[async_trait]
pub trait RpcPort: Send + Sync {
    /// Ping a node and report whether it answered with its KUID.
    ///
    /// A reply carrying another KUID means the address now belongs to a
    /// different node.
    async fn ping(&self, node: KNodeRef) -> PingOutcome;

    /// Ping a bare address without checking the identity of the replier.
    ///
    /// Used for collision verification and for contacting seed addresses.
    async fn ping_address(&self, addr: SocketAddr) -> PingOutcome;
}

/// Iterative node lookup.
#[async_trait]
pub trait LookupPort: Send + Sync {
    /// Walk the overlay towards `target` and return the closest nodes
    /// found, closest first.
    ///
    /// Nodes met along the way are expected to be reported separately as
    /// learned.
    async fn lookup(&self, target: Kuid, mode: LookupMode) -> Result<Vec<KNodeRef>, LookupError>;
}

/// Notifications about table-wide changes. Every method defaults to a no-op.
pub trait RoutingObserver: Send + Sync {
    /// The network size estimate changed.
    fn table_size_changed(&self, _estimate: u64) {}

    /// A split changed the number of buckets.
    fn bucket_count_changed(&self, _buckets: usize, _leaves: usize) {}

    fn bootstrap_status_changed(&self, _status: BootStatus) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RoutingObserver for NoopObserver {}

/// Abstract interface for time-related operations.
///
/// Enables deterministic testing by injecting controllable time sources.
/// Production implementations use system time; tests use fixed timestamps.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Abstract interface for configuration loading.
///
/// Allows different configuration sources (file, environment, etc.)
pub trait ConfigProvider: Send + Sync {
    /// Get seed addresses to contact when the table is empty.
    fn get_seed_addresses(&self) -> Vec<SocketAddr>;

    /// Get routing table parameters.
    fn get_routing_config(&self) -> RoutingConfig;
}
