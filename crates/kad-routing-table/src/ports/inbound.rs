//! # Driving Ports (Inbound API)
//!
//! The events and queries the host feeds into the routing table.
//!
//! Event methods return the [`RoutingAction`]s the host must carry out
//! (pings, lookups, notifications). The table never performs I/O itself.

use serde::Serialize;

use crate::domain::{
    BootStatus, KNodeRef, Kuid, LoadReport, LookupError, LookupMode, NodeStatus, PingOutcome,
    RoutingError, SnapshotRecord, TableStats,
};

/// Work requested by the routing table.
#[derive(Debug, Clone)]
pub enum RoutingAction {
    /// Ping a registered node; report the result with `ping_completed`.
    Ping(KNodeRef),
    /// Ping the incumbent's address without identity check; report the
    /// result with `address_verified`.
    VerifyAddress { incumbent: KNodeRef },
    /// Run a lookup; report the result with `lookup_completed`.
    StartLookup { target: Kuid, mode: LookupMode },
    TableSizeChanged(u64),
    BucketCountChanged { buckets: usize, leaves: usize },
    BootstrapStatusChanged(BootStatus),
}

/// Table statistics plus the state of the surrounding machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutingStats {
    #[serde(flatten)]
    pub table: TableStats,
    pub bootstrap: BootStatus,
    pub size_estimate: Option<u64>,
    /// Collisions awaiting verification
    pub verifying: usize,
}

/// Primary API for interacting with the routing table.
///
/// # Example
///
/// ```rust,ignore
/// use kad_routing_table::ports::RoutingTableApi;
///
/// fn on_message<T: RoutingTableApi>(api: &mut T, sender: KNodeRef) {
///     for action in api.traffic_from(sender) {
///         // hand over to the RPC / lookup layers
///     }
/// }
/// ```
pub trait RoutingTableApi {
    /// A message was received from `node`.
    fn traffic_from(&mut self, node: KNodeRef) -> Vec<RoutingAction>;

    /// `node` appeared in a lookup reply without contacting us.
    fn learned(&mut self, node: KNodeRef) -> Vec<RoutingAction>;

    /// An RPC to `id` timed out. Returns the node's new status.
    fn rpc_timeout(&mut self, id: &Kuid) -> Result<NodeStatus, RoutingError>;

    /// `id` announced it is shutting down.
    fn shutting_down(&mut self, id: &Kuid) -> Result<NodeStatus, RoutingError>;

    /// A ping requested through [`RoutingAction::Ping`] finished.
    fn ping_completed(&mut self, node: &KNodeRef, outcome: PingOutcome) -> Vec<RoutingAction>;

    /// A ping requested through [`RoutingAction::VerifyAddress`] finished.
    fn address_verified(&mut self, incumbent: &Kuid, outcome: PingOutcome) -> Vec<RoutingAction>;

    /// A lookup finished, whoever started it.
    fn lookup_completed(
        &mut self,
        target: Kuid,
        mode: LookupMode,
        result: Result<Vec<KNodeRef>, LookupError>,
    ) -> Vec<RoutingAction>;

    /// Good nodes closest to `target`, closest first.
    fn find_closest(&self, target: &Kuid, count: usize) -> Vec<KNodeRef>;

    fn find_node(&self, id: &Kuid) -> Option<KNodeRef>;

    fn stats(&self) -> RoutingStats;

    /// Records worth persisting, closest to our KUID first.
    fn snapshot(&self) -> Vec<SnapshotRecord>;

    fn load_snapshot(&mut self, records: Vec<SnapshotRecord>) -> (LoadReport, Vec<RoutingAction>);
}
