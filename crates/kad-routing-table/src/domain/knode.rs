//! Shared node records.
//!
//! A record is reference-counted so the routing table, in-flight lookups and
//! RPC continuations can hold the same node at once. The mutable part lives
//! behind a lock; the identifier never changes.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{Kuid, NodeStatus, ProtocolVersion, SocketAddr, Timestamp, VendorCode};

/// Shared handle to a node record.
pub type KNodeRef = Arc<KNode>;

/// Upper bound on the recontact back-off exponent (2^16 seconds, ~18 hours).
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Liveness and classification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags {
    /// Node answered at least one RPC since it was (re)registered.
    pub alive: bool,
    /// Node cannot receive unsolicited traffic.
    pub firewalled: bool,
    /// Node announced it is leaving the network.
    pub shutting_down: bool,
    /// Node's address is being checked after an identity collision.
    pub verifying: bool,
}

#[derive(Debug, Clone)]
struct NodeState {
    addr: SocketAddr,
    vendor: VendorCode,
    version: ProtocolVersion,
    status: NodeStatus,
    rpc_timeouts: u32,
    last_seen: Timestamp,
    last_sent: Option<Timestamp>,
    flags: NodeFlags,
}

/// A remote DHT node as known to the routing table.
#[derive(Debug)]
pub struct KNode {
    id: Kuid,
    state: RwLock<NodeState>,
}

impl KNode {
    /// Create a new shared record, last seen at `now`.
    pub fn new(
        id: Kuid,
        addr: SocketAddr,
        vendor: VendorCode,
        version: ProtocolVersion,
        now: Timestamp,
    ) -> KNodeRef {
        Arc::new(Self {
            id,
            state: RwLock::new(NodeState {
                addr,
                vendor,
                version,
                status: NodeStatus::Unknown,
                rpc_timeouts: 0,
                last_seen: now,
                last_sent: None,
                flags: NodeFlags::default(),
            }),
        })
    }

    /// Create a firewalled record. Such nodes are never stored in the table.
    pub fn new_firewalled(
        id: Kuid,
        addr: SocketAddr,
        vendor: VendorCode,
        version: ProtocolVersion,
        now: Timestamp,
    ) -> KNodeRef {
        let node = Self::new(id, addr, vendor, version, now);
        node.state.write().flags.firewalled = true;
        node
    }

    pub fn id(&self) -> &Kuid {
        &self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.state.read().addr
    }

    pub fn vendor(&self) -> VendorCode {
        self.state.read().vendor
    }

    pub fn version(&self) -> ProtocolVersion {
        self.state.read().version
    }

    /// Current classification. Only authoritative while registered.
    pub fn status(&self) -> NodeStatus {
        self.state.read().status
    }

    pub fn rpc_timeouts(&self) -> u32 {
        self.state.read().rpc_timeouts
    }

    pub fn last_seen(&self) -> Timestamp {
        self.state.read().last_seen
    }

    /// When the last RPC was sent to this node, if ever.
    pub fn last_sent(&self) -> Option<Timestamp> {
        self.state.read().last_sent
    }

    pub fn flags(&self) -> NodeFlags {
        self.state.read().flags
    }

    pub fn is_firewalled(&self) -> bool {
        self.state.read().flags.firewalled
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.read().flags.shutting_down
    }

    pub fn is_verifying(&self) -> bool {
        self.state.read().flags.verifying
    }

    pub fn is_alive(&self) -> bool {
        self.state.read().flags.alive
    }

    /// Whether the node may be sent another RPC at `now`.
    ///
    /// After `t` consecutive timeouts the node must stay quiet for `2^t`
    /// seconds counted from the last RPC sent to it.
    pub fn can_recontact(&self, now: Timestamp) -> bool {
        let state = self.state.read();
        let Some(sent) = state.last_sent else {
            return true;
        };
        if state.rpc_timeouts == 0 {
            return true;
        }
        let backoff = 1u64 << state.rpc_timeouts.min(MAX_BACKOFF_SHIFT);
        now.secs_since(sent) >= backoff
    }

    /// Record that an RPC was just sent.
    pub fn mark_rpc_sent(&self, now: Timestamp) {
        self.state.write().last_sent = Some(now);
    }

    /// Copy the advertised attributes of a fresher record for the same node.
    pub(crate) fn refresh_from(&self, other: &KNode) {
        if std::ptr::eq(self, other) {
            return;
        }
        let (vendor, version) = {
            let theirs = other.state.read();
            (theirs.vendor, theirs.version)
        };
        let mut state = self.state.write();
        state.vendor = vendor;
        state.version = version;
    }

    pub(crate) fn set_status(&self, status: NodeStatus) {
        self.state.write().status = status;
    }

    /// Traffic was received from the node.
    pub(crate) fn mark_seen(&self, now: Timestamp) {
        let mut state = self.state.write();
        state.last_seen = state.last_seen.max(now);
        state.rpc_timeouts = 0;
        state.flags.alive = true;
        state.flags.shutting_down = false;
    }

    /// Returns the new timeout count.
    pub(crate) fn add_timeout(&self) -> u32 {
        let mut state = self.state.write();
        state.rpc_timeouts = state.rpc_timeouts.saturating_add(1);
        state.flags.alive = false;
        state.rpc_timeouts
    }

    pub(crate) fn set_shutting_down(&self, value: bool) {
        self.state.write().flags.shutting_down = value;
    }

    pub(crate) fn set_verifying(&self, value: bool) {
        self.state.write().flags.verifying = value;
    }
}
