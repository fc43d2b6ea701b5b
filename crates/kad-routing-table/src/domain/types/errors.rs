//! Domain Errors for the Routing Table
//!
//! Capacity decisions are reported as [`InsertOutcome`] values, not errors.
//! Only API misuse, collaborator failures and structural corruption are
//! represented here.

use thiserror::Error;

use super::entities::Kuid;

/// Errors returned by routing-table operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Node is not registered in the table.
    #[error("node {0} is not in the routing table")]
    NodeNotFound(Kuid),

    /// Attempted to insert the local identifier.
    #[error("cannot insert the local node into its own routing table")]
    SelfInsertion,

    /// The table has been torn down.
    #[error("routing table is shut down")]
    ShutDown,

    /// Configuration values are inconsistent.
    #[error("invalid routing configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by the lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The lookup was cancelled (table shutting down, caller gave up).
    #[error("lookup cancelled")]
    Cancelled,

    /// The lookup finished without finding any node.
    #[error("lookup found no nodes")]
    NoNodes,

    /// Any other failure.
    #[error("lookup failed: {0}")]
    Failed(String),
}

/// Structural invariant violations found by the integrity checker.
///
/// These indicate a corrupted table. Mutating operations that detect one
/// abort the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("bucket {bucket} at depth {depth}: {reason}")]
    Bucket {
        bucket: usize,
        depth: usize,
        reason: String,
    },

    #[error("node {kuid} is misplaced: {reason}")]
    Node { kuid: Kuid, reason: String },

    #[error("counter {name} is {actual}, expected {expected}")]
    Counter {
        name: &'static str,
        actual: usize,
        expected: usize,
    },
}

/// Errors decoding a persisted snapshot envelope.
///
/// Individual malformed records are skipped, never reported here.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Why a node was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Node carries the local identifier.
    SelfNode,
    /// Firewalled nodes are never inserted.
    Firewalled,
    /// Address is unspecified, multicast, broadcast or (unless allowed) loopback.
    UnusableAddress,
    /// Leaf is full, unsplitable and has no pending room (or the node was
    /// only learned, not heard from).
    BucketFull,
    /// Too many nodes from the same subnet in the leaf.
    BucketSubnetLimit,
    /// Too many nodes from the same subnet in the whole table.
    TableSubnetLimit,
    /// Identifier is bound to another address; collision verification runs.
    Collision,
    /// The table is shut down.
    ShutDown,
}

/// Result of an insertion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored with the given status.
    Added(super::NodeStatus),
    /// Identifier already present with the same address; activity recorded.
    AlreadyPresent,
    /// Not stored.
    Rejected(RejectReason),
}

impl InsertOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }
}
