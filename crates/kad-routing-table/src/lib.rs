//! # Kademlia Routing Table
//!
//! Routing table of a Kademlia DHT node over 160-bit KUIDs.
//!
//! The table is a binary trie of k-buckets that only keeps splitting near
//! the local KUID (plus a configurable number of extra splits in the
//! closest sibling subtree). Every leaf keeps three bounded lists of
//! nodes: good, stale and pending. Leaves carry their own alive-check and
//! refresh timers, and a bootstrap controller fills the table once the
//! first node is known.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** KUIDs, routing trie, node lists, bootstrap, size estimate
//! - **Ports Layer:** Trait definitions for the RPC, lookup and clock collaborators
//! - **Service Layer:** Turns every event into actions for the host
//! - **Runtime:** tokio actor that owns the service (feature `runtime`)
//! - **Adapters Layer:** Clock, configuration and snapshot codec
//!
//! ## Features
//!
//! - `runtime` (default) - tokio actor and handle
//! - `config` (default) - TOML configuration file
//! - `test-utils` - controllable time source
//!
//! ## Example
//!
//! ```rust
//! use kad_routing_table::{
//!     IpAddr, KNode, Kuid, ProtocolVersion, RoutingConfig, RoutingTable, SocketAddr,
//!     Timestamp, VendorCode,
//! };
//!
//! let now = Timestamp::new(1000);
//! let mut table = RoutingTable::new(Kuid::ZERO, RoutingConfig::default(), now).unwrap();
//!
//! let mut bytes = [0u8; 20];
//! bytes[0] = 0x80;
//! let node = KNode::new(
//!     Kuid::new(bytes),
//!     SocketAddr::new(IpAddr::v4(192, 168, 1, 100), 6346),
//!     VendorCode::new(*b"GTKG"),
//!     ProtocolVersion::new(0, 1),
//!     now,
//! );
//!
//! assert!(table.insert(node, true, now).is_added());
//! assert_eq!(table.find_closest(&Kuid::ZERO, 8).len(), 1);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// FEATURE-GATED MODULES
// =============================================================================

/// Single-owner tokio actor.
/// Requires feature: `runtime`
#[cfg(feature = "runtime")]
pub mod runtime;

pub mod adapters;

/// Test utilities (ControllableTimeSource)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// CORE RE-EXPORTS (Always Available)
// =============================================================================

// Domain entities
pub use domain::{
    BootStatus, InsertOutcome, IntegrityError, IpAddr, KNode, KNodeRef, Kuid, LoadReport,
    LookupError, LookupMode, NodeRole, NodeStatus, PingOutcome, ProtocolVersion, RejectReason,
    RoutingConfig, RoutingError, RoutingTable, SnapshotError, SnapshotRecord, SocketAddr,
    TableStats, Timestamp, VendorCode,
};

// Domain services
pub use domain::{distance, estimate_size, find_k_closest, is_same_subnet, sort_by_distance};

// Port traits
pub use ports::{
    ConfigProvider, LookupPort, NoopObserver, RoutingAction, RoutingObserver, RoutingStats,
    RoutingTableApi, RpcPort, TimeSource,
};

// Service
pub use service::RoutingService;

// Adapters
pub use adapters::{StaticConfigProvider, SystemTimeSource};

#[cfg(feature = "config")]
pub use adapters::{ConfigError, TomlConfigProvider};

#[cfg(feature = "runtime")]
pub use runtime::{spawn, RoutingTableHandle};

// =============================================================================
// TEST UTILITIES (Requires `test-utils` feature)
// =============================================================================

#[cfg(feature = "test-utils")]
pub use test_utils::ControllableTimeSource;
