//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! This module defines the port interfaces (traits) of the routing table.
//!
//! ## Architecture
//!
//! - **Driving Ports (Inbound):** the event/query API the host calls
//! - **Driven Ports (Outbound):** RPC, lookup, clock, configuration and
//!   observer interfaces the host provides

pub mod inbound;
pub mod outbound;

pub use inbound::{RoutingAction, RoutingStats, RoutingTableApi};
pub use outbound::{
    ConfigProvider, LookupPort, NoopObserver, RoutingObserver, RpcPort, TimeSource,
};
