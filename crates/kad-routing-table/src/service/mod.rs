//! # Routing Service
//!
//! High-level service implementing the `RoutingTableApi` port.
//!
//! The service wraps the domain `RoutingTable` together with the bootstrap
//! controller, the size estimator and collision verification, and turns
//! every inbound event into `RoutingAction`s for the host. It performs no
//! I/O and is driven by a single owner (see the `runtime` module).

// Semantic submodules
mod api;
mod bootstrap;
mod core;
mod maintenance;

// Re-export public API
pub use core::RoutingService;
