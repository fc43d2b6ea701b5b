//! Domain Layer - Pure routing-table logic with no I/O
//!
//! This module contains:
//! - KUIDs, XOR distance and subnet checks
//! - Shared node records
//! - The routing trie with its good/stale/pending leaf lists
//! - Timer bookkeeping (callout queue)
//! - Bootstrap state machine
//! - Network size estimation
//! - Identity collision verification
//! - Snapshot records

pub mod bootstrap;
pub mod callout;
pub mod knode;
pub mod routing_table;
pub mod services;
pub mod size_estimate;
pub mod snapshot;
/// Core domain types (entities, values, errors)
pub mod types;
pub mod verification;

pub use bootstrap::*;
pub use callout::*;
pub use knode::*;
pub use routing_table::*;
pub use services::*;
pub use size_estimate::*;
pub use snapshot::*;
pub use types::*;
pub use verification::*;
