//! Routing Table Implementation
//!
//! A binary trie of k-buckets over the 160-bit KUID space. Only buckets
//! near the local KUID keep splitting, which bounds the table to
//! O(log N · K) nodes. Each leaf classifies its nodes as good, stale or
//! pending and owns an alive-check and a refresh timer.

// Semantic submodules
mod bucket;
mod integrity;
mod lists;
mod maintenance;
mod stats;
mod table;

// Re-export public API
pub use bucket::{Bucket, BucketContent, BucketId, BucketTimer, Leaf, TimerKind};
pub use lists::NodeLists;
pub use maintenance::AliveCheck;
pub use stats::TableStats;
pub use table::RoutingTable;

#[cfg(test)]
mod tests;
