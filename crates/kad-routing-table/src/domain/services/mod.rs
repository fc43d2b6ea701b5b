//! Domain Services - Pure functions over identifiers and addresses
//!
//! All functions in this module are pure (no I/O, no state mutation)
//! and deterministic (same inputs → same outputs).

// Semantic submodules
mod distance;
mod security;
mod sorting;

// Re-export public API
pub use distance::{common_prefix_len, compare3, distance, match_leading};
pub use security::{is_same_subnet, is_usable_address, subnet_key};
pub use sorting::{find_k_closest, sort_by_distance};
