//! # Routing Table Benchmarks
//!
//! Criterion benchmarks over the routing trie.

pub mod routing_table;
