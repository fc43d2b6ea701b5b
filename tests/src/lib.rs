//! # Routing Table Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Criterion benchmarks of the routing trie
//! └── integration/      # Actor flows over a simulated network
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p routing-tests
//! cargo bench -p routing-tests
//! ```

pub mod benchmarks;
pub mod integration;
