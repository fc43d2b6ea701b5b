//! Test utilities for the routing table.
//!
//! This module provides deterministic clocks for testing.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use kad_routing_table::test_utils::ControllableTimeSource;
//! use kad_routing_table::ports::TimeSource;
//!
//! let time_source = ControllableTimeSource::new(1000);
//! time_source.advance(60);
//! assert_eq!(time_source.now().as_secs(), 1060);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::Timestamp;
use crate::ports::outbound::TimeSource;

/// Thread-safe TimeSource for tests requiring time advancement.
///
/// Clones share the same clock, so a test can keep one handle and give the
/// other to the service.
#[derive(Debug, Clone)]
pub struct ControllableTimeSource {
    time: Arc<AtomicU64>,
}

impl ControllableTimeSource {
    pub fn new(initial: u64) -> Self {
        Self {
            time: Arc::new(AtomicU64::new(initial)),
        }
    }

    /// Advances the internal clock by the specified seconds.
    pub fn advance(&self, secs: u64) {
        self.time.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: u64) {
        self.time.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.time.load(Ordering::SeqCst))
    }
}
