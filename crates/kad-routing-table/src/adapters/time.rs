//! Wall-clock time source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::Timestamp;
use crate::ports::TimeSource;

/// System clock that never goes backwards.
///
/// Timer deadlines are absolute timestamps, so a wall clock stepped back
/// (NTP, manual change) would stall every leaf timer until it caught up.
/// Readings are clamped to the highest value returned so far; clones share
/// that high-water mark.
///
/// For tests use `ControllableTimeSource` (feature `test-utils`).
///
/// # Example
///
/// ```rust
/// use kad_routing_table::adapters::SystemTimeSource;
/// use kad_routing_table::ports::TimeSource;
///
/// let clock = SystemTimeSource::new();
/// let first = clock.now();
/// assert!(clock.now() >= first);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemTimeSource {
    high_water: Arc<AtomicU64>,
}

impl SystemTimeSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn wall_clock_secs() -> u64 {
        // A clock set before the epoch reads as zero.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Clamp a raw reading against the high-water mark.
    fn observe(&self, secs: u64) -> u64 {
        let previous = self.high_water.fetch_max(secs, Ordering::AcqRel);
        previous.max(secs)
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.observe(Self::wall_clock_secs()))
    }
}
