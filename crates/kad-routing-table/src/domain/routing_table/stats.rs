//! Derived table statistics.

use serde::Serialize;

use crate::domain::NodeStatus;

/// Counters maintained incrementally on every structural or status change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Buckets in the trie (leaves and internal)
    pub buckets: usize,
    /// Leaf buckets
    pub leaves: usize,
    pub good: usize,
    pub stale: usize,
    pub pending: usize,
    /// Depth of the deepest leaf; never decreases
    pub max_depth: usize,
}

impl TableStats {
    /// Nodes registered in any list.
    pub fn nodes(&self) -> usize {
        self.good + self.stale + self.pending
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        match status {
            NodeStatus::Good => self.good,
            NodeStatus::Stale => self.stale,
            NodeStatus::Pending => self.pending,
            NodeStatus::Unknown => 0,
        }
    }

    pub(crate) fn incr(&mut self, status: NodeStatus) {
        if let Some(slot) = self.slot(status) {
            *slot += 1;
        }
    }

    pub(crate) fn decr(&mut self, status: NodeStatus) {
        if let Some(slot) = self.slot(status) {
            *slot = slot.saturating_sub(1);
        }
    }

    fn slot(&mut self, status: NodeStatus) -> Option<&mut usize> {
        match status {
            NodeStatus::Good => Some(&mut self.good),
            NodeStatus::Stale => Some(&mut self.stale),
            NodeStatus::Pending => Some(&mut self.pending),
            NodeStatus::Unknown => None,
        }
    }
}
