//! Persisted route-table content.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{
    is_usable_address, sort_by_distance, InsertOutcome, KNode, KNodeRef, Kuid, ProtocolVersion,
    RoutingTable, SocketAddr, Timestamp, VendorCode,
};

/// One retained node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub kuid: Kuid,
    pub vendor: VendorCode,
    pub version: ProtocolVersion,
    pub addr: SocketAddr,
    pub last_seen: Timestamp,
}

impl SnapshotRecord {
    pub fn from_node(node: &KNode) -> Self {
        Self {
            kuid: *node.id(),
            vendor: node.vendor(),
            version: node.version(),
            addr: node.addr(),
            last_seen: node.last_seen(),
        }
    }

    /// Fresh record carrying the persisted attributes.
    pub fn to_node(&self) -> KNodeRef {
        KNode::new(self.kuid, self.addr, self.vendor, self.version, self.last_seen)
    }
}

/// Outcome of a snapshot load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: usize,
    /// Records with an unusable address or refused by the table.
    pub skipped: usize,
}

impl RoutingTable {
    /// Good nodes and recent stale nodes, closest to our KUID first.
    pub fn snapshot(&self, now: Timestamp) -> Vec<SnapshotRecord> {
        self.retained_nodes(now)
            .iter()
            .map(|node| SnapshotRecord::from_node(node))
            .collect()
    }

    /// Re-insert persisted nodes, closest to our KUID first so the closest
    /// subtree fills before far buckets.
    pub fn load_snapshot(&mut self, mut records: Vec<SnapshotRecord>, now: Timestamp) -> LoadReport {
        let local = *self.local_id();
        sort_by_distance(&mut records, &local, |r| r.kuid);

        let mut report = LoadReport::default();
        for record in records {
            if !is_usable_address(&record.addr, self.config().allow_loopback) {
                warn!(kuid = %record.kuid, addr = %record.addr, "skipping snapshot record with unusable address");
                report.skipped += 1;
                continue;
            }
            match self.insert(record.to_node(), false, now) {
                InsertOutcome::Added(_) => report.inserted += 1,
                outcome => {
                    debug!(kuid = %record.kuid, ?outcome, "snapshot record not stored");
                    report.skipped += 1;
                }
            }
        }
        report
    }
}
