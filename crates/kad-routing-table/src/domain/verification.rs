//! # Identity Collision Verification
//!
//! A node claiming a KUID already bound to another address is not trusted
//! outright. The incumbent is flagged as verifying and its old address is
//! pinged without the usual reply-identity check:
//!
//! - silence, or an answer carrying another KUID, evicts the incumbent and
//!   admits the challenger (unless some other record took the KUID in the
//!   meantime);
//! - an answer with the same KUID keeps the incumbent and drops the
//!   challenger.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{
    InsertOutcome, KNodeRef, Kuid, PingOutcome, RejectReason, RoutingTable, Timestamp,
};

/// One collision under verification.
#[derive(Debug, Clone)]
pub struct Verification {
    pub incumbent: KNodeRef,
    pub challenger: KNodeRef,
    /// Whether the challenger contacted us directly.
    pub from_traffic: bool,
    pub started: Timestamp,
}

/// How a collision was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionResolution {
    /// The incumbent answered; the challenger was discarded.
    IncumbentKept,
    /// The incumbent was evicted and the challenger offered to the table.
    Replaced(InsertOutcome),
    /// The incumbent was evicted but the challenger could not take over.
    Dropped(RejectReason),
}

/// Collisions awaiting the incumbent's ping result, keyed by KUID.
#[derive(Debug, Default)]
pub struct PendingVerifications {
    pending: HashMap<Kuid, Verification>,
}

impl PendingVerifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start verifying `incumbent` against `challenger`.
    ///
    /// Returns false when a verification for that KUID is already running;
    /// the new challenger is then ignored.
    pub fn begin(
        &mut self,
        incumbent: KNodeRef,
        challenger: KNodeRef,
        from_traffic: bool,
        now: Timestamp,
    ) -> bool {
        let id = *incumbent.id();
        if self.pending.contains_key(&id) {
            debug!(kuid = %id, "collision already under verification");
            return false;
        }
        incumbent.set_verifying(true);
        self.pending.insert(
            id,
            Verification {
                incumbent,
                challenger,
                from_traffic,
                started: now,
            },
        );
        true
    }

    /// Remove the verifications running for `timeout_secs` or longer,
    /// ordered by KUID.
    pub fn expire(&mut self, now: Timestamp, timeout_secs: u64) -> Vec<Verification> {
        let mut overdue: Vec<Kuid> = self
            .pending
            .iter()
            .filter(|(_, v)| now.secs_since(v.started) >= timeout_secs)
            .map(|(id, _)| *id)
            .collect();
        overdue.sort();
        overdue
            .iter()
            .filter_map(|id| self.pending.remove(id))
            .collect()
    }

    /// When the oldest running verification times out.
    pub fn next_deadline(&self, timeout_secs: u64) -> Option<Timestamp> {
        self.pending
            .values()
            .map(|v| v.started.add_secs(timeout_secs))
            .min()
    }

    pub fn take(&mut self, id: &Kuid) -> Option<Verification> {
        self.pending.remove(id)
    }

    pub fn contains(&self, id: &Kuid) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Abandon every verification, clearing the incumbents' flags.
    pub fn clear(&mut self) {
        for (_, v) in self.pending.drain() {
            v.incumbent.set_verifying(false);
        }
    }
}

impl RoutingTable {
    /// Settle a collision from the ping sent to the incumbent's address.
    pub fn resolve_collision(
        &mut self,
        verification: Verification,
        outcome: PingOutcome,
        now: Timestamp,
    ) -> CollisionResolution {
        let Verification {
            incumbent,
            challenger,
            from_traffic,
            ..
        } = verification;
        let id = *incumbent.id();
        incumbent.set_verifying(false);

        if outcome == (PingOutcome::Reply { id }) {
            debug!(kuid = %id, addr = %incumbent.addr(), "incumbent confirmed, dropping challenger");
            // The incumbent may have been removed meanwhile.
            let _ = self.record_activity(&id, now);
            return CollisionResolution::IncumbentKept;
        }

        if self
            .find_node(&id)
            .is_some_and(|current| Arc::ptr_eq(&current, &incumbent))
        {
            self.remove(&id);
            debug!(kuid = %id, addr = %incumbent.addr(), "incumbent silent, evicted");
        }

        if challenger.is_firewalled() {
            return CollisionResolution::Dropped(RejectReason::Firewalled);
        }
        if let Some(other) = self.find_node(&id) {
            warn!(kuid = %id, addr = %other.addr(), challenger = %challenger.addr(), "identifier taken again during verification");
            return CollisionResolution::Dropped(RejectReason::Collision);
        }

        let inserted = self.insert(challenger, from_traffic, now);
        debug!(kuid = %id, ?inserted, "challenger admitted after verification");
        CollisionResolution::Replaced(inserted)
    }
}
