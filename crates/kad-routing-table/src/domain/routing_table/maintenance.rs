//! Per-leaf alive checks and refreshes.

use rand::Rng;
use tracing::debug;

use super::bucket::{Bucket, BucketId, BucketTimer};
use super::table::RoutingTable;
use crate::domain::{Fired, KNodeRef, Kuid, NodeStatus, Timestamp};

/// Work decided by one alive check.
#[derive(Debug, Default)]
pub struct AliveCheck {
    /// Nodes to ping.
    pub ping: Vec<KNodeRef>,
    /// Stale nodes dropped for being silent too long.
    pub expired: Vec<KNodeRef>,
    /// Pending nodes promoted to fill the good list.
    pub promoted: usize,
    /// The good list is under half full; refresh regardless of policy.
    pub force_refresh: bool,
}

impl RoutingTable {
    /// Earliest armed timer.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    /// Pop every timer due at `now`, re-arm it and return what fired.
    ///
    /// Timers whose leaf has been split since arming are ignored.
    pub fn take_due_timers(&mut self, now: Timestamp) -> Vec<BucketTimer> {
        let mut due = Vec::new();
        for Fired { id, event, .. } in self.timers.pop_due(now) {
            let owned = match self.buckets.get_mut(event.bucket.0).and_then(Bucket::leaf_mut) {
                Some(leaf) => {
                    let slot = leaf.timer_slot(event.kind);
                    if slot.as_ref().is_some_and(|h| h.id() == id) {
                        *slot = None;
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            if !owned {
                debug!(bucket = %event.bucket, kind = ?event.kind, "ignoring orphaned timer");
                continue;
            }
            self.rearm(event.bucket, event.kind, now);
            due.push(event);
        }
        due
    }

    /// Alive check of one leaf.
    ///
    /// Backfills good from pending, drops stale nodes silent for longer than
    /// `stale_max_age_secs` and selects the nodes to ping: good nodes not
    /// heard from within the alive period, plus recontactable stale and
    /// shutting-down pending nodes.
    pub fn alive_check(&mut self, leaf: BucketId, now: Timestamp) -> Option<AliveCheck> {
        if self.shut_down || !self.bucket(leaf).is_some_and(Bucket::is_leaf) {
            return None;
        }

        let mut check = AliveCheck::default();
        while self.promote_pending(leaf).is_some() {
            check.promoted += 1;
        }

        let k = self.config().k;
        let alive_period = self.config().alive_period();
        let stale_max_age = self.config().stale_max_age_secs;
        let lists = self.lists(leaf);
        let good = lists.count(NodeStatus::Good);
        check.force_refresh = good * 2 < k;

        let mut expired = Vec::new();
        for (node, status) in lists.iter_all() {
            if node.is_verifying() {
                continue;
            }
            let silent_for = now.secs_since(node.last_seen());
            let wanted = match status {
                NodeStatus::Good => silent_for >= alive_period,
                NodeStatus::Stale if silent_for > stale_max_age => {
                    expired.push(*node.id());
                    false
                }
                NodeStatus::Stale => true,
                NodeStatus::Pending => node.is_shutting_down(),
                NodeStatus::Unknown => false,
            };
            if wanted && node.can_recontact(now) {
                check.ping.push(node.clone());
            }
        }

        for id in expired {
            if let Some(node) = self.remove_in(leaf, &id) {
                debug!(kuid = %id, bucket = %leaf, "dropped expired stale node");
                check.expired.push(node);
            }
        }

        Some(check)
    }

    /// Pick a refresh target inside a leaf, or `None` when no refresh is due.
    ///
    /// Unforced refreshes are skipped for a full leaf that cannot split and
    /// for a leaf looked up within its refresh period.
    pub fn refresh_target<R: Rng + ?Sized>(
        &mut self,
        leaf: BucketId,
        forced: bool,
        now: Timestamp,
        rng: &mut R,
    ) -> Option<Kuid> {
        if self.shut_down {
            return None;
        }
        let bucket = self.bucket(leaf)?;
        let nodes = bucket.leaf()?.nodes();

        if !forced {
            if nodes.count(NodeStatus::Good) >= self.config().k && !self.is_splitable(leaf) {
                return None;
            }
            let period = self.refresh_period(leaf);
            if bucket
                .last_lookup
                .is_some_and(|last| now.secs_since(last) < period)
            {
                return None;
            }
        }

        let target = Kuid::random_in_prefix(&bucket.prefix, bucket.depth, rng);
        self.buckets[leaf.0].last_lookup = Some(now);
        debug!(bucket = %leaf, depth = self.buckets[leaf.0].depth, forced, "refreshing bucket");
        Some(target)
    }
}
