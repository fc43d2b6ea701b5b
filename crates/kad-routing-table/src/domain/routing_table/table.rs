//! The routing trie: lookup, splitting and membership changes.

use std::collections::HashMap;

use tracing::{debug, error, info};

use super::bucket::{Bucket, BucketContent, BucketId, BucketTimer, Leaf, TimerKind};
use super::lists::NodeLists;
use super::stats::TableStats;
use crate::domain::{
    is_usable_address, sort_by_distance, subnet_key, CalloutQueue, InsertOutcome, IpAddr, KNodeRef,
    Kuid, NodeStatus, RejectReason, RoutingConfig, RoutingError, Timestamp, KUID_BITS,
};

/// Log and abort on a broken structural invariant.
///
/// Every distance-based guarantee of the table depends on the trie being
/// well formed, so there is nothing sensible to continue with.
#[cold]
pub(crate) fn corrupted(reason: &str) -> ! {
    error!(reason, "routing table corrupted, aborting");
    std::process::abort()
}

/// Kademlia routing table organised as a split trie of k-buckets.
///
/// All mutation goes through `&mut self`, so a single owner serialises
/// structural changes. Node records are shared; a record's status is only
/// authoritative while it is registered here.
#[derive(Debug)]
pub struct RoutingTable {
    /// Our own KUID (immutable after creation)
    local_id: Kuid,
    config: RoutingConfig,
    /// Bucket arena; index 0 is the root
    pub(crate) buckets: Vec<Bucket>,
    /// Leaf covering `local_id`
    pub(crate) ours_leaf: BucketId,
    pub(crate) timers: CalloutQueue<BucketTimer>,
    /// Table-wide node count per /24 or /48 subnet
    pub(crate) subnets: HashMap<IpAddr, usize>,
    pub(crate) stats: TableStats,
    pub(crate) shut_down: bool,
}

impl RoutingTable {
    /// Create a table holding a single empty root bucket with armed timers.
    pub fn new(local_id: Kuid, config: RoutingConfig, now: Timestamp) -> Result<Self, RoutingError> {
        config.validate()?;

        let root = Bucket::new_leaf(Kuid::ZERO, 0, None, true, 0, None);
        let mut table = Self {
            local_id,
            config,
            buckets: vec![root],
            ours_leaf: BucketId::ROOT,
            timers: CalloutQueue::new(),
            subnets: HashMap::new(),
            stats: TableStats {
                buckets: 1,
                leaves: 1,
                ..TableStats::default()
            },
            shut_down: false,
        };
        table.arm_timers(BucketId::ROOT, now);
        Ok(table)
    }

    /// Get our local KUID
    pub fn local_id(&self) -> &Kuid {
        &self.local_id
    }

    /// Get the configuration
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn stats(&self) -> TableStats {
        self.stats
    }

    pub fn bucket(&self, id: BucketId) -> Option<&Bucket> {
        self.buckets.get(id.0)
    }

    /// Leaf holding the local KUID.
    pub fn ours_leaf(&self) -> BucketId {
        self.ours_leaf
    }

    /// All leaf buckets, in creation order.
    pub fn leaves(&self) -> impl Iterator<Item = BucketId> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_leaf())
            .map(|(i, _)| BucketId(i))
    }

    /// Whether the tree is still a single unsplit bucket.
    pub fn is_single_leaf(&self) -> bool {
        self.stats.leaves == 1
    }

    /// Walk from the root to the leaf managing `id`.
    pub fn find_leaf(&self, id: &Kuid) -> BucketId {
        let mut current = BucketId::ROOT;
        for _ in 0..=KUID_BITS {
            let bucket = &self.buckets[current.0];
            match bucket.content {
                BucketContent::Leaf(_) => return current,
                BucketContent::Internal { zero, one } => {
                    current = if id.bit(bucket.depth) { one } else { zero };
                }
            }
        }
        corrupted("trie is deeper than the identifier width")
    }

    /// The registered record for `id`, if any.
    pub fn find_node(&self, id: &Kuid) -> Option<KNodeRef> {
        let leaf = self.find_leaf(id);
        self.lists(leaf).get(id).cloned()
    }

    /// Good nodes closest to `target`, closest first.
    ///
    /// Firewalled and shutting-down nodes are skipped. Subtrees are visited
    /// in XOR order, so the walk stops as soon as `count` nodes are found.
    pub fn find_closest(&self, target: &Kuid, count: usize) -> Vec<KNodeRef> {
        let mut found = Vec::with_capacity(count);
        let mut stack = vec![BucketId::ROOT];

        while let Some(current) = stack.pop() {
            if found.len() >= count {
                break;
            }
            let bucket = &self.buckets[current.0];
            match &bucket.content {
                BucketContent::Leaf(leaf) => {
                    let mut nodes: Vec<KNodeRef> = leaf
                        .nodes
                        .iter(NodeStatus::Good)
                        .filter(|n| !n.is_firewalled() && !n.is_shutting_down())
                        .cloned()
                        .collect();
                    sort_by_distance(&mut nodes, target, |n| *n.id());
                    found.extend(nodes);
                }
                BucketContent::Internal { zero, one } => {
                    let (near, far) = if target.bit(bucket.depth) {
                        (*one, *zero)
                    } else {
                        (*zero, *one)
                    };
                    stack.push(far);
                    stack.push(near);
                }
            }
        }

        found.truncate(count);
        found
    }

    /// Whether a leaf may still be split.
    ///
    /// A leaf below the role's maximum depth splits when it holds our KUID,
    /// when it lies within `closest_subtree_splits` levels of where its
    /// subtree left our path, or when it is the unsplit sibling of our leaf.
    ///
    /// The answer depends only on the leaf's own position, never on how deep
    /// our leaf has gone since, so the final shape does not depend on the
    /// order nodes arrive in.
    pub fn is_splitable(&self, leaf: BucketId) -> bool {
        let Some(bucket) = self.buckets.get(leaf.0) else {
            return false;
        };
        if self.shut_down || !bucket.is_leaf() || bucket.depth >= self.config.max_depth() {
            return false;
        }
        if bucket.ours {
            return true;
        }

        let ours_depth = self.buckets[self.ours_leaf.0].depth;
        let closest_subtree = bucket.depth < bucket.split_depth + self.config.closest_subtree_splits;
        let closer_sibling =
            bucket.split_depth + 1 == ours_depth && bucket.depth == bucket.split_depth;

        closest_subtree || closer_sibling
    }

    /// Offer a node to the table.
    ///
    /// `from_traffic` is true when the node contacted us directly; only such
    /// nodes may enter a full leaf's pending list.
    pub fn insert(&mut self, node: KNodeRef, from_traffic: bool, now: Timestamp) -> InsertOutcome {
        if self.shut_down {
            return InsertOutcome::Rejected(RejectReason::ShutDown);
        }
        let id = *node.id();
        if id == self.local_id {
            return InsertOutcome::Rejected(RejectReason::SelfNode);
        }
        if node.is_firewalled() {
            return InsertOutcome::Rejected(RejectReason::Firewalled);
        }
        let addr = node.addr();
        if !is_usable_address(&addr, self.config.allow_loopback) {
            return InsertOutcome::Rejected(RejectReason::UnusableAddress);
        }

        let mut leaf = self.find_leaf(&id);
        if let Some(existing) = self.lists(leaf).get(&id).cloned() {
            if existing.addr() != addr {
                return InsertOutcome::Rejected(RejectReason::Collision);
            }
            existing.refresh_from(&node);
            if from_traffic {
                self.record_activity_in(leaf, &id, now);
            }
            return InsertOutcome::AlreadyPresent;
        }

        let in_net = self.subnets.get(&subnet_key(&addr.ip)).copied().unwrap_or(0);
        if in_net >= self.config.max_in_net_table {
            debug!(kuid = %id, addr = %addr, "table subnet limit reached");
            return InsertOutcome::Rejected(RejectReason::TableSubnetLimit);
        }

        if from_traffic {
            node.mark_seen(now);
        }

        loop {
            let lists = self.lists(leaf);
            if lists.subnet_count(&addr.ip) >= self.config.max_in_net_per_bucket {
                debug!(kuid = %id, bucket = %leaf, "bucket subnet limit reached");
                return InsertOutcome::Rejected(RejectReason::BucketSubnetLimit);
            }
            if lists.count(NodeStatus::Good) < self.config.k {
                self.list_push(leaf, node, NodeStatus::Good);
                debug!(kuid = %id, bucket = %leaf, "added good node");
                return InsertOutcome::Added(NodeStatus::Good);
            }
            if !self.is_splitable(leaf) {
                break;
            }
            self.split(leaf, now);
            leaf = self.find_leaf(&id);
        }

        if from_traffic && self.lists(leaf).count(NodeStatus::Pending) < self.config.k {
            self.list_push(leaf, node, NodeStatus::Pending);
            debug!(kuid = %id, bucket = %leaf, "added pending node");
            return InsertOutcome::Added(NodeStatus::Pending);
        }

        debug!(kuid = %id, bucket = %leaf, "bucket full, node not stored");
        InsertOutcome::Rejected(RejectReason::BucketFull)
    }

    /// Move a node to another list. `Unknown` removes it.
    pub fn set_status(&mut self, id: &Kuid, status: NodeStatus) -> Result<(), RoutingError> {
        let (leaf, current) = self.locate(id)?;
        if status == NodeStatus::Unknown {
            self.remove_in(leaf, id);
        } else {
            self.set_status_in(leaf, id, current, status);
        }
        Ok(())
    }

    /// Traffic was received from a registered node. Returns its new status.
    pub fn record_activity(&mut self, id: &Kuid, now: Timestamp) -> Result<NodeStatus, RoutingError> {
        let (leaf, _) = self.locate(id)?;
        Ok(self.record_activity_in(leaf, id, now))
    }

    /// An RPC to a registered node timed out. Returns its new status
    /// (`Unknown` when it was dropped).
    pub fn rpc_timeout(&mut self, id: &Kuid) -> Result<NodeStatus, RoutingError> {
        let (leaf, current) = self.locate(id)?;
        let node = self.lists(leaf).get(id).cloned().ok_or(RoutingError::NodeNotFound(*id))?;

        let timeouts = node.add_timeout();
        if timeouts >= self.config.max_rpc_timeouts {
            debug!(kuid = %id, timeouts, "too many timeouts, dropping node");
            self.remove_in(leaf, id);
            return Ok(NodeStatus::Unknown);
        }

        match current {
            NodeStatus::Good => {
                self.set_status_in(leaf, id, current, NodeStatus::Stale);
                Ok(NodeStatus::Stale)
            }
            NodeStatus::Pending => {
                self.remove_in(leaf, id);
                Ok(NodeStatus::Unknown)
            }
            other => Ok(other),
        }
    }

    /// A node announced it is leaving. Good nodes are parked in pending.
    pub fn shutting_down(&mut self, id: &Kuid) -> Result<NodeStatus, RoutingError> {
        let (leaf, current) = self.locate(id)?;
        if let Some(node) = self.lists(leaf).get(id) {
            node.set_shutting_down(true);
        }
        if current == NodeStatus::Good {
            self.set_status_in(leaf, id, current, NodeStatus::Pending);
            return Ok(NodeStatus::Pending);
        }
        Ok(current)
    }

    /// Remove a node from whichever list holds it.
    pub fn remove(&mut self, id: &Kuid) -> Option<KNodeRef> {
        if self.shut_down {
            return None;
        }
        let leaf = self.find_leaf(id);
        self.remove_in(leaf, id)
    }

    /// Note that a lookup for `target` just happened.
    pub fn touch_lookup(&mut self, target: &Kuid, now: Timestamp) {
        let leaf = self.find_leaf(target);
        self.buckets[leaf.0].last_lookup = Some(now);
    }

    /// Good nodes plus stale nodes still worth remembering, closest to our
    /// KUID first.
    pub fn retained_nodes(&self, now: Timestamp) -> Vec<KNodeRef> {
        let max_age = self.config.stale_max_age_secs;
        let mut nodes: Vec<KNodeRef> = self
            .buckets
            .iter()
            .filter_map(Bucket::leaf)
            .flat_map(|leaf| leaf.nodes.iter_all())
            .filter(|(node, status)| match status {
                NodeStatus::Good => true,
                NodeStatus::Stale => {
                    !node.is_shutting_down() && now.secs_since(node.last_seen()) <= max_age
                }
                _ => false,
            })
            .map(|(node, _)| node.clone())
            .collect();
        sort_by_distance(&mut nodes, &self.local_id, |n| *n.id());
        nodes
    }

    /// Tear the table down: cancel every timer and unregister every node.
    ///
    /// Returns the nodes that were registered, with their final status.
    pub fn shutdown(&mut self) -> Vec<(KNodeRef, NodeStatus)> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;

        let mut drained = Vec::new();
        let mut handles = Vec::new();
        for bucket in self.buckets.iter_mut() {
            if let Some(leaf) = bucket.leaf_mut() {
                handles.extend(leaf.alive_timer.take());
                handles.extend(leaf.refresh_timer.take());
                drained.extend(leaf.nodes.drain());
            }
        }
        for handle in handles {
            self.timers.cancel(handle);
        }
        for (node, _) in &drained {
            node.set_status(NodeStatus::Unknown);
        }

        self.subnets.clear();
        self.stats.good = 0;
        self.stats.stale = 0;
        self.stats.pending = 0;

        info!(nodes = drained.len(), buckets = self.stats.buckets, "routing table shut down");
        drained
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn lists(&self, leaf: BucketId) -> &NodeLists {
        match self.buckets[leaf.0].leaf() {
            Some(leaf) => &leaf.nodes,
            None => corrupted("expected a leaf bucket"),
        }
    }

    fn lists_mut(&mut self, leaf: BucketId) -> &mut NodeLists {
        match self.buckets[leaf.0].leaf_mut() {
            Some(leaf) => &mut leaf.nodes,
            None => corrupted("expected a leaf bucket"),
        }
    }

    fn locate(&self, id: &Kuid) -> Result<(BucketId, NodeStatus), RoutingError> {
        if self.shut_down {
            return Err(RoutingError::ShutDown);
        }
        let leaf = self.find_leaf(id);
        let status = self
            .lists(leaf)
            .status_of(id)
            .ok_or(RoutingError::NodeNotFound(*id))?;
        Ok((leaf, status))
    }

    fn list_push(&mut self, leaf: BucketId, node: KNodeRef, status: NodeStatus) {
        *self.subnets.entry(subnet_key(&node.addr().ip)).or_insert(0) += 1;
        self.stats.incr(status);
        self.lists_mut(leaf).push(node, status);
    }

    fn list_move(&mut self, leaf: BucketId, id: &Kuid, status: NodeStatus) {
        let Some(current) = self.lists(leaf).status_of(id) else {
            return;
        };
        self.lists_mut(leaf).move_to(id, status);
        self.stats.decr(current);
        self.stats.incr(status);
    }

    fn list_remove(&mut self, leaf: BucketId, id: &Kuid) -> Option<(KNodeRef, NodeStatus)> {
        let status = self.lists(leaf).status_of(id)?;
        let node = self.lists_mut(leaf).remove(id)?;
        let key = subnet_key(&node.addr().ip);
        if let Some(count) = self.subnets.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.subnets.remove(&key);
            }
        }
        self.stats.decr(status);
        Some((node, status))
    }

    pub(crate) fn remove_in(&mut self, leaf: BucketId, id: &Kuid) -> Option<KNodeRef> {
        let (node, status) = self.list_remove(leaf, id)?;
        debug!(kuid = %id, bucket = %leaf, %status, "removed node");
        if status == NodeStatus::Good {
            self.promote_pending(leaf);
        }
        Some(node)
    }

    /// Move `id` from `current` to `status`, evicting the least recently
    /// seen member of a full destination list.
    fn set_status_in(&mut self, leaf: BucketId, id: &Kuid, current: NodeStatus, status: NodeStatus) {
        if current == status {
            return;
        }

        let k = self.config.k;
        let victim = if self.lists(leaf).count(status) >= k {
            self.lists(leaf).least_recently_seen(status)
        } else {
            None
        };

        self.list_move(leaf, id, status);
        debug!(kuid = %id, bucket = %leaf, from = %current, to = %status, "status changed");

        if let Some(victim) = victim {
            let pending_room = self.lists(leaf).count(NodeStatus::Pending) < k;
            if status == NodeStatus::Good && pending_room {
                self.list_move(leaf, &victim, NodeStatus::Pending);
                debug!(kuid = %victim, bucket = %leaf, "evicted good node parked in pending");
            } else {
                self.list_remove(leaf, &victim);
                debug!(kuid = %victim, bucket = %leaf, list = %status, "evicted node");
            }
        }

        if current == NodeStatus::Good {
            self.promote_pending(leaf);
        }
    }

    /// Promote the most recently seen usable pending node if good has room.
    pub(crate) fn promote_pending(&mut self, leaf: BucketId) -> Option<Kuid> {
        let lists = self.lists(leaf);
        if lists.count(NodeStatus::Good) >= self.config.k {
            return None;
        }
        let candidate = lists.best_pending()?;
        self.list_move(leaf, &candidate, NodeStatus::Good);
        debug!(kuid = %candidate, bucket = %leaf, "promoted pending node");
        Some(candidate)
    }

    fn record_activity_in(&mut self, leaf: BucketId, id: &Kuid, now: Timestamp) -> NodeStatus {
        let Some(node) = self.lists(leaf).get(id).cloned() else {
            return NodeStatus::Unknown;
        };
        node.mark_seen(now);

        let k = self.config.k;
        let lists = self.lists(leaf);
        let good = lists.count(NodeStatus::Good);
        let stale = lists.count(NodeStatus::Stale);
        let pending = lists.count(NodeStatus::Pending);

        match node.status() {
            NodeStatus::Good => {
                self.list_move(leaf, id, NodeStatus::Good);
                NodeStatus::Good
            }
            NodeStatus::Stale if good + stale <= k => {
                self.set_status_in(leaf, id, NodeStatus::Stale, NodeStatus::Good);
                NodeStatus::Good
            }
            NodeStatus::Stale if pending < k => {
                self.set_status_in(leaf, id, NodeStatus::Stale, NodeStatus::Pending);
                NodeStatus::Pending
            }
            NodeStatus::Pending if good < k => {
                self.set_status_in(leaf, id, NodeStatus::Pending, NodeStatus::Good);
                NodeStatus::Good
            }
            NodeStatus::Pending => {
                self.list_move(leaf, id, NodeStatus::Pending);
                NodeStatus::Pending
            }
            other => other,
        }
    }

    /// Replace a leaf by two children partitioned on the next bit.
    pub(crate) fn split(&mut self, leaf: BucketId, now: Timestamp) {
        let (depth, prefix, ours, split_depth, last_lookup) = {
            let b = &self.buckets[leaf.0];
            (b.depth, b.prefix, b.ours, b.split_depth, b.last_lookup)
        };
        if depth >= KUID_BITS {
            corrupted("split beyond the identifier width");
        }

        let zero = BucketId(self.buckets.len());
        let one = BucketId(self.buckets.len() + 1);
        let old = std::mem::replace(
            &mut self.buckets[leaf.0].content,
            BucketContent::Internal { zero, one },
        );
        let BucketContent::Leaf(Leaf {
            mut nodes,
            alive_timer,
            refresh_timer,
        }) = old
        else {
            corrupted("split of an internal bucket");
        };
        for handle in [alive_timer, refresh_timer].into_iter().flatten() {
            self.timers.cancel(handle);
        }

        let child_depth = depth + 1;
        let local_bit = self.local_id.bit(depth);
        let child = |bit: bool| {
            let child_split_depth = if ours { child_depth } else { split_depth };
            Bucket::new_leaf(
                prefix.with_bit(depth, bit),
                child_depth,
                Some(leaf),
                ours && local_bit == bit,
                child_split_depth,
                last_lookup,
            )
        };
        self.buckets.push(child(false));
        self.buckets.push(child(true));

        let total = nodes.len();
        for (node, status) in nodes.drain() {
            let target = if node.id().bit(depth) { one } else { zero };
            self.lists_mut(target).push(node, status);
        }
        if self.lists(zero).len() + self.lists(one).len() != total {
            corrupted("split lost nodes during redistribution");
        }

        if ours {
            self.ours_leaf = if local_bit { one } else { zero };
        }
        self.stats.buckets += 2;
        self.stats.leaves += 1;
        self.stats.max_depth = self.stats.max_depth.max(child_depth);

        self.arm_timers(zero, now);
        self.arm_timers(one, now);

        info!(bucket = %leaf, depth, ours, nodes = total, "split bucket");
    }

    /// Arm both maintenance timers of a fresh leaf.
    fn arm_timers(&mut self, bucket: BucketId, now: Timestamp) {
        for kind in [TimerKind::Alive, TimerKind::Refresh] {
            self.rearm(bucket, kind, now);
        }
    }

    /// (Re)arm one timer of a leaf relative to `now`.
    pub(crate) fn rearm(&mut self, bucket: BucketId, kind: TimerKind, now: Timestamp) {
        let period = match kind {
            TimerKind::Alive => self.config.alive_period(),
            TimerKind::Refresh => self.refresh_period(bucket),
        };
        let Some(leaf) = self.buckets.get_mut(bucket.0).and_then(Bucket::leaf_mut) else {
            return;
        };
        let previous = leaf.timer_slot(kind).take();
        let handle = self
            .timers
            .schedule(now.add_secs(period), BucketTimer { bucket, kind });
        *leaf.timer_slot(kind) = Some(handle);
        if let Some(previous) = previous {
            self.timers.cancel(previous);
        }
    }

    /// Our leaf and its sibling refresh on the shorter period.
    pub(crate) fn refresh_period(&self, bucket: BucketId) -> u64 {
        let ours_parent = self.buckets[self.ours_leaf.0].parent;
        let closest = self
            .buckets
            .get(bucket.0)
            .is_some_and(|b| b.ours || (b.parent.is_some() && b.parent == ours_parent));
        if closest {
            self.config.our_refresh_period_secs
        } else {
            self.config.refresh_period_secs
        }
    }
}
