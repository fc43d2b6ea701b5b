//! Classified membership of one leaf bucket.
//!
//! A single map owns every member together with its status. The good, stale
//! and pending "lists" are ordered views over that map, so a node can never
//! sit in two lists and the index can never disagree with the lists.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{subnet_key, IpAddr, KNodeRef, Kuid, NodeStatus, Timestamp};

#[derive(Debug, Clone)]
struct Member {
    node: KNodeRef,
    status: NodeStatus,
    seq: u64,
}

/// Good, stale and pending lists of a leaf.
///
/// Within each list members are ordered by insertion into that list; the
/// tail is the most recently seen end.
#[derive(Debug, Default)]
pub struct NodeLists {
    members: HashMap<Kuid, Member>,
    order: BTreeMap<(NodeStatus, u64), Kuid>,
    next_seq: u64,
}

impl NodeLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of members across the three lists.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of members in one list.
    pub fn count(&self, status: NodeStatus) -> usize {
        self.order.range(Self::bounds(status)).count()
    }

    pub fn contains(&self, id: &Kuid) -> bool {
        self.members.contains_key(id)
    }

    pub fn get(&self, id: &Kuid) -> Option<&KNodeRef> {
        self.members.get(id).map(|m| &m.node)
    }

    pub fn status_of(&self, id: &Kuid) -> Option<NodeStatus> {
        self.members.get(id).map(|m| m.status)
    }

    /// Members of one list, least recently seen first.
    pub fn iter(&self, status: NodeStatus) -> impl Iterator<Item = &KNodeRef> + '_ {
        self.order
            .range(Self::bounds(status))
            .filter_map(|(_, id)| self.members.get(id).map(|m| &m.node))
    }

    /// Every member with its status, list by list.
    pub fn iter_all(&self) -> impl Iterator<Item = (&KNodeRef, NodeStatus)> + '_ {
        self.order
            .iter()
            .filter_map(|(_, id)| self.members.get(id).map(|m| (&m.node, m.status)))
    }

    /// Members of the subnet containing `ip`.
    pub fn subnet_count(&self, ip: &IpAddr) -> usize {
        let key = subnet_key(ip);
        self.members
            .values()
            .filter(|m| subnet_key(&m.node.addr().ip) == key)
            .count()
    }

    /// Append a node at the tail of a list and stamp its status.
    ///
    /// The caller guarantees the node is not yet a member.
    pub fn push(&mut self, node: KNodeRef, status: NodeStatus) {
        debug_assert!(status.is_listed());
        debug_assert!(!self.members.contains_key(node.id()));
        let seq = self.bump();
        let id = *node.id();
        node.set_status(status);
        self.order.insert((status, seq), id);
        self.members.insert(id, Member { node, status, seq });
    }

    /// Move a member to the tail of `status`'s list (which may be its own).
    pub fn move_to(&mut self, id: &Kuid, status: NodeStatus) -> bool {
        let seq = self.bump();
        let Some(member) = self.members.get_mut(id) else {
            return false;
        };
        self.order.remove(&(member.status, member.seq));
        member.status = status;
        member.seq = seq;
        member.node.set_status(status);
        self.order.insert((status, seq), *id);
        true
    }

    /// Remove a member and clear its status.
    pub fn remove(&mut self, id: &Kuid) -> Option<KNodeRef> {
        let member = self.members.remove(id)?;
        self.order.remove(&(member.status, member.seq));
        member.node.set_status(NodeStatus::Unknown);
        Some(member.node)
    }

    /// Take every member out, preserving per-list order. Statuses are left
    /// untouched so the nodes can be re-pushed elsewhere.
    pub fn drain(&mut self) -> Vec<(KNodeRef, NodeStatus)> {
        let order = std::mem::take(&mut self.order);
        let mut members = std::mem::take(&mut self.members);
        order
            .into_values()
            .filter_map(|id| members.remove(&id).map(|m| (m.node, m.status)))
            .collect()
    }

    /// Member of `status` with the oldest last-seen time (ties: earliest in list).
    pub fn least_recently_seen(&self, status: NodeStatus) -> Option<Kuid> {
        self.order
            .range(Self::bounds(status))
            .filter_map(|((_, seq), id)| self.members.get(id).map(|m| (m.node.last_seen(), *seq, *id)))
            .min_by_key(|(seen, seq, _)| (*seen, *seq))
            .map(|(_, _, id)| id)
    }

    /// Pending member with the newest last-seen time that is not shutting down.
    pub fn best_pending(&self) -> Option<Kuid> {
        self.order
            .range(Self::bounds(NodeStatus::Pending))
            .filter_map(|((_, seq), id)| self.members.get(id).map(|m| (m, *seq, *id)))
            .filter(|(m, _, _)| !m.node.is_shutting_down())
            .max_by_key(|(m, seq, _)| (m.node.last_seen(), *seq))
            .map(|(_, _, id)| id)
    }

    /// Stale members not heard from since before `cutoff`.
    pub fn stale_older_than(&self, cutoff: Timestamp) -> Vec<Kuid> {
        self.iter(NodeStatus::Stale)
            .filter(|n| n.last_seen() < cutoff)
            .map(|n| *n.id())
            .collect()
    }

    /// Check the lists against the member index and the capacity bound.
    pub fn check(&self, k: usize) -> Result<(), String> {
        if self.order.len() != self.members.len() {
            return Err(format!(
                "list entries {} disagree with index size {}",
                self.order.len(),
                self.members.len()
            ));
        }
        for ((status, seq), id) in &self.order {
            let member = self
                .members
                .get(id)
                .ok_or_else(|| format!("{} listed but not indexed", id))?;
            if member.status != *status || member.seq != *seq {
                return Err(format!("{} listed under a stale position", id));
            }
            if member.node.status() != *status {
                return Err(format!(
                    "{} is {} but the record says {}",
                    id,
                    status,
                    member.node.status()
                ));
            }
        }
        for status in NodeStatus::LISTED {
            let count = self.count(status);
            if count > k {
                return Err(format!("{} list holds {} > {}", status, count, k));
            }
        }
        Ok(())
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn bounds(status: NodeStatus) -> std::ops::RangeInclusive<(NodeStatus, u64)> {
        (status, 0)..=(status, u64::MAX)
    }
}
