//! Buckets of the routing trie.
//!
//! Buckets live in an arena owned by the table and refer to each other by
//! [`BucketId`]. A bucket is either a leaf holding node lists and timers or
//! an internal node with exactly two children; the enum makes any other
//! shape unrepresentable.

use std::fmt;

use super::lists::NodeLists;
use crate::domain::{match_leading, Kuid, Timestamp, TimerHandle};

/// Index of a bucket in the table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketId(pub(crate) usize);

impl BucketId {
    /// The root bucket covering the whole identifier space.
    pub const ROOT: BucketId = BucketId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which periodic timer of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Alive,
    Refresh,
}

/// Payload of a bucket timer in the callout queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketTimer {
    pub bucket: BucketId,
    pub kind: TimerKind,
}

/// Leaf state: the classified nodes and the two maintenance timers.
#[derive(Debug, Default)]
pub struct Leaf {
    pub(crate) nodes: NodeLists,
    pub(crate) alive_timer: Option<TimerHandle>,
    pub(crate) refresh_timer: Option<TimerHandle>,
}

impl Leaf {
    pub fn nodes(&self) -> &NodeLists {
        &self.nodes
    }

    pub(crate) fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::Alive => &mut self.alive_timer,
            TimerKind::Refresh => &mut self.refresh_timer,
        }
    }
}

#[derive(Debug)]
pub enum BucketContent {
    Leaf(Leaf),
    Internal { zero: BucketId, one: BucketId },
}

/// One node of the trie.
#[derive(Debug)]
pub struct Bucket {
    /// Only the leading `depth` bits are meaningful.
    pub(crate) prefix: Kuid,
    pub(crate) depth: usize,
    pub(crate) parent: Option<BucketId>,
    /// The local identifier falls under this bucket.
    pub(crate) ours: bool,
    /// Depth at which this bucket's ancestry left the subtree holding the
    /// local identifier. Equal to `depth` for buckets on the local path.
    pub(crate) split_depth: usize,
    pub(crate) last_lookup: Option<Timestamp>,
    pub(crate) content: BucketContent,
}

impl Bucket {
    pub(crate) fn new_leaf(
        prefix: Kuid,
        depth: usize,
        parent: Option<BucketId>,
        ours: bool,
        split_depth: usize,
        last_lookup: Option<Timestamp>,
    ) -> Self {
        Self {
            prefix: prefix.masked(depth),
            depth,
            parent,
            ours,
            split_depth,
            last_lookup,
            content: BucketContent::Leaf(Leaf::default()),
        }
    }

    pub fn prefix(&self) -> &Kuid {
        &self.prefix
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<BucketId> {
        self.parent
    }

    pub fn is_ours(&self) -> bool {
        self.ours
    }

    pub fn split_depth(&self) -> usize {
        self.split_depth
    }

    pub fn last_lookup(&self) -> Option<Timestamp> {
        self.last_lookup
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, BucketContent::Leaf(_))
    }

    pub fn leaf(&self) -> Option<&Leaf> {
        match &self.content {
            BucketContent::Leaf(leaf) => Some(leaf),
            BucketContent::Internal { .. } => None,
        }
    }

    pub(crate) fn leaf_mut(&mut self) -> Option<&mut Leaf> {
        match &mut self.content {
            BucketContent::Leaf(leaf) => Some(leaf),
            BucketContent::Internal { .. } => None,
        }
    }

    /// Children as `(zero, one)` when internal.
    pub fn children(&self) -> Option<(BucketId, BucketId)> {
        match self.content {
            BucketContent::Internal { zero, one } => Some((zero, one)),
            BucketContent::Leaf(_) => None,
        }
    }

    /// Whether `id` falls under this bucket's prefix.
    pub fn covers(&self, id: &Kuid) -> bool {
        match_leading(&self.prefix, id, self.depth)
    }
}
