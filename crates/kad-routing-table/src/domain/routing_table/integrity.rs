//! Full-tree structural check.

use std::collections::HashMap;

use super::bucket::{BucketContent, BucketId};
use super::stats::TableStats;
use super::table::RoutingTable;
use crate::domain::{match_leading, subnet_key, IntegrityError, KUID_BITS};

impl RoutingTable {
    /// Verify every structural invariant of the trie.
    ///
    /// Checks parent/child links and prefixes, the single "ours" leaf, that
    /// every node sits in the leaf covering its KUID, list capacities, the
    /// armed timers and every derived counter.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let k = self.config().k;
        let mut counted = TableStats::default();
        let mut subnets: HashMap<_, usize> = HashMap::new();
        let mut ours_leaves = Vec::new();
        let mut stack = vec![BucketId::ROOT];

        while let Some(id) = stack.pop() {
            let bucket = self.bucket(id).ok_or(IntegrityError::Bucket {
                bucket: id.index(),
                depth: 0,
                reason: "dangling bucket index".into(),
            })?;
            let fail = |reason: String| IntegrityError::Bucket {
                bucket: id.index(),
                depth: bucket.depth(),
                reason,
            };

            counted.buckets += 1;
            if counted.buckets > self.buckets.len() {
                return Err(fail("cycle in the trie".into()));
            }
            if bucket.depth() > KUID_BITS {
                return Err(fail("deeper than the identifier width".into()));
            }
            if bucket.is_ours() != bucket.covers(self.local_id()) {
                return Err(fail("ours flag disagrees with prefix".into()));
            }
            if let Some(parent_id) = bucket.parent() {
                let parent = self
                    .bucket(parent_id)
                    .ok_or_else(|| fail("dangling parent".into()))?;
                let linked = parent
                    .children()
                    .is_some_and(|(zero, one)| zero == id || one == id);
                if !linked || parent.depth() + 1 != bucket.depth() {
                    return Err(fail("parent link broken".into()));
                }
                if !match_leading(parent.prefix(), bucket.prefix(), parent.depth()) {
                    return Err(fail("prefix does not extend parent".into()));
                }
            } else if id != BucketId::ROOT {
                return Err(fail("non-root bucket without parent".into()));
            }

            match &bucket.content {
                BucketContent::Internal { zero, one } => {
                    for (child, bit) in [(*zero, false), (*one, true)] {
                        let ok = self.bucket(child).is_some_and(|c| {
                            c.parent() == Some(id) && c.prefix().bit(bucket.depth()) == bit
                        });
                        if !ok {
                            return Err(fail(format!("child {} is inconsistent", child)));
                        }
                        stack.push(child);
                    }
                }
                BucketContent::Leaf(leaf) => {
                    counted.leaves += 1;
                    counted.max_depth = counted.max_depth.max(bucket.depth());
                    if bucket.is_ours() {
                        ours_leaves.push(id);
                    }

                    leaf.nodes().check(k).map_err(|reason| fail(reason))?;
                    for (node, status) in leaf.nodes().iter_all() {
                        if !bucket.covers(node.id()) {
                            return Err(IntegrityError::Node {
                                kuid: *node.id(),
                                reason: format!("stored in bucket {} which does not cover it", id),
                            });
                        }
                        counted.incr(status);
                        *subnets.entry(subnet_key(&node.addr().ip)).or_insert(0) += 1;
                    }

                    if !self.shut_down {
                        let armed = [&leaf.alive_timer, &leaf.refresh_timer]
                            .iter()
                            .all(|t| t.as_ref().is_some_and(|h| self.timers.is_armed(h.id())));
                        if !armed {
                            return Err(fail("leaf timers not armed".into()));
                        }
                    }
                }
            }
        }

        if ours_leaves != [self.ours_leaf()] {
            return Err(IntegrityError::Counter {
                name: "ours_leaves",
                actual: ours_leaves.len(),
                expected: 1,
            });
        }

        let expected = self.stats();
        let pairs = [
            ("buckets", counted.buckets, self.buckets.len()),
            ("buckets", counted.buckets, expected.buckets),
            ("leaves", counted.leaves, expected.leaves),
            ("good", counted.good, expected.good),
            ("stale", counted.stale, expected.stale),
            ("pending", counted.pending, expected.pending),
            ("max_depth", counted.max_depth, expected.max_depth),
            ("subnets", subnets.len(), self.subnets.len()),
        ];
        for (name, actual, expected) in pairs {
            if actual != expected {
                return Err(IntegrityError::Counter {
                    name,
                    actual,
                    expected,
                });
            }
        }

        for (key, count) in &subnets {
            let tracked = self.subnets.get(key).copied().unwrap_or(0);
            if tracked != *count {
                return Err(IntegrityError::Counter {
                    name: "subnet",
                    actual: tracked,
                    expected: *count,
                });
            }
            if *count > self.config().max_in_net_table {
                return Err(IntegrityError::Counter {
                    name: "subnet_limit",
                    actual: *count,
                    expected: self.config().max_in_net_table,
                });
            }
        }

        Ok(())
    }
}
