//! Tests for the routing trie

use std::sync::Arc;

use primitive_types::U256;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::domain::{
    InsertOutcome, IpAddr, KNode, KNodeRef, Kuid, NodeStatus, ProtocolVersion, RejectReason,
    RoutingConfig, RoutingError, SocketAddr, Timestamp, VendorCode, KUID_BITS, KUID_BYTES,
};

const T0: u64 = 1_000;

fn id_with(first: u8, second: u8) -> Kuid {
    let mut bytes = [0u8; KUID_BYTES];
    bytes[0] = first;
    bytes[1] = second;
    Kuid::new(bytes)
}

/// Node whose address sits in its own /24 (10.hi.lo.0/24).
fn node_at(id: Kuid, net: u16, seen: u64) -> KNodeRef {
    KNode::new(
        id,
        SocketAddr::new(IpAddr::v4(10, (net >> 8) as u8, net as u8, 1), 6346),
        VendorCode::new(*b"TEST"),
        ProtocolVersion::new(0, 1),
        Timestamp::new(seen),
    )
}

fn new_table(config: RoutingConfig) -> RoutingTable {
    RoutingTable::new(Kuid::ZERO, config, Timestamp::new(T0)).unwrap()
}

/// A table whose root can never split.
fn unsplitable_table() -> RoutingTable {
    new_table(RoutingConfig {
        max_depth_active: 0,
        max_depth_passive: 0,
        ..RoutingConfig::for_testing()
    })
}

fn good_order(table: &RoutingTable, leaf: BucketId) -> Vec<Kuid> {
    table
        .bucket(leaf)
        .and_then(|b| b.leaf())
        .map(|l| l.nodes().iter(NodeStatus::Good).map(|n| *n.id()).collect())
        .unwrap_or_default()
}

/// Fill the root of an unsplitable table with k good nodes, seen at
/// `T0 - 10 + i`, and return them.
fn fill_good(table: &mut RoutingTable) -> Vec<KNodeRef> {
    let k = table.config().k;
    (0..k)
        .map(|i| {
            let node = node_at(id_with(0x10 + i as u8, 0), i as u16, T0 - 10 + i as u64);
            assert!(table.insert(node.clone(), false, Timestamp::new(T0)).is_added());
            node
        })
        .collect()
}

fn fill_pending(table: &mut RoutingTable, count: usize) -> Vec<KNodeRef> {
    (0..count)
        .map(|i| {
            let seen = T0 + i as u64;
            let node = node_at(id_with(0x40 + i as u8, 0), 100 + i as u16, seen);
            assert_eq!(
                table.insert(node.clone(), true, Timestamp::new(seen)),
                InsertOutcome::Added(NodeStatus::Pending)
            );
            node
        })
        .collect()
}

// =============================================================================
// Test Group 1: Construction and lookup
// =============================================================================

#[test]
fn test_new_table_is_single_ours_leaf() {
    let table = new_table(RoutingConfig::for_testing());

    assert!(table.is_single_leaf());
    assert_eq!(table.ours_leaf(), BucketId::ROOT);
    assert_eq!(table.stats().buckets, 1);
    assert_eq!(table.find_leaf(&Kuid::MAX), BucketId::ROOT);
    assert!(table.check_integrity().is_ok());
}

#[test]
fn test_new_table_rejects_invalid_config() {
    let config = RoutingConfig {
        k: 0,
        ..RoutingConfig::for_testing()
    };
    let result = RoutingTable::new(Kuid::ZERO, config, Timestamp::new(T0));
    assert!(matches!(result, Err(RoutingError::InvalidConfig(_))));
}

#[test]
fn test_insert_rejects_self_firewalled_and_unusable() {
    let mut table = new_table(RoutingConfig::for_testing());
    let now = Timestamp::new(T0);

    let me = node_at(Kuid::ZERO, 1, T0);
    assert_eq!(
        table.insert(me, true, now),
        InsertOutcome::Rejected(RejectReason::SelfNode)
    );

    let firewalled = KNode::new_firewalled(
        id_with(0x80, 1),
        SocketAddr::new(IpAddr::v4(10, 0, 2, 1), 6346),
        VendorCode::default(),
        ProtocolVersion::default(),
        now,
    );
    assert_eq!(
        table.insert(firewalled, true, now),
        InsertOutcome::Rejected(RejectReason::Firewalled)
    );

    let loopback = KNode::new(
        id_with(0x80, 2),
        SocketAddr::new(IpAddr::v4(127, 0, 0, 1), 6346),
        VendorCode::default(),
        ProtocolVersion::default(),
        now,
    );
    assert_eq!(
        table.insert(loopback, true, now),
        InsertOutcome::Rejected(RejectReason::UnusableAddress)
    );
    assert_eq!(table.stats().nodes(), 0);
}

// =============================================================================
// Test Group 2: Splitting
// =============================================================================

#[test]
fn test_overflowing_ours_bucket_splits_exactly_once() {
    let mut table = new_table(RoutingConfig::for_testing());
    let now = Timestamp::new(T0);
    let ids = [
        id_with(0x10, 0),
        id_with(0x20, 0),
        id_with(0x80, 0),
        id_with(0x90, 0),
        id_with(0xA0, 0),
    ];

    for (i, id) in ids.iter().enumerate() {
        let outcome = table.insert(node_at(*id, i as u16, T0), false, now);
        assert_eq!(outcome, InsertOutcome::Added(NodeStatus::Good));
    }

    let stats = table.stats();
    assert_eq!(stats.buckets, 3);
    assert_eq!(stats.leaves, 2);
    assert_eq!(stats.good, 5);
    assert_eq!(stats.max_depth, 1);

    for id in &ids {
        let leaf = table.find_leaf(id);
        let bucket = table.bucket(leaf).unwrap();
        assert_eq!(bucket.depth(), 1);
        assert_eq!(bucket.prefix().bit(0), id.bit(0));
        assert_eq!(table.find_node(id).map(|n| n.status()), Some(NodeStatus::Good));
    }
    assert!(table.bucket(BucketId::ROOT).unwrap().children().is_some());
    assert!(table.bucket(table.ours_leaf()).unwrap().covers(&Kuid::ZERO));
    assert!(table.check_integrity().is_ok());
}

#[test]
fn test_split_moves_timers_to_children() {
    let mut table = new_table(RoutingConfig::for_testing());
    for i in 0..5u8 {
        let id = id_with(if i % 2 == 0 { 0x10 + i } else { 0x80 + i }, 0);
        table.insert(node_at(id, i as u16, T0), false, Timestamp::new(T0));
    }

    assert_eq!(table.timers.len(), 4);
    assert!(table.check_integrity().is_ok());
}

#[test]
fn test_far_subtree_stops_splitting() {
    let mut table = new_table(RoutingConfig::for_testing());
    let mut rng = StdRng::seed_from_u64(11);
    let now = Timestamp::new(T0);

    for i in 0..200u16 {
        let id = Kuid::random(&mut rng).with_bit(0, true);
        table.insert(node_at(id, i, T0), false, now);
    }

    let closest_splits = table.config().closest_subtree_splits;
    for leaf in table.leaves().collect::<Vec<_>>() {
        let bucket = table.bucket(leaf).unwrap();
        if bucket.prefix().bit(0) {
            assert!(bucket.depth() <= 1 + closest_splits);
        }
    }
    assert!(table.check_integrity().is_ok());
}

/// Far half ids (bit 0 set), spread evenly over both far quadrants.
fn far_ids() -> Vec<Kuid> {
    (0..40u8)
        .map(|i| id_with(0x80 | ((i % 2) << 6) | (i / 2), i))
        .collect()
}

/// Ids sharing our first three bits.
fn near_ids() -> Vec<Kuid> {
    (0..40u8).map(|i| id_with(1 + i % 0x1F, i)).collect()
}

fn far_shape(table: &RoutingTable, far: &[Kuid]) -> (usize, usize) {
    let leaves = table
        .leaves()
        .filter(|leaf| table.bucket(*leaf).map_or(false, |b| b.prefix().bit(0)))
        .count();
    let stored = far.iter().filter(|id| table.find_node(id).is_some()).count();
    (leaves, stored)
}

#[test]
fn test_split_shape_ignores_insertion_order() {
    let now = Timestamp::new(T0);
    let far = far_ids();
    let near = near_ids();
    let far_nodes: Vec<(Kuid, u16)> = far.iter().enumerate().map(|(i, id)| (*id, i as u16)).collect();
    let near_nodes: Vec<(Kuid, u16)> = near
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, 100 + i as u16))
        .collect();

    let mut far_first = new_table(RoutingConfig::for_testing());
    for (id, net) in far_nodes.iter().chain(near_nodes.iter()) {
        far_first.insert(node_at(*id, *net, T0), false, now);
    }

    let mut near_first = new_table(RoutingConfig::for_testing());
    for (id, net) in near_nodes.iter().chain(far_nodes.iter()) {
        near_first.insert(node_at(*id, *net, T0), false, now);
    }

    let k = far_first.config().k;
    assert_eq!(far_shape(&far_first, &far), (2, 2 * k));
    assert_eq!(far_shape(&near_first, &far), (2, 2 * k));
    assert_eq!(far_first.stats().leaves, near_first.stats().leaves);
    assert_eq!(far_first.stats().good, near_first.stats().good);
    assert!(far_first.check_integrity().is_ok());
    assert!(near_first.check_integrity().is_ok());
}

#[test]
fn test_full_unsplitable_leaf_parks_traffic_node_in_pending() {
    let mut table = unsplitable_table();
    let k = table.config().k;
    let now = Timestamp::new(T0);

    for i in 0..k {
        let node = node_at(id_with(0x80 + i as u8, 0), i as u16, T0);
        assert_eq!(
            table.insert(node, true, now),
            InsertOutcome::Added(NodeStatus::Good)
        );
    }

    let learned = node_at(id_with(0xF0, 0), 50, T0);
    assert_eq!(
        table.insert(learned, false, now),
        InsertOutcome::Rejected(RejectReason::BucketFull)
    );

    let extra = node_at(id_with(0xF1, 0), 51, T0);
    assert_eq!(
        table.insert(extra.clone(), true, now),
        InsertOutcome::Added(NodeStatus::Pending)
    );
    assert_eq!(extra.status(), NodeStatus::Pending);
    assert_eq!(table.stats().good, k);
    assert!(table.is_single_leaf());
}

// =============================================================================
// Test Group 3: Subnet guards
// =============================================================================

#[test]
fn test_bucket_subnet_limit() {
    let mut table = new_table(RoutingConfig::for_testing());
    let now = Timestamp::new(T0);
    let same_net = |id: Kuid, host: u8| {
        KNode::new(
            id,
            SocketAddr::new(IpAddr::v4(10, 9, 9, host), 6346),
            VendorCode::default(),
            ProtocolVersion::default(),
            now,
        )
    };

    assert!(table.insert(same_net(id_with(0x80, 1), 1), false, now).is_added());
    assert!(table.insert(same_net(id_with(0x80, 2), 2), false, now).is_added());
    assert_eq!(
        table.insert(same_net(id_with(0x80, 3), 3), false, now),
        InsertOutcome::Rejected(RejectReason::BucketSubnetLimit)
    );
}

#[test]
fn test_table_subnet_limit() {
    let mut table = new_table(RoutingConfig {
        max_in_net_per_bucket: 2,
        max_in_net_table: 3,
        ..RoutingConfig::for_testing()
    });
    let now = Timestamp::new(T0);
    for (i, first) in [0x10u8, 0x20, 0x80, 0x90, 0xA0].iter().enumerate() {
        table.insert(node_at(id_with(*first, 0), i as u16, T0), false, now);
    }
    assert_eq!(table.stats().leaves, 2);

    let same_net = |id: Kuid, host: u8| {
        KNode::new(
            id,
            SocketAddr::new(IpAddr::v4(10, 200, 200, host), 6346),
            VendorCode::default(),
            ProtocolVersion::default(),
            now,
        )
    };
    assert!(table.insert(same_net(id_with(0x30, 1), 1), false, now).is_added());
    assert!(table.insert(same_net(id_with(0x31, 1), 2), false, now).is_added());
    assert!(table.insert(same_net(id_with(0xB0, 1), 3), false, now).is_added());
    assert_eq!(
        table.insert(same_net(id_with(0xB1, 1), 4), false, now),
        InsertOutcome::Rejected(RejectReason::TableSubnetLimit)
    );
    assert!(table.check_integrity().is_ok());
}

// =============================================================================
// Test Group 4: Status transitions
// =============================================================================

#[test]
fn test_demoting_good_node_promotes_pending() {
    let mut table = unsplitable_table();
    let k = table.config().k;
    let goods = fill_good(&mut table);
    let pending = fill_pending(&mut table, 1);
    let victim = goods[0].id();

    for _ in 0..k {
        table.set_status(victim, NodeStatus::Stale).unwrap();
    }

    assert_eq!(goods[0].status(), NodeStatus::Stale);
    assert_eq!(pending[0].status(), NodeStatus::Good);
    let stats = table.stats();
    assert_eq!((stats.good, stats.stale, stats.pending), (k, 1, 0));
    assert!(table.check_integrity().is_ok());
}

#[test]
fn test_full_good_list_parks_least_recent_in_pending() {
    let mut table = unsplitable_table();
    let k = table.config().k;
    let goods = fill_good(&mut table);
    let pending = fill_pending(&mut table, k);

    table.set_status(pending[2].id(), NodeStatus::Good).unwrap();

    assert_eq!(pending[2].status(), NodeStatus::Good);
    assert_eq!(goods[0].status(), NodeStatus::Pending);
    let stats = table.stats();
    assert_eq!((stats.good, stats.pending), (k, k));
    assert!(table.check_integrity().is_ok());
}

#[test]
fn test_full_stale_list_evicts_oldest() {
    let mut table = unsplitable_table();
    let k = table.config().k;
    let goods = fill_good(&mut table);
    let pending = fill_pending(&mut table, k);

    for node in &goods {
        table.set_status(node.id(), NodeStatus::Stale).unwrap();
    }
    assert_eq!(table.stats().stale, k);

    table.set_status(pending[0].id(), NodeStatus::Stale).unwrap();

    assert_eq!(goods[0].status(), NodeStatus::Unknown);
    assert!(table.find_node(goods[0].id()).is_none());
    assert_eq!(pending[0].status(), NodeStatus::Stale);
    assert_eq!(table.stats().stale, k);
    assert!(table.check_integrity().is_ok());
}

#[test]
fn test_record_activity_moves_good_to_tail_and_is_idempotent() {
    let mut table = unsplitable_table();
    let goods = fill_good(&mut table);
    let now = Timestamp::new(T0 + 5);

    table.record_activity(goods[1].id(), now).unwrap();
    let after_first = good_order(&table, BucketId::ROOT);
    table.record_activity(goods[1].id(), now).unwrap();
    let after_second = good_order(&table, BucketId::ROOT);

    assert_eq!(after_first.last(), Some(goods[1].id()));
    assert_eq!(after_first, after_second);
    assert_eq!(goods[1].status(), NodeStatus::Good);
}

#[test]
fn test_record_activity_promotes_stale_when_room() {
    let mut table = unsplitable_table();
    let goods = fill_good(&mut table);
    table.set_status(goods[0].id(), NodeStatus::Stale).unwrap();

    let status = table
        .record_activity(goods[0].id(), Timestamp::new(T0 + 1))
        .unwrap();

    assert_eq!(status, NodeStatus::Good);
    assert_eq!(goods[0].rpc_timeouts(), 0);
}

#[test]
fn test_record_activity_unknown_node() {
    let mut table = unsplitable_table();
    let result = table.record_activity(&id_with(0x99, 9), Timestamp::new(T0));
    assert!(matches!(result, Err(RoutingError::NodeNotFound(_))));
}

#[test]
fn test_rpc_timeouts_demote_then_drop() {
    let mut table = unsplitable_table();
    let goods = fill_good(&mut table);
    let id = goods[0].id();

    assert_eq!(table.rpc_timeout(id).unwrap(), NodeStatus::Stale);
    assert_eq!(table.rpc_timeout(id).unwrap(), NodeStatus::Stale);
    assert_eq!(table.rpc_timeout(id).unwrap(), NodeStatus::Unknown);
    assert!(table.find_node(id).is_none());
    assert!(table.check_integrity().is_ok());
}

#[test]
fn test_pending_timeout_drops_node() {
    let mut table = unsplitable_table();
    fill_good(&mut table);
    let pending = fill_pending(&mut table, 1);

    assert_eq!(table.rpc_timeout(pending[0].id()).unwrap(), NodeStatus::Unknown);
    assert_eq!(table.stats().pending, 0);
}

#[test]
fn test_remove_good_promotes_pending() {
    let mut table = unsplitable_table();
    let goods = fill_good(&mut table);
    let pending = fill_pending(&mut table, 2);

    let removed = table.remove(goods[3].id());

    assert!(removed.is_some_and(|n| Arc::ptr_eq(&n, &goods[3])));
    assert_eq!(goods[3].status(), NodeStatus::Unknown);
    assert_eq!(pending[1].status(), NodeStatus::Good);
    assert_eq!(pending[0].status(), NodeStatus::Pending);
}

#[test]
fn test_shutting_down_parks_node_and_hides_it() {
    let mut table = unsplitable_table();
    let goods = fill_good(&mut table);
    let pending = fill_pending(&mut table, 1);

    let status = table.shutting_down(goods[0].id()).unwrap();

    assert_eq!(status, NodeStatus::Pending);
    assert!(goods[0].is_shutting_down());
    assert_eq!(pending[0].status(), NodeStatus::Good);
    let closest = table.find_closest(goods[0].id(), 10);
    assert!(closest.iter().all(|n| n.id() != goods[0].id()));

    table
        .record_activity(goods[0].id(), Timestamp::new(T0 + 20))
        .unwrap();
    assert!(!goods[0].is_shutting_down());
}

#[test]
fn test_collision_and_duplicate_detection() {
    let mut table = new_table(RoutingConfig::for_testing());
    let now = Timestamp::new(T0);
    let original = node_at(id_with(0x80, 1), 1, T0);
    table.insert(original.clone(), false, now);

    let same_addr = node_at(id_with(0x80, 1), 1, T0);
    assert_eq!(table.insert(same_addr, true, now), InsertOutcome::AlreadyPresent);

    let moved = node_at(id_with(0x80, 1), 2, T0);
    assert_eq!(
        table.insert(moved, true, now),
        InsertOutcome::Rejected(RejectReason::Collision)
    );

    let found = table.find_node(original.id()).unwrap();
    assert!(Arc::ptr_eq(&found, &original));
}

// =============================================================================
// Test Group 5: Closest-node query
// =============================================================================

#[test]
fn test_find_closest_matches_brute_force() {
    let mut table = new_table(RoutingConfig::default());
    let mut rng = StdRng::seed_from_u64(3);
    let now = Timestamp::new(T0);
    for i in 0..300u16 {
        table.insert(node_at(Kuid::random(&mut rng), i, T0), i % 2 == 0, now);
    }
    let target = Kuid::random(&mut rng);

    let mut all: Vec<Kuid> = table
        .leaves()
        .filter_map(|leaf| table.bucket(leaf).and_then(|b| b.leaf()))
        .flat_map(|leaf| leaf.nodes().iter(NodeStatus::Good).map(|n| *n.id()))
        .collect();
    all.sort_by_key(|id| id.xor(&target));
    all.truncate(12);

    let closest: Vec<Kuid> = table.find_closest(&target, 12).iter().map(|n| *n.id()).collect();
    assert_eq!(closest, all);
}

// =============================================================================
// Test Group 6: Maintenance
// =============================================================================

#[test]
fn test_timers_fire_and_rearm() {
    let mut table = new_table(RoutingConfig::for_testing());
    let alive = table.config().alive_period_secs;
    let our_refresh = table.config().our_refresh_period_secs;

    assert!(table.take_due_timers(Timestamp::new(T0 + alive - 1)).is_empty());

    let due = table.take_due_timers(Timestamp::new(T0 + alive));
    assert_eq!(
        due,
        vec![BucketTimer {
            bucket: BucketId::ROOT,
            kind: TimerKind::Alive
        }]
    );
    assert!(table.check_integrity().is_ok());

    let due = table.take_due_timers(Timestamp::new(T0 + our_refresh));
    assert!(due.contains(&BucketTimer {
        bucket: BucketId::ROOT,
        kind: TimerKind::Refresh
    }));
    assert_eq!(table.next_deadline(), Some(Timestamp::new(T0 + 2 * alive)));
}

#[test]
fn test_alive_check_pings_old_and_drops_expired() {
    let mut table = unsplitable_table();
    let now = Timestamp::new(T0);
    let fresh = node_at(id_with(0x10, 0), 1, T0);
    let quiet = node_at(id_with(0x20, 0), 2, T0 - 100);
    let ancient = node_at(id_with(0x30, 0), 3, 100);
    let recent_stale = node_at(id_with(0x40, 0), 4, T0 - 50);
    for node in [&fresh, &quiet, &ancient, &recent_stale] {
        table.insert(node.clone(), false, now);
    }
    table.set_status(ancient.id(), NodeStatus::Stale).unwrap();
    table.set_status(recent_stale.id(), NodeStatus::Stale).unwrap();

    let check = table.alive_check(BucketId::ROOT, now).unwrap();

    let mut pinged: Vec<Kuid> = check.ping.iter().map(|n| *n.id()).collect();
    pinged.sort();
    assert_eq!(pinged, vec![*quiet.id(), *recent_stale.id()]);
    assert_eq!(check.expired.len(), 1);
    assert!(Arc::ptr_eq(&check.expired[0], &ancient));
    assert!(!check.force_refresh);
    assert!(table.find_node(ancient.id()).is_none());
}

#[test]
fn test_alive_check_respects_backoff_and_forces_refresh() {
    let mut table = unsplitable_table();
    let now = Timestamp::new(T0);
    let stale = node_at(id_with(0x10, 0), 1, T0 - 10);
    table.insert(stale.clone(), false, now);
    table.rpc_timeout(stale.id()).unwrap();
    stale.mark_rpc_sent(now);

    let check = table.alive_check(BucketId::ROOT, now.add_secs(1)).unwrap();
    assert!(check.ping.is_empty());
    assert!(check.force_refresh);

    let check = table.alive_check(BucketId::ROOT, now.add_secs(2)).unwrap();
    assert_eq!(check.ping.len(), 1);
}

#[test]
fn test_refresh_target_policy() {
    let mut table = new_table(RoutingConfig::for_testing());
    let mut rng = StdRng::seed_from_u64(5);
    let now = Timestamp::new(T0);

    assert!(table.refresh_target(BucketId::ROOT, false, now, &mut rng).is_some());
    assert!(table.refresh_target(BucketId::ROOT, false, now, &mut rng).is_none());
    assert!(table.refresh_target(BucketId::ROOT, true, now, &mut rng).is_some());

    for (i, first) in [0x10u8, 0x20, 0x80, 0x90, 0xA0].iter().enumerate() {
        table.insert(node_at(id_with(*first, 0), i as u16, T0), false, now);
    }
    let far = table.find_leaf(&id_with(0x80, 0));
    let later = now.add_secs(table.config().refresh_period_secs);
    let target = table.refresh_target(far, false, later, &mut rng).unwrap();
    assert!(target.bit(0));
}

#[test]
fn test_full_unsplitable_leaf_skips_refresh() {
    let mut table = unsplitable_table();
    fill_good(&mut table);
    let mut rng = StdRng::seed_from_u64(5);

    let target = table.refresh_target(BucketId::ROOT, false, Timestamp::new(T0), &mut rng);
    assert!(target.is_none());
}

// =============================================================================
// Test Group 7: Teardown
// =============================================================================

#[test]
fn test_shutdown_cancels_timers_and_unregisters_nodes() {
    let mut table = new_table(RoutingConfig::for_testing());
    let now = Timestamp::new(T0);
    let nodes: Vec<KNodeRef> = [0x10u8, 0x20, 0x80, 0x90, 0xA0]
        .iter()
        .enumerate()
        .map(|(i, first)| node_at(id_with(*first, 0), i as u16, T0))
        .collect();
    for node in &nodes {
        table.insert(node.clone(), false, now);
    }

    let drained = table.shutdown();

    assert_eq!(drained.len(), nodes.len());
    assert!(drained.iter().all(|(_, status)| *status == NodeStatus::Good));
    assert!(nodes.iter().all(|n| n.status() == NodeStatus::Unknown));
    assert!(table.timers.is_empty());
    assert!(table.shutdown().is_empty());
    assert_eq!(
        table.insert(node_at(id_with(0x11, 0), 40, T0), true, now),
        InsertOutcome::Rejected(RejectReason::ShutDown)
    );
    assert!(matches!(
        table.record_activity(nodes[0].id(), now),
        Err(RoutingError::ShutDown)
    ));
    assert!(table.check_integrity().is_ok());
}

// =============================================================================
// Test Group 8: Properties
// =============================================================================

fn leaf_space(table: &RoutingTable) -> U256 {
    table
        .leaves()
        .filter_map(|leaf| table.bucket(leaf))
        .fold(U256::zero(), |acc, b| acc + (U256::one() << (KUID_BITS - b.depth())))
}

proptest! {
    #[test]
    fn prop_table_invariants_hold(
        ops in prop::collection::vec((any::<[u8; KUID_BYTES]>(), any::<bool>()), 1..160)
    ) {
        let mut table = RoutingTable::new(
            Kuid::new([0x5A; KUID_BYTES]),
            RoutingConfig::default(),
            Timestamp::new(T0),
        ).unwrap();
        let mut max_depth = 0;

        for (i, (bytes, from_traffic)) in ops.iter().enumerate() {
            let node = node_at(Kuid::new(*bytes), i as u16, T0);
            table.insert(node, *from_traffic, Timestamp::new(T0 + i as u64));

            let depth = table.stats().max_depth;
            prop_assert!(depth >= max_depth);
            max_depth = depth;
        }

        prop_assert!(table.check_integrity().is_ok());
        prop_assert_eq!(leaf_space(&table), U256::one() << KUID_BITS);

        let k = table.config().k;
        for leaf in table.leaves() {
            let nodes = table.bucket(leaf).and_then(|b| b.leaf()).map(|l| l.nodes()).unwrap();
            for status in NodeStatus::LISTED {
                prop_assert!(nodes.count(status) <= k);
            }
        }
    }

    #[test]
    fn prop_split_partitions_by_leading_bits(
        ids in prop::collection::hash_set(any::<[u8; KUID_BYTES]>(), 1..80)
    ) {
        let mut table = RoutingTable::new(Kuid::ZERO, RoutingConfig::default(), Timestamp::new(T0)).unwrap();
        let mut stored = Vec::new();
        for (i, bytes) in ids.iter().enumerate() {
            let node = node_at(Kuid::new(*bytes), i as u16, T0);
            if table.insert(node.clone(), true, Timestamp::new(T0)).is_added() {
                stored.push(node);
            }
        }

        for node in &stored {
            let leaf = table.find_leaf(node.id());
            let bucket = table.bucket(leaf).unwrap();
            prop_assert!(bucket.covers(node.id()));
            prop_assert!(bucket.leaf().unwrap().nodes().contains(node.id()));
        }
    }
}
