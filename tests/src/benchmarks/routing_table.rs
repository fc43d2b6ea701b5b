//! # Routing Trie Benchmarks
//!
//! Conditions:
//! - Tables filled from a uniformly random population
//! - Adversarial population clustered next to the local KUID (deep splits)
//! - Closest-node queries against a full table

use std::time::Duration;

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

use kad_routing_table::{
    distance, IpAddr, KNode, KNodeRef, Kuid, ProtocolVersion, RoutingConfig, RoutingTable,
    SocketAddr, Timestamp, VendorCode,
};

const NOW: Timestamp = Timestamp::new(1_700_000_000);

fn make_node(id: Kuid, i: usize) -> KNodeRef {
    KNode::new(
        id,
        SocketAddr::new(IpAddr::v4(10, (i >> 8) as u8, (i & 0xff) as u8, 1), 6346),
        VendorCode::new(*b"BNCH"),
        ProtocolVersion::new(0, 1),
        NOW,
    )
}

fn random_nodes(count: usize, rng: &mut StdRng) -> Vec<KNodeRef> {
    (0..count).map(|i| make_node(Kuid::random(rng), i)).collect()
}

/// Nodes sharing at least `shared_bits` leading bits with `local`.
fn clustered_nodes(
    local: &Kuid,
    count: usize,
    shared_bits: usize,
    rng: &mut StdRng,
) -> Vec<KNodeRef> {
    (0..count)
        .map(|i| make_node(Kuid::random_in_prefix(local, shared_bits, rng), i))
        .collect()
}

fn filled_table(local: Kuid, nodes: &[KNodeRef]) -> RoutingTable {
    let mut table =
        RoutingTable::new(local, RoutingConfig::default(), NOW).expect("default config is valid");
    for node in nodes {
        table.insert(node.clone(), true, NOW);
    }
    table
}

pub fn bench_xor_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing/xor_distance");

    group.bench_function("distance_160bit", |b| {
        let a = Kuid::new([0xAB; 20]);
        let other = Kuid::new([0xCD; 20]);
        b.iter(|| black_box(distance(&a, &other)))
    });

    group.finish();
}

pub fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing/insert");
    group.measurement_time(Duration::from_secs(10));
    let mut rng = StdRng::seed_from_u64(1);
    let local = Kuid::random(&mut rng);

    for size in [100usize, 1_000, 5_000] {
        let nodes = random_nodes(size, &mut rng);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("uniform", size), &nodes, |b, nodes| {
            b.iter(|| black_box(filled_table(local, nodes).stats()))
        });
    }

    let clustered = clustered_nodes(&local, 1_000, 12, &mut rng);
    group.bench_function("clustered_1000", |b| {
        b.iter(|| black_box(filled_table(local, &clustered).stats()))
    });

    group.finish();
}

pub fn bench_find_closest(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing/find_closest");
    let mut rng = StdRng::seed_from_u64(2);
    let local = Kuid::random(&mut rng);
    let table = filled_table(local, &random_nodes(5_000, &mut rng));

    group.bench_function("k20_random_target", |b| {
        let target = Kuid::random(&mut rng);
        b.iter(|| black_box(table.find_closest(&target, 20)))
    });

    group.bench_function("k20_local_target", |b| {
        b.iter(|| black_box(table.find_closest(&local, 20)))
    });

    group.finish();
}
