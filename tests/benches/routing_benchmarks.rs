//! # Routing Table Benchmarks

use criterion::{criterion_group, criterion_main};
use routing_tests::benchmarks::routing_table::{bench_find_closest, bench_insert, bench_xor_distance};

criterion_group!(benches, bench_xor_distance, bench_insert, bench_find_closest);

criterion_main!(benches);
