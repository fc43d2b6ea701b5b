//! Actor flows over the simulated network.

use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use kad_routing_table::adapters::{snapshot_from_json, snapshot_to_json, SNAPSHOT_VERSION};
use kad_routing_table::test_utils::ControllableTimeSource;
use kad_routing_table::{
    spawn, BootStatus, KNodeRef, Kuid, LookupError, LookupMode, LookupPort, NodeStatus,
    NoopObserver, RoutingConfig, RoutingService, RoutingStats, RoutingTableHandle,
};
use tokio::task::JoinHandle;

use super::sim::{SimLookups, SimNetwork, SimRpc};

/// Lookups that are always cancelled.
struct CancelledLookups;

#[async_trait]
impl LookupPort for CancelledLookups {
    async fn lookup(&self, _target: Kuid, _mode: LookupMode) -> Result<Vec<KNodeRef>, LookupError> {
        Err(LookupError::Cancelled)
    }
}

const T0: u64 = 1_700_000_000;
const POPULATION: usize = 500;

static INIT: Once = Once::new();

/// One-time tracing initialization; set RUST_LOG for more output.
fn init_tracing() {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::EnvFilter::from_default_env()
        } else {
            tracing_subscriber::EnvFilter::new("warn")
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn local_id() -> Kuid {
    Kuid::new([0x5A; 20])
}

struct Node {
    handle: RoutingTableHandle,
    task: JoinHandle<()>,
    clock: ControllableTimeSource,
    net: Arc<SimNetwork>,
    lookups: Arc<SimLookups>,
}

fn start_node(population: usize) -> Node {
    init_tracing();
    let clock = ControllableTimeSource::new(T0);
    let net = SimNetwork::new(population, 42, clock.clone());
    let config = RoutingConfig::default();
    let lookups = SimLookups::new(net.clone(), config.k);

    let service = RoutingService::new(local_id(), config, Box::new(clock.clone()))
        .unwrap()
        .with_seed(3);
    let (handle, task) = spawn(
        service,
        SimRpc::new(net.clone()),
        lookups.clone(),
        Arc::new(NoopObserver),
    );
    lookups.attach(handle.clone());

    Node {
        handle,
        task,
        clock,
        net,
        lookups,
    }
}

async fn wait_for_stats(
    handle: &RoutingTableHandle,
    check: impl Fn(&RoutingStats) -> bool,
) -> RoutingStats {
    for _ in 0..500 {
        if let Some(stats) = handle.stats().await {
            if check(&stats) {
                return stats;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached: {:?}", handle.stats().await);
}

async fn bootstrapped_node() -> Node {
    let node = start_node(POPULATION);
    let seeds = node.net.members()[..3].iter().map(|(_, addr)| *addr).collect();
    node.handle.seed(seeds).await;
    wait_for_stats(&node.handle, |s| s.bootstrap == BootStatus::Completed).await;
    node
}

#[tokio::test]
async fn test_bootstrap_from_seeds_fills_table() {
    let node = bootstrapped_node().await;
    let k = RoutingConfig::default().k;

    let stats = node.handle.stats().await.unwrap();
    assert!(stats.table.leaves > 1);
    assert!(stats.table.good > k);
    assert!(stats.size_estimate.is_some());

    let calls = node.lookups.calls();
    assert_eq!(calls[0], (local_id(), LookupMode::Bootstrap));
    assert!(calls.iter().all(|(_, mode)| *mode == LookupMode::Bootstrap));

    // The own-KUID lookup met the closest node of the whole network.
    let (closest, _) = node.net.closest(&local_id(), 1)[0];
    let ours = node.handle.find_closest(local_id(), 1).await;
    assert_eq!(*ours[0].id(), closest);

    node.handle.shutdown().await;
}

#[tokio::test]
async fn test_dead_node_is_dropped_after_repeated_timeouts() {
    let node = bootstrapped_node().await;
    let config = RoutingConfig::default();

    let victim = node.handle.find_closest(local_id(), 1).await[0].clone();
    node.net.take_down(victim.addr());

    for round in 1..config.max_rpc_timeouts {
        node.clock.advance(config.alive_period_secs);
        node.handle.tick().await;
        wait_for_stats(&node.handle, |_| victim.rpc_timeouts() >= round).await;
        assert_eq!(victim.status(), NodeStatus::Stale);
    }

    node.clock.advance(config.alive_period_secs);
    node.handle.tick().await;
    wait_for_stats(&node.handle, |_| victim.status() == NodeStatus::Unknown).await;
    assert!(node.handle.find_node(*victim.id()).await.is_none());

    node.handle.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let node = bootstrapped_node().await;
    let before = node.handle.stats().await.unwrap();

    let records = node.handle.shutdown().await;
    node.task.await.unwrap();
    assert!(!records.is_empty());
    assert!(records.len() <= before.table.good + before.table.stale);

    let json = snapshot_to_json(&records).unwrap();
    let envelope: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(envelope["version"], SNAPSHOT_VERSION);
    assert_eq!(envelope["nodes"].as_array().map(Vec::len), Some(records.len()));
    let restored = snapshot_from_json(&json).unwrap();
    assert_eq!(restored, records);

    // Fresh table whose lookups never get anywhere.
    let clock = ControllableTimeSource::new(T0 + 60);
    let net = SimNetwork::new(0, 1, clock.clone());
    let service = RoutingService::new(local_id(), RoutingConfig::default(), Box::new(clock))
        .unwrap();
    let (handle, task) = spawn(
        service,
        SimRpc::new(net),
        Arc::new(CancelledLookups),
        Arc::new(NoopObserver),
    );

    let report = handle.load_snapshot(restored).await.unwrap();
    assert!(report.inserted > 0);
    assert_eq!(report.inserted + report.skipped, records.len());

    let stats = wait_for_stats(&handle, |s| s.bootstrap == BootStatus::Seeded).await;
    assert_eq!(stats.table.good, report.inserted);

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn test_refresh_timers_issue_refresh_lookups() {
    let node = bootstrapped_node().await;

    node.clock.advance(RoutingConfig::default().refresh_period_secs);
    node.handle.tick().await;

    let lookups = node.lookups.clone();
    wait_for_stats(&node.handle, |_| {
        lookups
            .calls()
            .iter()
            .any(|(_, mode)| *mode == LookupMode::Refresh)
    })
    .await;
    let stats = node.handle.stats().await.unwrap();
    assert_eq!(stats.bootstrap, BootStatus::Completed);

    node.handle.shutdown().await;
}
