//! In-process network of simulated DHT nodes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use kad_routing_table::ports::TimeSource;
use kad_routing_table::test_utils::ControllableTimeSource;
use kad_routing_table::{
    sort_by_distance, IpAddr, KNode, KNodeRef, Kuid, LookupError, LookupMode, LookupPort,
    PingOutcome, ProtocolVersion, RoutingTableHandle, RpcPort, SocketAddr, VendorCode,
};

pub const SIM_PORT: u16 = 6346;

/// Population of remote nodes, each in its own /24.
pub struct SimNetwork {
    members: Vec<(Kuid, SocketAddr)>,
    by_addr: HashMap<SocketAddr, Kuid>,
    down: Mutex<HashSet<SocketAddr>>,
    clock: ControllableTimeSource,
}

impl SimNetwork {
    pub fn new(population: usize, seed: u64, clock: ControllableTimeSource) -> Arc<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let members: Vec<(Kuid, SocketAddr)> = (0..population)
            .map(|i| {
                let addr = SocketAddr::new(
                    IpAddr::v4(10, (i >> 8) as u8, (i & 0xff) as u8, 1),
                    SIM_PORT,
                );
                (Kuid::random(&mut rng), addr)
            })
            .collect();
        let by_addr = members.iter().map(|(id, addr)| (*addr, *id)).collect();
        Arc::new(Self {
            members,
            by_addr,
            down: Mutex::new(HashSet::new()),
            clock,
        })
    }

    pub fn members(&self) -> &[(Kuid, SocketAddr)] {
        &self.members
    }

    /// Stop answering at `addr`.
    pub fn take_down(&self, addr: SocketAddr) {
        self.down.lock().insert(addr);
    }

    pub fn is_up(&self, addr: &SocketAddr) -> bool {
        self.by_addr.contains_key(addr) && !self.down.lock().contains(addr)
    }

    /// The `count` reachable members closest to `target`.
    pub fn closest(&self, target: &Kuid, count: usize) -> Vec<(Kuid, SocketAddr)> {
        let mut live: Vec<(Kuid, SocketAddr)> = self
            .members
            .iter()
            .filter(|(_, addr)| self.is_up(addr))
            .copied()
            .collect();
        sort_by_distance(&mut live, target, |(id, _)| *id);
        live.truncate(count);
        live
    }

    pub fn node(&self, id: Kuid, addr: SocketAddr) -> KNodeRef {
        KNode::new(
            id,
            addr,
            VendorCode::new(*b"SIMU"),
            ProtocolVersion::new(0, 1),
            self.clock.now(),
        )
    }
}

/// Pings answered by every reachable member.
pub struct SimRpc {
    net: Arc<SimNetwork>,
}

impl SimRpc {
    pub fn new(net: Arc<SimNetwork>) -> Arc<Self> {
        Arc::new(Self { net })
    }

    fn answer(&self, addr: SocketAddr) -> PingOutcome {
        match self.net.by_addr.get(&addr) {
            Some(id) if self.net.is_up(&addr) => PingOutcome::Reply { id: *id },
            _ => PingOutcome::Timeout,
        }
    }
}

#[async_trait]
impl RpcPort for SimRpc {
    async fn ping(&self, node: KNodeRef) -> PingOutcome {
        self.answer(node.addr())
    }

    async fn ping_address(&self, addr: SocketAddr) -> PingOutcome {
        self.answer(addr)
    }
}

/// Oracle lookup: the result is the true closest set, and every node in it
/// is reported to the table as learned.
pub struct SimLookups {
    net: Arc<SimNetwork>,
    k: usize,
    handle: OnceLock<RoutingTableHandle>,
    calls: Mutex<Vec<(Kuid, LookupMode)>>,
}

impl SimLookups {
    pub fn new(net: Arc<SimNetwork>, k: usize) -> Arc<Self> {
        Arc::new(Self {
            net,
            k,
            handle: OnceLock::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Attach the table that learns about the nodes met.
    pub fn attach(&self, handle: RoutingTableHandle) {
        let _ = self.handle.set(handle);
    }

    pub fn calls(&self) -> Vec<(Kuid, LookupMode)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LookupPort for SimLookups {
    async fn lookup(&self, target: Kuid, mode: LookupMode) -> Result<Vec<KNodeRef>, LookupError> {
        self.calls.lock().push((target, mode));
        let found: Vec<KNodeRef> = self
            .net
            .closest(&target, self.k)
            .into_iter()
            .map(|(id, addr)| self.net.node(id, addr))
            .collect();
        if found.is_empty() {
            return Err(LookupError::NoNodes);
        }
        if let Some(handle) = self.handle.get() {
            for node in &found {
                handle.learned(node.clone()).await;
            }
        }
        Ok(found)
    }
}
