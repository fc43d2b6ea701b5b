use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::domain::{
    KNodeRef, Kuid, LoadReport, LookupError, LookupMode, NodeStatus, PingOutcome, RoutingError,
    SnapshotRecord, SocketAddr,
};
use crate::ports::{
    LookupPort, RoutingAction, RoutingObserver, RoutingStats, RoutingTableApi, RpcPort,
};
use crate::service::RoutingService;

/// Idle wait when no timer is armed (table shut down).
const IDLE_WAIT: Duration = Duration::from_secs(3600);

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    // Node events
    TrafficFrom(KNodeRef),
    Learned(KNodeRef),
    RpcTimeout(Kuid, Reply<Result<NodeStatus, RoutingError>>),
    ShuttingDown(Kuid, Reply<Result<NodeStatus, RoutingError>>),
    LookupCompleted {
        target: Kuid,
        mode: LookupMode,
        result: Result<Vec<KNodeRef>, LookupError>,
    },
    PeerEstimate(Kuid, u64),

    // Queries
    FindClosest(Kuid, usize, Reply<Vec<KNodeRef>>),
    FindNode(Kuid, Reply<Option<KNodeRef>>),
    Stats(Reply<RoutingStats>),
    Snapshot(Reply<Vec<SnapshotRecord>>),

    // Lifecycle
    LoadSnapshot(Vec<SnapshotRecord>, Reply<LoadReport>),
    Seed(Vec<SocketAddr>),
    RestartBootstrap,
    Tick,
    Shutdown(Reply<Vec<SnapshotRecord>>),
}

/// Result of a task spawned on behalf of the service.
enum TaskResult {
    Ping {
        node: KNodeRef,
        outcome: PingOutcome,
    },
    Verify {
        incumbent: Kuid,
        outcome: PingOutcome,
    },
    Seed {
        addr: SocketAddr,
        outcome: PingOutcome,
    },
    Lookup {
        target: Kuid,
        mode: LookupMode,
        result: Result<Vec<KNodeRef>, LookupError>,
    },
}

pub(crate) struct RoutingActor {
    service: RoutingService,
    rpc: Arc<dyn RpcPort>,
    lookups: Arc<dyn LookupPort>,
    observer: Arc<dyn RoutingObserver>,
    cmd_rx: mpsc::Receiver<Command>,
    tasks: JoinSet<TaskResult>,
}

impl RoutingActor {
    pub(crate) fn new(
        service: RoutingService,
        rpc: Arc<dyn RpcPort>,
        lookups: Arc<dyn LookupPort>,
        observer: Arc<dyn RoutingObserver>,
        cmd_rx: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            service,
            rpc,
            lookups,
            observer,
            cmd_rx,
            tasks: JoinSet::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        info!(kuid = %self.service.local_id(), "routing actor started");
        loop {
            let wait = self.time_to_deadline();
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown(reply)) => {
                        let records = self.shutdown();
                        let _ = reply.send(records);
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("all routing handles dropped");
                        self.shutdown();
                        break;
                    }
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.handle_joined(joined);
                }
                () = tokio::time::sleep(wait) => {
                    let actions = self.service.run_due_timers();
                    self.execute(actions);
                }
            }
        }
        info!("routing actor stopped");
    }

    fn time_to_deadline(&self) -> Duration {
        match self.service.next_deadline() {
            Some(deadline) => {
                let now = self.service.now();
                Duration::from_secs(deadline.secs_since(now))
            }
            None => IDLE_WAIT,
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        let actions = match cmd {
            Command::TrafficFrom(node) => self.service.traffic_from(node),
            Command::Learned(node) => self.service.learned(node),
            Command::RpcTimeout(id, reply) => {
                let _ = reply.send(self.service.rpc_timeout(&id));
                Vec::new()
            }
            Command::ShuttingDown(id, reply) => {
                let _ = reply.send(self.service.shutting_down(&id));
                Vec::new()
            }
            Command::LookupCompleted {
                target,
                mode,
                result,
            } => self.service.lookup_completed(target, mode, result),
            Command::PeerEstimate(peer, estimate) => {
                self.service.record_peer_estimate(&peer, estimate)
            }
            Command::FindClosest(target, count, reply) => {
                let _ = reply.send(self.service.find_closest(&target, count));
                Vec::new()
            }
            Command::FindNode(id, reply) => {
                let _ = reply.send(self.service.find_node(&id));
                Vec::new()
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.service.stats());
                Vec::new()
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.service.snapshot());
                Vec::new()
            }
            Command::LoadSnapshot(records, reply) => {
                let (report, actions) = self.service.load_snapshot(records);
                let _ = reply.send(report);
                actions
            }
            Command::Seed(addrs) => {
                self.contact_seeds(addrs);
                Vec::new()
            }
            Command::RestartBootstrap => self.service.restart_bootstrap(),
            Command::Tick => self.service.run_due_timers(),
            // Intercepted by the run loop.
            Command::Shutdown(reply) => {
                let _ = reply.send(Vec::new());
                Vec::new()
            }
        };
        self.execute(actions);
    }

    fn handle_joined(&mut self, joined: Result<TaskResult, JoinError>) {
        let result = match joined {
            Ok(result) => result,
            Err(err) => {
                warn!(%err, "routing task failed");
                return;
            }
        };
        let actions = match result {
            TaskResult::Ping { node, outcome } => self.service.ping_completed(&node, outcome),
            TaskResult::Verify { incumbent, outcome } => {
                self.service.address_verified(&incumbent, outcome)
            }
            TaskResult::Seed { addr, outcome } => self.service.seed_answered(addr, outcome),
            TaskResult::Lookup {
                target,
                mode,
                result,
            } => self.service.lookup_completed(target, mode, result),
        };
        self.execute(actions);
    }

    fn contact_seeds(&mut self, addrs: Vec<SocketAddr>) {
        debug!(count = addrs.len(), "contacting seed addresses");
        for addr in addrs {
            let rpc = Arc::clone(&self.rpc);
            self.tasks.spawn(async move {
                let outcome = rpc.ping_address(addr).await;
                TaskResult::Seed { addr, outcome }
            });
        }
    }

    /// Carry out the actions returned by the service.
    fn execute(&mut self, actions: Vec<RoutingAction>) {
        for action in actions {
            match action {
                RoutingAction::Ping(node) => {
                    let rpc = Arc::clone(&self.rpc);
                    self.tasks.spawn(async move {
                        let outcome = rpc.ping(node.clone()).await;
                        TaskResult::Ping { node, outcome }
                    });
                }
                RoutingAction::VerifyAddress { incumbent } => {
                    let rpc = Arc::clone(&self.rpc);
                    let id = *incumbent.id();
                    let addr = incumbent.addr();
                    self.tasks.spawn(async move {
                        // The reply's KUID decides the collision.
                        let outcome = rpc.ping_address(addr).await;
                        TaskResult::Verify {
                            incumbent: id,
                            outcome,
                        }
                    });
                }
                RoutingAction::StartLookup { target, mode } => {
                    let lookups = Arc::clone(&self.lookups);
                    self.tasks.spawn(async move {
                        let result = lookups.lookup(target, mode).await;
                        TaskResult::Lookup {
                            target,
                            mode,
                            result,
                        }
                    });
                }
                RoutingAction::TableSizeChanged(estimate) => {
                    self.observer.table_size_changed(estimate);
                }
                RoutingAction::BucketCountChanged { buckets, leaves } => {
                    self.observer.bucket_count_changed(buckets, leaves);
                }
                RoutingAction::BootstrapStatusChanged(status) => {
                    self.observer.bootstrap_status_changed(status);
                }
            }
        }
    }

    fn shutdown(&mut self) -> Vec<SnapshotRecord> {
        self.tasks.abort_all();
        let (records, actions) = self.service.shutdown();
        self.execute(actions);
        records
    }
}
