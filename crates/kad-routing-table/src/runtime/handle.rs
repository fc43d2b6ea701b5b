use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::actor::{Command, RoutingActor};
use crate::domain::{
    KNodeRef, Kuid, LoadReport, LookupError, LookupMode, NodeStatus, RoutingError, SnapshotRecord,
    SocketAddr,
};
use crate::ports::{LookupPort, RoutingObserver, RoutingStats, RpcPort};
use crate::service::RoutingService;

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Start the routing actor on the current tokio runtime.
///
/// The actor stops on [`RoutingTableHandle::shutdown`] or once every handle
/// has been dropped.
pub fn spawn(
    service: RoutingService,
    rpc: Arc<dyn RpcPort>,
    lookups: Arc<dyn LookupPort>,
    observer: Arc<dyn RoutingObserver>,
) -> (RoutingTableHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let local_id = *service.local_id();
    let actor = RoutingActor::new(service, rpc, lookups, observer, cmd_rx);
    let task = tokio::spawn(actor.run());
    (RoutingTableHandle { cmd_tx, local_id }, task)
}

/// Cloneable handle to a running routing actor.
///
/// Once the actor has stopped, notifications are silently dropped and
/// queries return empty results.
#[derive(Debug, Clone)]
pub struct RoutingTableHandle {
    cmd_tx: mpsc::Sender<Command>,
    local_id: Kuid,
}

impl RoutingTableHandle {
    pub fn local_id(&self) -> &Kuid {
        &self.local_id
    }

    /// Whether the actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// The node contacted us.
    pub async fn traffic_from(&self, node: KNodeRef) {
        self.send(Command::TrafficFrom(node)).await;
    }

    /// The node was mentioned by a third party.
    pub async fn learned(&self, node: KNodeRef) {
        self.send(Command::Learned(node)).await;
    }

    pub async fn rpc_timeout(&self, id: Kuid) -> Result<NodeStatus, RoutingError> {
        self.request(|tx| Command::RpcTimeout(id, tx))
            .await
            .unwrap_or(Err(RoutingError::ShutDown))
    }

    /// The node announced it is leaving the network.
    pub async fn shutting_down(&self, id: Kuid) -> Result<NodeStatus, RoutingError> {
        self.request(|tx| Command::ShuttingDown(id, tx))
            .await
            .unwrap_or(Err(RoutingError::ShutDown))
    }

    /// Report a lookup run outside the actor.
    pub async fn lookup_completed(
        &self,
        target: Kuid,
        mode: LookupMode,
        result: Result<Vec<KNodeRef>, LookupError>,
    ) {
        self.send(Command::LookupCompleted {
            target,
            mode,
            result,
        })
        .await;
    }

    /// A peer shared its own network size estimate.
    pub async fn peer_estimate(&self, peer: Kuid, estimate: u64) {
        self.send(Command::PeerEstimate(peer, estimate)).await;
    }

    pub async fn find_closest(&self, target: Kuid, count: usize) -> Vec<KNodeRef> {
        self.request(|tx| Command::FindClosest(target, count, tx))
            .await
            .unwrap_or_default()
    }

    pub async fn find_node(&self, id: Kuid) -> Option<KNodeRef> {
        self.request(|tx| Command::FindNode(id, tx)).await.flatten()
    }

    pub async fn stats(&self) -> Option<RoutingStats> {
        self.request(Command::Stats).await
    }

    pub async fn snapshot(&self) -> Vec<SnapshotRecord> {
        self.request(Command::Snapshot).await.unwrap_or_default()
    }

    pub async fn load_snapshot(&self, records: Vec<SnapshotRecord>) -> Option<LoadReport> {
        self.request(|tx| Command::LoadSnapshot(records, tx)).await
    }

    /// Ping seed addresses; every replier is added as if it had contacted us.
    pub async fn seed(&self, addrs: Vec<SocketAddr>) {
        self.send(Command::Seed(addrs)).await;
    }

    pub async fn restart_bootstrap(&self) {
        self.send(Command::RestartBootstrap).await;
    }

    /// Run due maintenance timers now instead of waiting for the actor's
    /// own wake-up.
    pub async fn tick(&self) {
        self.send(Command::Tick).await;
    }

    /// Stop the actor and return the final snapshot.
    pub async fn shutdown(&self) -> Vec<SnapshotRecord> {
        self.request(Command::Shutdown).await.unwrap_or_default()
    }

    async fn send(&self, cmd: Command) {
        let _ = self.cmd_tx.send(cmd).await;
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(make(tx)).await.is_err() {
            return None;
        }
        rx.await.ok()
    }
}
