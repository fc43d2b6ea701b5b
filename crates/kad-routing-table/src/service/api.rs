use tracing::debug;

use crate::domain::{
    CollisionResolution, InsertOutcome, KNodeRef, Kuid, LoadReport, LookupError, LookupMode,
    NodeStatus, PingOutcome, RoutingError, SnapshotRecord,
};
use crate::ports::{RoutingAction, RoutingStats, RoutingTableApi};
use crate::service::RoutingService;

impl RoutingTableApi for RoutingService {
    fn traffic_from(&mut self, node: KNodeRef) -> Vec<RoutingAction> {
        self.offer(node, true)
    }

    fn learned(&mut self, node: KNodeRef) -> Vec<RoutingAction> {
        self.offer(node, false)
    }

    fn rpc_timeout(&mut self, id: &Kuid) -> Result<NodeStatus, RoutingError> {
        let status = self.table.rpc_timeout(id)?;
        debug!(kuid = %id, %status, "rpc timeout");
        Ok(status)
    }

    fn shutting_down(&mut self, id: &Kuid) -> Result<NodeStatus, RoutingError> {
        self.table.shutting_down(id)
    }

    fn ping_completed(&mut self, node: &KNodeRef, outcome: PingOutcome) -> Vec<RoutingAction> {
        let now = self.now();
        let id = node.id();
        let result = match outcome {
            PingOutcome::Reply { id: replier } if replier == *id => self.table.record_activity(id, now),
            PingOutcome::Reply { id: replier } => {
                debug!(kuid = %id, %replier, "address now answers for another node");
                self.table.rpc_timeout(id)
            }
            PingOutcome::Timeout => self.table.rpc_timeout(id),
        };
        // The node may have left the table while the ping was in flight.
        if let Err(err) = result {
            debug!(kuid = %id, %err, "ping result ignored");
        }
        Vec::new()
    }

    fn address_verified(&mut self, incumbent: &Kuid, outcome: PingOutcome) -> Vec<RoutingAction> {
        let mut actions = Vec::new();
        let Some(verification) = self.verifications.take(incumbent) else {
            debug!(kuid = %incumbent, "no verification pending");
            return actions;
        };
        let now = self.now();

        let resolution = self.table.resolve_collision(verification, outcome, now);
        debug!(kuid = %incumbent, ?resolution, "collision resolved");
        if let CollisionResolution::Replaced(InsertOutcome::Added(_)) = resolution {
            self.on_node_added(&mut actions);
        }
        self.note_structure(&mut actions);
        actions
    }

    fn lookup_completed(
        &mut self,
        target: Kuid,
        mode: LookupMode,
        result: Result<Vec<KNodeRef>, LookupError>,
    ) -> Vec<RoutingAction> {
        let mut actions = Vec::new();
        if self.table.is_shut_down() {
            return actions;
        }
        let now = self.now();
        self.table.touch_lookup(&target, now);

        match &result {
            Ok(nodes) => {
                let closest: Vec<Kuid> = nodes.iter().map(|n| *n.id()).collect();
                self.estimator.record_regional(&target, &closest, now);
            }
            Err(err) => debug!(kuid = %target, ?mode, %err, "lookup failed"),
        }

        if mode == LookupMode::Bootstrap && self.bootstrap.status().is_running() {
            self.advance_bootstrap(result.as_ref().map(|_| ()), &mut actions);
        }

        self.refresh_local_estimate();
        self.note_estimate(&mut actions);
        self.note_structure(&mut actions);
        actions
    }

    fn find_closest(&self, target: &Kuid, count: usize) -> Vec<KNodeRef> {
        self.table.find_closest(target, count)
    }

    fn find_node(&self, id: &Kuid) -> Option<KNodeRef> {
        self.table.find_node(id)
    }

    fn stats(&self) -> RoutingStats {
        RoutingStats {
            table: self.table.stats(),
            bootstrap: self.bootstrap.status(),
            size_estimate: self.reported_estimate,
            verifying: self.verifications.len(),
        }
    }

    fn snapshot(&self) -> Vec<SnapshotRecord> {
        self.table.snapshot(self.now())
    }

    fn load_snapshot(&mut self, records: Vec<SnapshotRecord>) -> (LoadReport, Vec<RoutingAction>) {
        let now = self.now();
        let report = self.table.load_snapshot(records, now);
        debug!(inserted = report.inserted, skipped = report.skipped, "snapshot loaded");

        let mut actions = Vec::new();
        if report.inserted > 0 {
            self.on_node_added(&mut actions);
        }
        self.note_structure(&mut actions);
        (report, actions)
    }
}
