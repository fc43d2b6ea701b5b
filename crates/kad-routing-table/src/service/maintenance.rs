use tracing::{debug, info};

use crate::domain::{
    BootStatus, BucketId, CollisionResolution, InsertOutcome, Kuid, LookupMode, PingOutcome,
    SnapshotRecord, TimerKind, Timestamp,
};
use crate::ports::RoutingAction;
use crate::service::RoutingService;

impl RoutingService {
    /// Run every maintenance timer that is due and settle verifications
    /// that got no answer in time.
    ///
    /// Call whenever `next_deadline()` has passed.
    pub fn run_due_timers(&mut self) -> Vec<RoutingAction> {
        let now = self.now();
        let mut actions = Vec::new();
        self.expire_verifications(now, &mut actions);

        let due = self.table.take_due_timers(now);
        if due.is_empty() {
            return actions;
        }
        for timer in due {
            match timer.kind {
                TimerKind::Alive => self.alive_check(timer.bucket, now, &mut actions),
                TimerKind::Refresh => self.refresh(timer.bucket, false, now, &mut actions),
            }
        }

        self.refresh_local_estimate();
        self.note_estimate(&mut actions);
        actions
    }

    /// A peer reported its own estimate of the network size.
    pub fn record_peer_estimate(&mut self, peer: &Kuid, estimate: u64) -> Vec<RoutingAction> {
        let now = self.now();
        self.estimator.record_peer(peer, estimate, now);
        let mut actions = Vec::new();
        self.note_estimate(&mut actions);
        actions
    }

    /// Tear everything down and return what is worth persisting.
    ///
    /// Every timer is cancelled, pending verifications are abandoned and all
    /// node records drop to unknown status.
    pub fn shutdown(&mut self) -> (Vec<SnapshotRecord>, Vec<RoutingAction>) {
        if self.table.is_shut_down() {
            return (Vec::new(), Vec::new());
        }
        let now = self.now();
        let records = self.table.snapshot(now);

        self.verifications.clear();
        let drained = self.table.shutdown();
        self.bootstrap.shutdown();
        info!(retained = records.len(), drained = drained.len(), "routing service shut down");

        (
            records,
            vec![RoutingAction::BootstrapStatusChanged(BootStatus::Shutdown)],
        )
    }

    /// Treat overdue verifications as if the incumbent stayed silent.
    fn expire_verifications(&mut self, now: Timestamp, actions: &mut Vec<RoutingAction>) {
        let timeout = self.table.config().verification_timeout_secs;
        let expired = self.verifications.expire(now, timeout);
        if expired.is_empty() {
            return;
        }
        for verification in expired {
            let id = *verification.incumbent.id();
            let resolution = self
                .table
                .resolve_collision(verification, PingOutcome::Timeout, now);
            debug!(kuid = %id, ?resolution, "verification timed out");
            if let CollisionResolution::Replaced(InsertOutcome::Added(_)) = resolution {
                self.on_node_added(actions);
            }
        }
        self.note_structure(actions);
    }

    fn alive_check(&mut self, leaf: BucketId, now: Timestamp, actions: &mut Vec<RoutingAction>) {
        let Some(check) = self.table.alive_check(leaf, now) else {
            return;
        };
        debug!(
            bucket = %leaf,
            ping = check.ping.len(),
            expired = check.expired.len(),
            promoted = check.promoted,
            "alive check"
        );

        for node in check.ping {
            node.mark_rpc_sent(now);
            actions.push(RoutingAction::Ping(node));
        }
        if check.force_refresh {
            self.refresh(leaf, true, now, actions);
        }
    }

    fn refresh(&mut self, leaf: BucketId, forced: bool, now: Timestamp, actions: &mut Vec<RoutingAction>) {
        if let Some(target) = self.table.refresh_target(leaf, forced, now, &mut self.rng) {
            actions.push(RoutingAction::StartLookup {
                target,
                mode: LookupMode::Refresh,
            });
        }
    }
}
