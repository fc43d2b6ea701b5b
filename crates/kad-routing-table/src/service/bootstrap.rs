use tracing::{debug, info};

use crate::domain::{
    BootStep, KNode, LookupError, LookupMode, PingOutcome, ProtocolVersion, SocketAddr, TreeShape,
    VendorCode,
};
use crate::ports::{RoutingAction, RoutingTableApi};
use crate::service::RoutingService;

impl RoutingService {
    /// A seed address answered (or not) the ping sent to it.
    ///
    /// The replier is registered as if it had contacted us.
    pub fn seed_answered(&mut self, addr: SocketAddr, outcome: PingOutcome) -> Vec<RoutingAction> {
        match outcome {
            PingOutcome::Reply { id } => {
                debug!(%addr, kuid = %id, "seed answered");
                let node = KNode::new(
                    id,
                    addr,
                    VendorCode::default(),
                    ProtocolVersion::default(),
                    self.now(),
                );
                self.traffic_from(node)
            }
            PingOutcome::Timeout => {
                debug!(%addr, "seed did not answer");
                Vec::new()
            }
        }
    }

    /// Relaunch a bootstrap that was aborted by a cancelled lookup.
    pub fn restart_bootstrap(&mut self) -> Vec<RoutingAction> {
        let mut actions = Vec::new();
        self.start_bootstrap(&mut actions);
        actions
    }

    /// The first node seeds the controller, which immediately looks up our
    /// own KUID.
    pub(crate) fn on_node_added(&mut self, actions: &mut Vec<RoutingAction>) {
        if self.bootstrap.on_node_learned() {
            info!("bootstrap seeded");
            actions.push(RoutingAction::BootstrapStatusChanged(self.bootstrap.status()));
            self.start_bootstrap(actions);
        }
    }

    pub(crate) fn start_bootstrap(&mut self, actions: &mut Vec<RoutingAction>) {
        if let BootStep::Lookup { target } = self.bootstrap.start() {
            info!(kuid = %target, "bootstrap looking up own KUID");
            actions.push(RoutingAction::BootstrapStatusChanged(self.bootstrap.status()));
            actions.push(RoutingAction::StartLookup {
                target,
                mode: LookupMode::Bootstrap,
            });
        }
    }

    pub(crate) fn advance_bootstrap(
        &mut self,
        result: Result<(), &LookupError>,
        actions: &mut Vec<RoutingAction>,
    ) {
        let before = self.bootstrap.status();
        let shape = TreeShape {
            single_leaf: self.table.is_single_leaf(),
            ours_depth: self
                .table
                .bucket(self.table.ours_leaf())
                .map_or(0, |b| b.depth()),
        };
        let step = self.bootstrap.on_lookup_completed(result, shape, &mut self.rng);

        let after = self.bootstrap.status();
        if after != before {
            info!(from = %before, to = %after, rounds = self.bootstrap.rounds(), "bootstrap status changed");
            actions.push(RoutingAction::BootstrapStatusChanged(after));
        }
        if let BootStep::Lookup { target } = step {
            actions.push(RoutingAction::StartLookup {
                target,
                mode: LookupMode::Bootstrap,
            });
        }
    }
}
