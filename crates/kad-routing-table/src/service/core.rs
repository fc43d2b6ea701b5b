use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::domain::{
    BootStatus, Bootstrap, InsertOutcome, IntegrityError, KNodeRef, Kuid, PendingVerifications,
    RejectReason, RoutingConfig, RoutingError, RoutingTable, SizeEstimator, Timestamp,
};
use crate::ports::{RoutingAction, TimeSource};

/// Routing table service implementing the driving port.
///
/// Owns the routing trie together with the bootstrap controller, the size
/// estimator and the collisions under verification. Every event returns the
/// actions the host has to carry out.
///
/// # Example
///
/// ```rust,ignore
/// use kad_routing_table::service::RoutingService;
/// use kad_routing_table::ports::RoutingTableApi;
///
/// let mut service = RoutingService::new(local_id, RoutingConfig::default(), Box::new(SystemTimeSource::new()))?;
/// for action in service.traffic_from(node) {
///     // ...
/// }
/// ```
pub struct RoutingService {
    /// The underlying routing table (domain layer)
    pub(crate) table: RoutingTable,
    pub(crate) bootstrap: Bootstrap,
    pub(crate) estimator: SizeEstimator,
    pub(crate) verifications: PendingVerifications,
    pub(crate) rng: StdRng,
    /// Time source for operations requiring timestamps
    pub(crate) time_source: Box<dyn TimeSource>,
    /// Last estimate reported through `TableSizeChanged`
    pub(crate) reported_estimate: Option<u64>,
    /// Bucket count last reported through `BucketCountChanged`
    pub(crate) reported_buckets: usize,
}

impl RoutingService {
    /// Create a new routing service.
    ///
    /// # Arguments
    ///
    /// * `local_id` - Our own KUID
    /// * `config` - Routing table parameters (validated here)
    /// * `time_source` - Provider for current time
    pub fn new(
        local_id: Kuid,
        config: RoutingConfig,
        time_source: Box<dyn TimeSource>,
    ) -> Result<Self, RoutingError> {
        let now = time_source.now();
        let estimator = SizeEstimator::new(&config);
        let table = RoutingTable::new(local_id, config, now)?;
        info!(kuid = %local_id, role = ?table.config().role, "routing table created");

        Ok(Self {
            table,
            bootstrap: Bootstrap::new(local_id),
            estimator,
            verifications: PendingVerifications::new(),
            rng: StdRng::from_entropy(),
            time_source,
            reported_estimate: None,
            reported_buckets: 1,
        })
    }

    /// Use a deterministic random source (refresh and bootstrap targets).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Get the current timestamp from the time source.
    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    pub fn local_id(&self) -> &Kuid {
        self.table.local_id()
    }

    /// Get the underlying routing table (for advanced operations).
    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn bootstrap_status(&self) -> BootStatus {
        self.bootstrap.status()
    }

    /// When the next maintenance timer or verification timeout is due.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        let timeout = self.table.config().verification_timeout_secs;
        let verification = self.verifications.next_deadline(timeout);
        match (self.table.next_deadline(), verification) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        self.table.check_integrity()
    }

    /// Offer a node to the table and collect the follow-up work.
    pub(crate) fn offer(&mut self, node: KNodeRef, from_traffic: bool) -> Vec<RoutingAction> {
        let now = self.now();
        let id = *node.id();
        let mut actions = Vec::new();

        match self.table.insert(node.clone(), from_traffic, now) {
            InsertOutcome::Added(_) => self.on_node_added(&mut actions),
            InsertOutcome::Rejected(RejectReason::Collision) => {
                if let Some(incumbent) = self.table.find_node(&id) {
                    warn!(
                        kuid = %id,
                        incumbent = %incumbent.addr(),
                        challenger = %node.addr(),
                        "identifier collision, verifying incumbent"
                    );
                    if self
                        .verifications
                        .begin(incumbent.clone(), node, from_traffic, now)
                    {
                        incumbent.mark_rpc_sent(now);
                        actions.push(RoutingAction::VerifyAddress { incumbent });
                    }
                }
            }
            InsertOutcome::AlreadyPresent | InsertOutcome::Rejected(_) => {}
        }

        self.note_structure(&mut actions);
        actions
    }

    /// Report a bucket count change since the last report.
    pub(crate) fn note_structure(&mut self, actions: &mut Vec<RoutingAction>) {
        let stats = self.table.stats();
        if stats.buckets != self.reported_buckets {
            self.reported_buckets = stats.buckets;
            actions.push(RoutingAction::BucketCountChanged {
                buckets: stats.buckets,
                leaves: stats.leaves,
            });
        }
    }

    /// Recompute the local estimate from the nodes closest to us.
    pub(crate) fn refresh_local_estimate(&mut self) {
        let local = *self.table.local_id();
        let closest: Vec<Kuid> = self
            .table
            .find_closest(&local, self.estimator.sample_size())
            .iter()
            .map(|n| *n.id())
            .collect();
        self.estimator.update_local(&local, &closest);
    }

    /// Report a size estimate change since the last report.
    pub(crate) fn note_estimate(&mut self, actions: &mut Vec<RoutingAction>) {
        let now = self.now();
        let estimate = self.estimator.estimate(now);
        if estimate != self.reported_estimate {
            self.reported_estimate = estimate;
            if let Some(estimate) = estimate {
                actions.push(RoutingAction::TableSizeChanged(estimate));
            }
        }
    }
}
