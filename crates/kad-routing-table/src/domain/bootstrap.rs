//! # Bootstrap Controller
//!
//! Drives a freshly created table from its first contact to a tree that
//! covers the whole identifier space:
//!
//! ```text
//! None ──first node──▶ Seeded ──start──▶ OwnLookup ──tree split──▶ Completing ──bit 160──▶ Completed
//!                        ▲                  │   ▲                     │
//!                        └────cancelled─────┘   └─retry (random id)   └──one lookup per bit
//! ```
//!
//! The controller only decides which lookup comes next; issuing it and
//! reporting its completion is up to the caller.

use rand::Rng;
use serde::Serialize;

use crate::domain::{Kuid, LookupError, KUID_BITS};

/// Bootstrap progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootStatus {
    /// No node known yet.
    #[default]
    None,
    /// At least one node known, no bootstrap lookup running.
    Seeded,
    /// Looking up our own KUID (or a random retry target).
    OwnLookup,
    /// Looking up targets progressively farther from our KUID.
    Completing,
    Completed,
    /// The table was torn down.
    Shutdown,
}

impl BootStatus {
    /// Whether a bootstrap lookup is outstanding.
    pub fn is_running(&self) -> bool {
        matches!(self, BootStatus::OwnLookup | BootStatus::Completing)
    }
}

impl std::fmt::Display for BootStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BootStatus::None => "none",
            BootStatus::Seeded => "seeded",
            BootStatus::OwnLookup => "own-lookup",
            BootStatus::Completing => "completing",
            BootStatus::Completed => "completed",
            BootStatus::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Shape of the tree at the time a bootstrap lookup completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    /// The tree is still one unsplit bucket.
    pub single_leaf: bool,
    /// Depth of the leaf holding our KUID.
    pub ours_depth: usize,
}

/// What the caller should do after a bootstrap transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    /// Nothing more to do.
    Idle,
    /// Launch a bootstrap lookup for `target`.
    Lookup { target: Kuid },
}

/// Bootstrap state machine.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    local_id: Kuid,
    status: BootStatus,
    /// Next bit to flip while completing
    next_bit: usize,
    /// Lookups issued since `start`
    rounds: u32,
}

impl Bootstrap {
    pub fn new(local_id: Kuid) -> Self {
        Self {
            local_id,
            status: BootStatus::None,
            next_bit: 0,
            rounds: 0,
        }
    }

    pub fn status(&self) -> BootStatus {
        self.status
    }

    /// Lookups issued since the last `start`.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// A node was learned. Returns true when this seeded the controller.
    pub fn on_node_learned(&mut self) -> bool {
        if self.status == BootStatus::None {
            self.status = BootStatus::Seeded;
            return true;
        }
        false
    }

    /// Launch the own-KUID lookup. Only valid once seeded.
    pub fn start(&mut self) -> BootStep {
        if self.status != BootStatus::Seeded {
            return BootStep::Idle;
        }
        self.status = BootStatus::OwnLookup;
        self.rounds = 1;
        BootStep::Lookup {
            target: self.local_id,
        }
    }

    /// A bootstrap lookup finished.
    ///
    /// Cancellation aborts the sequence back to `Seeded` with no retry.
    pub fn on_lookup_completed<R: Rng + ?Sized>(
        &mut self,
        result: Result<(), &LookupError>,
        shape: TreeShape,
        rng: &mut R,
    ) -> BootStep {
        if matches!(result, Err(LookupError::Cancelled)) {
            if self.status.is_running() {
                self.status = BootStatus::Seeded;
            }
            return BootStep::Idle;
        }

        match self.status {
            BootStatus::OwnLookup if result.is_err() || shape.single_leaf => {
                self.rounds += 1;
                BootStep::Lookup {
                    target: Kuid::random(rng),
                }
            }
            BootStatus::OwnLookup => {
                self.status = BootStatus::Completing;
                self.next_bit = shape.ours_depth;
                self.next_completing(rng)
            }
            BootStatus::Completing => {
                self.next_bit += 1;
                self.next_completing(rng)
            }
            _ => BootStep::Idle,
        }
    }

    /// Stop for good.
    pub fn shutdown(&mut self) {
        self.status = BootStatus::Shutdown;
    }

    /// Target sharing our first `next_bit` bits with bit `next_bit` flipped.
    ///
    /// Rounds walk `next_bit` from our leaf's depth up to the last bit, one
    /// bit per round, so the phase takes `KUID_BITS - depth` lookups. Each
    /// target lands in the sibling subtree at that depth, which lies outside
    /// the part of the space our leaf already covers. Successive targets
    /// therefore share more leading bits with us; "farther" only holds
    /// relative to our own leaf.
    fn next_completing<R: Rng + ?Sized>(&mut self, rng: &mut R) -> BootStep {
        if self.next_bit >= KUID_BITS {
            self.status = BootStatus::Completed;
            return BootStep::Idle;
        }
        self.rounds += 1;
        let prefix = self.local_id.flip_leading_bit(self.next_bit);
        BootStep::Lookup {
            target: Kuid::random_in_prefix(&prefix, self.next_bit + 1, rng),
        }
    }
}
