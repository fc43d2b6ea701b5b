//! Deadline-ordered timer queue.
//!
//! The routing table is driven by a single owner, so timers are plain data:
//! arming returns a [`TimerHandle`], the owner polls [`CalloutQueue::pop_due`]
//! with the current time and dispatches what fired. A handle is move-only
//! and consumed by cancellation, so a timer cannot be cancelled twice.

use std::collections::{BTreeMap, HashSet};

use super::Timestamp;

/// Identifier of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Ownership of one armed timer.
#[derive(Debug, PartialEq, Eq)]
pub struct TimerHandle {
    id: TimerId,
    deadline: Timestamp,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }
}

/// A fired timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<E> {
    pub id: TimerId,
    pub deadline: Timestamp,
    pub event: E,
}

/// Timer queue ordered by deadline, then by arming order.
#[derive(Debug)]
pub struct CalloutQueue<E> {
    queue: BTreeMap<(Timestamp, TimerId), E>,
    live: HashSet<TimerId>,
    next_id: u64,
}

impl<E> Default for CalloutQueue<E> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            live: HashSet::new(),
            next_id: 0,
        }
    }
}

impl<E> CalloutQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer firing at `deadline`.
    pub fn schedule(&mut self, deadline: Timestamp, event: E) -> TimerHandle {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((deadline, id), event);
        self.live.insert(id);
        TimerHandle { id, deadline }
    }

    /// Disarm a timer. Returns its event if it had not fired yet.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<E> {
        if !self.live.remove(&handle.id) {
            return None;
        }
        self.queue.remove(&(handle.deadline, handle.id))
    }

    /// Remove and return every timer due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Timestamp) -> Vec<Fired<E>> {
        let mut fired = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (deadline, id) = *entry.key();
            if deadline > now {
                break;
            }
            let event = entry.remove();
            self.live.remove(&id);
            fired.push(Fired {
                id,
                deadline,
                event,
            });
        }
        fired
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.live.contains(&id)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
