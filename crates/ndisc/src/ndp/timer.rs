//! Keyed one-shot timers on a virtual clock.
//!
//! Every timer is identified by a [`TimerKey`] naming the record it belongs
//! to. Arming an already-armed key replaces its deadline; disarming by key
//! is how owners cancel timers before freeing a record. Time only moves when
//! the driver calls [`TimerQueue::pop_due`] with a new "now", so the same
//! queue runs under the tokio worker and under deterministic tests.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::address::AddressId;
use super::interface::IfIndex;
use super::neighbor::NeighborId;

/// Identity of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// DAD retransmission / decision for an address.
    Dad { iface: IfIndex, addr: AddressId },
    /// Secondary verification of an address.
    Verify { iface: IfIndex, addr: AddressId },
    /// Delayed solicited-node group join.
    Join { iface: IfIndex, addr: AddressId },
    /// Preferred lifetime expiry.
    Deprecate { iface: IfIndex, addr: AddressId },
    /// Valid lifetime expiry.
    Expire { iface: IfIndex, addr: AddressId },
    /// Periodic reachable-to-stale sweep.
    Sweep { iface: IfIndex },
    /// NUD delay/probe timer for a neighbor.
    Probe {
        iface: IfIndex,
        neighbor: NeighborId,
        seq: u32,
    },
    /// Address resolution retransmission for a neighbor.
    Resolve {
        iface: IfIndex,
        neighbor: NeighborId,
        seq: u32,
    },
}

impl TimerKey {
    /// Interface the timer belongs to.
    pub fn iface(&self) -> IfIndex {
        match *self {
            TimerKey::Dad { iface, .. }
            | TimerKey::Verify { iface, .. }
            | TimerKey::Join { iface, .. }
            | TimerKey::Deprecate { iface, .. }
            | TimerKey::Expire { iface, .. }
            | TimerKey::Sweep { iface }
            | TimerKey::Probe { iface, .. }
            | TimerKey::Resolve { iface, .. } => iface,
        }
    }
}

/// Deadline-ordered timer queue.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    seq: u64,
    pending: BTreeMap<(Duration, u64), TimerKey>,
    index: HashMap<TimerKey, (Duration, u64)>,
}

impl TimerQueue {
    /// Create an empty queue at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arm `key` to fire `delay` from now, replacing any earlier arming.
    pub fn arm(&mut self, key: TimerKey, delay: Duration) {
        self.disarm(&key);
        let slot = (self.now + delay, self.seq);
        self.seq += 1;
        self.pending.insert(slot, key);
        self.index.insert(key, slot);
    }

    /// Cancel `key`. Returns whether it was armed.
    pub fn disarm(&mut self, key: &TimerKey) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.pending.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Check whether `key` is armed.
    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.index.contains_key(key)
    }

    /// Time remaining until `key` fires.
    pub fn remaining(&self, key: &TimerKey) -> Option<Duration> {
        self.index
            .get(key)
            .map(|(deadline, _)| deadline.saturating_sub(self.now))
    }

    /// Earliest deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pop the earliest timer due at or before `until`, moving the clock
    /// to its deadline. When nothing is due the clock moves to `until`.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerKey> {
        let Some((&slot, _)) = self.pending.iter().next() else {
            self.now = self.now.max(until);
            return None;
        };
        if slot.0 > until {
            self.now = self.now.max(until);
            return None;
        }
        let key = self.pending.remove(&slot)?;
        self.index.remove(&key);
        self.now = self.now.max(slot.0);
        Some(key)
    }

    /// Move the clock to `until` without firing anything.
    pub fn set_now(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}
