//! Neighbor cache.
//!
//! One [`NeighborCache`] per interface holds a fixed number of
//! [`NeighborEntry`] records in a slot arena. Entries are addressed by
//! [`NeighborId`] (slot + generation), so a timer holding the id of an
//! entry that was deleted and whose slot was reused cannot reach the new
//! occupant.
//!
//! An entry's link-layer address and its pending-packet queue live inside
//! its state: an `Incomplete` entry has a queue and no link address, every
//! other state has a link address and no queue.

use std::collections::VecDeque;
use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::Bytes;

use super::arena::{SlotArena, SlotId};
use super::types::{LinkAddr, NeighborState};

/// Handle to a neighbor cache entry.
pub type NeighborId = SlotId;

/// Bounded FIFO of packets awaiting resolution. The oldest packet is
/// dropped on overflow.
#[derive(Debug, Clone)]
pub struct PacketQueue {
    packets: VecDeque<Bytes>,
    capacity: usize,
}

impl PacketQueue {
    /// Create an empty queue.
    pub fn new(capacity: usize) -> Self {
        Self {
            packets: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a packet, returning the packet dropped to make room.
    pub fn push(&mut self, packet: Bytes) -> Option<Bytes> {
        if self.capacity == 0 {
            return Some(packet);
        }
        let dropped = if self.packets.len() >= self.capacity {
            self.packets.pop_front()
        } else {
            None
        };
        self.packets.push_back(packet);
        dropped
    }

    /// Oldest queued packet.
    pub fn front(&self) -> Option<&Bytes> {
        self.packets.front()
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Take all packets in FIFO order.
    pub fn drain(&mut self) -> Vec<Bytes> {
        self.packets.drain(..).collect()
    }
}

#[derive(Debug, Clone)]
enum Reachability {
    Incomplete(PacketQueue),
    Reachable(LinkAddr),
    Stale(LinkAddr),
    Delay(LinkAddr),
    Probe(LinkAddr),
}

impl Reachability {
    fn with_link_addr(state: NeighborState, addr: LinkAddr) -> Option<Self> {
        Some(match state {
            NeighborState::Incomplete => return None,
            NeighborState::Reachable => Reachability::Reachable(addr),
            NeighborState::Stale => Reachability::Stale(addr),
            NeighborState::Delay => Reachability::Delay(addr),
            NeighborState::Probe => Reachability::Probe(addr),
        })
    }

    fn link_addr(&self) -> Option<LinkAddr> {
        match self {
            Reachability::Incomplete(_) => None,
            Reachability::Reachable(a)
            | Reachability::Stale(a)
            | Reachability::Delay(a)
            | Reachability::Probe(a) => Some(*a),
        }
    }
}

// ============================================================================
// Neighbor Entry
// ============================================================================

/// Reachability record for one on-link neighbor.
#[derive(Debug, Clone)]
pub struct NeighborEntry {
    addr: Ipv6Addr,
    reach: Reachability,
    pub(crate) permanent: bool,
    pub(crate) router: bool,
    pub(crate) confirmed_at: Option<Duration>,
    pub(crate) used_at: Duration,
    pub(crate) unanswered_probes: u8,
    pub(crate) probe_seq: u32,
    pub(crate) resolve_seq: u32,
    pub(crate) resends: u8,
}

impl NeighborEntry {
    fn with_reach(addr: Ipv6Addr, reach: Reachability, now: Duration) -> Self {
        Self {
            addr,
            reach,
            permanent: false,
            router: false,
            confirmed_at: None,
            used_at: now,
            unanswered_probes: 0,
            probe_seq: 0,
            resolve_seq: 0,
            resends: 0,
        }
    }

    /// A new entry awaiting resolution.
    pub fn incomplete(addr: Ipv6Addr, queue_capacity: usize, now: Duration) -> Self {
        Self::with_reach(
            addr,
            Reachability::Incomplete(PacketQueue::new(queue_capacity)),
            now,
        )
    }

    /// A new entry learned from an unconfirmed source (e.g. a solicitation).
    pub fn stale(addr: Ipv6Addr, link_addr: LinkAddr, now: Duration) -> Self {
        Self::with_reach(addr, Reachability::Stale(link_addr), now)
    }

    /// A permanent entry that never ages or gets probed.
    pub fn permanent(addr: Ipv6Addr, link_addr: LinkAddr, now: Duration) -> Self {
        let mut entry = Self::with_reach(addr, Reachability::Reachable(link_addr), now);
        entry.permanent = true;
        entry.confirmed_at = Some(now);
        entry
    }

    /// Neighbor address.
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    /// Reachability state.
    pub fn state(&self) -> NeighborState {
        match self.reach {
            Reachability::Incomplete(_) => NeighborState::Incomplete,
            Reachability::Reachable(_) => NeighborState::Reachable,
            Reachability::Stale(_) => NeighborState::Stale,
            Reachability::Delay(_) => NeighborState::Delay,
            Reachability::Probe(_) => NeighborState::Probe,
        }
    }

    /// Cached link-layer address; `None` exactly while `Incomplete`.
    pub fn link_addr(&self) -> Option<LinkAddr> {
        self.reach.link_addr()
    }

    /// Check if the entry never ages out.
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Check if the neighbor advertised itself as a router.
    pub fn is_router(&self) -> bool {
        self.router
    }

    /// Time of the last reachability confirmation.
    pub fn confirmed_at(&self) -> Option<Duration> {
        self.confirmed_at
    }

    /// Time of the last send through this entry.
    pub fn used_at(&self) -> Duration {
        self.used_at
    }

    /// Unicast probes sent without an answer.
    pub fn unanswered_probes(&self) -> u8 {
        self.unanswered_probes
    }

    /// Nonzero while a NUD timer is outstanding.
    pub fn probe_seq(&self) -> u32 {
        self.probe_seq
    }

    /// Nonzero while resolution is in progress.
    pub fn resolve_seq(&self) -> u32 {
        self.resolve_seq
    }

    /// Resolution solicitations sent.
    pub fn resends(&self) -> u8 {
        self.resends
    }

    /// Packets awaiting resolution.
    pub fn queued(&self) -> usize {
        match &self.reach {
            Reachability::Incomplete(queue) => queue.len(),
            _ => 0,
        }
    }

    /// Source address of the oldest queued packet.
    pub(crate) fn queued_source(&self) -> Option<Ipv6Addr> {
        match &self.reach {
            Reachability::Incomplete(queue) => {
                let packet = queue.front()?;
                let src: [u8; 16] = packet.get(8..24)?.try_into().ok()?;
                Some(Ipv6Addr::from(src))
            }
            _ => None,
        }
    }

    /// Queue a packet while `Incomplete`. Returns the packet that was
    /// dropped: the oldest one on overflow, or `packet` itself when the
    /// entry is not awaiting resolution.
    pub(crate) fn enqueue(&mut self, packet: Bytes) -> Option<Bytes> {
        match &mut self.reach {
            Reachability::Incomplete(queue) => queue.push(packet),
            _ => Some(packet),
        }
    }

    /// Leave `Incomplete` with `link_addr` in `state`, handing back the
    /// queued packets in FIFO order.
    pub(crate) fn complete(
        &mut self,
        link_addr: LinkAddr,
        state: NeighborState,
        now: Duration,
    ) -> Vec<Bytes> {
        let Some(reach) = Reachability::with_link_addr(state, link_addr) else {
            return Vec::new();
        };
        let old = std::mem::replace(&mut self.reach, reach);
        if state == NeighborState::Reachable {
            self.confirmed_at = Some(now);
        }
        self.resolve_seq = 0;
        self.resends = 0;
        match old {
            Reachability::Incomplete(mut queue) => queue.drain(),
            _ => Vec::new(),
        }
    }

    /// Move between link-address-bearing states. No-op while `Incomplete`.
    pub(crate) fn set_state(&mut self, state: NeighborState) -> bool {
        let Some(addr) = self.reach.link_addr() else {
            return false;
        };
        match Reachability::with_link_addr(state, addr) {
            Some(reach) => {
                self.reach = reach;
                true
            }
            None => false,
        }
    }

    /// Replace the cached link address, keeping the state. No-op while `Incomplete`.
    pub(crate) fn set_link_addr(&mut self, link_addr: LinkAddr) {
        if let Some(reach) = Reachability::with_link_addr(self.state(), link_addr) {
            self.reach = reach;
        }
    }

    /// Mark reachable as of `now`.
    pub(crate) fn confirm(&mut self, now: Duration) -> bool {
        if self.set_state(NeighborState::Reachable) {
            self.confirmed_at = Some(now);
            true
        } else {
            false
        }
    }

    /// Forget NUD probe bookkeeping.
    pub(crate) fn clear_probe(&mut self) {
        self.probe_seq = 0;
        self.unanswered_probes = 0;
    }

    /// Drop everything queued, returning how many packets were lost.
    pub(crate) fn discard_queue(&mut self) -> usize {
        match &mut self.reach {
            Reachability::Incomplete(queue) => queue.drain().len(),
            _ => 0,
        }
    }
}

// ============================================================================
// Neighbor Cache
// ============================================================================

/// Fixed-capacity neighbor cache for one interface.
pub struct NeighborCache {
    entries: SlotArena<NeighborEntry>,
    queue_capacity: usize,
}

impl NeighborCache {
    /// Create a cache of `capacity` entries, each queueing up to
    /// `queue_capacity` packets during resolution.
    pub fn new(capacity: usize, queue_capacity: usize) -> Self {
        Self {
            entries: SlotArena::with_capacity(capacity),
            queue_capacity,
        }
    }

    /// Per-entry queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if no entry can be added without eviction.
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Find the entry for `addr`.
    pub fn find(&self, addr: &Ipv6Addr) -> Option<NeighborId> {
        self.entries
            .iter()
            .find(|(_, e)| e.addr == *addr)
            .map(|(id, _)| id)
    }

    /// Get an entry by id.
    pub fn get(&self, id: NeighborId) -> Option<&NeighborEntry> {
        self.entries.get(id)
    }

    /// Get an entry by id mutably.
    pub fn get_mut(&mut self, id: NeighborId) -> Option<&mut NeighborEntry> {
        self.entries.get_mut(id)
    }

    /// Get the entry for `addr`.
    pub fn get_by_addr(&self, addr: &Ipv6Addr) -> Option<&NeighborEntry> {
        self.find(addr).and_then(|id| self.entries.get(id))
    }

    /// Insert an entry, handing it back if the cache is full.
    pub fn insert(&mut self, entry: NeighborEntry) -> Result<NeighborId, NeighborEntry> {
        self.entries.insert(entry)
    }

    /// Remove an entry.
    pub fn remove(&mut self, id: NeighborId) -> Option<NeighborEntry> {
        self.entries.remove(id)
    }

    /// Least recently used entry that is not permanent, resolving, a router
    /// or otherwise `protected`.
    pub fn eviction_candidate<F>(&self, protected: F) -> Option<NeighborId>
    where
        F: Fn(&NeighborEntry) -> bool,
    {
        self.entries
            .iter()
            .filter(|(_, e)| !e.permanent && !e.router && e.resolve_seq == 0 && !protected(e))
            .min_by_key(|(_, e)| e.used_at)
            .map(|(id, _)| id)
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = (NeighborId, &NeighborEntry)> {
        self.entries.iter()
    }

    /// Iterate mutably over entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NeighborId, &mut NeighborEntry)> {
        self.entries.iter_mut()
    }

    /// Ids of all entries.
    pub fn ids(&self) -> Vec<NeighborId> {
        self.entries.iter().map(|(id, _)| id).collect()
    }
}
