//! Multicast group membership collaborator.

use std::collections::HashMap;
use std::net::Ipv6Addr;

use super::error::Result;
use super::interface::IfIndex;

/// Group membership operations used by the stack. Joins and leaves are
/// balanced: every join is eventually matched by one leave.
pub trait MulticastGroups {
    /// Join `group` on `iface`.
    fn join(&mut self, iface: IfIndex, group: Ipv6Addr) -> Result<()>;

    /// Leave `group` on `iface`.
    fn leave(&mut self, iface: IfIndex, group: Ipv6Addr) -> Result<()>;
}

/// Reference-counted membership table.
///
/// Two addresses sharing their low 24 bits share a solicited-node group;
/// the group stays joined until both have left.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    members: HashMap<(IfIndex, Ipv6Addr), usize>,
}

impl GroupTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `iface` is a member of `group`.
    pub fn is_member(&self, iface: IfIndex, group: &Ipv6Addr) -> bool {
        self.members.contains_key(&(iface, *group))
    }

    /// Number of joins outstanding for `group` on `iface`.
    pub fn refcount(&self, iface: IfIndex, group: &Ipv6Addr) -> usize {
        self.members.get(&(iface, *group)).copied().unwrap_or(0)
    }

    /// Groups joined on `iface`.
    pub fn groups(&self, iface: IfIndex) -> Vec<Ipv6Addr> {
        let mut groups: Vec<_> = self
            .members
            .keys()
            .filter(|(i, _)| *i == iface)
            .map(|(_, g)| *g)
            .collect();
        groups.sort();
        groups
    }
}

impl MulticastGroups for GroupTable {
    fn join(&mut self, iface: IfIndex, group: Ipv6Addr) -> Result<()> {
        *self.members.entry((iface, group)).or_insert(0) += 1;
        Ok(())
    }

    fn leave(&mut self, iface: IfIndex, group: Ipv6Addr) -> Result<()> {
        if let Some(count) = self.members.get_mut(&(iface, group)) {
            *count -= 1;
            if *count == 0 {
                self.members.remove(&(iface, group));
            }
        }
        Ok(())
    }
}
