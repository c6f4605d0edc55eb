//! Per-namespace reverse index from kernel ifindex to [`Xid`].
//!
//! Kernel indices are only unique within a namespace and are reassigned on
//! every move, so each namespace owns its own [`IfIndexTable`]. An ifindex of
//! zero or below never maps to a device.

use crate::types::{NetNs, Xid};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Index table of one namespace
#[derive(Debug, Default)]
pub struct IfIndexTable {
    by_index: RwLock<HashMap<i32, Xid>>,
}

impl IfIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `ifindex -> xid`, or clear it when `xid` is [`Xid::NULL`].
    ///
    /// Clearing an index that was never set is a no-op.
    pub fn set_mapping(&self, ifindex: i32, xid: Xid) {
        if ifindex <= 0 {
            return;
        }
        let mut by_index = self.by_index.write();
        if xid.is_null() {
            by_index.remove(&ifindex);
        } else {
            by_index.insert(ifindex, xid);
        }
    }

    /// Clear `ifindex` only while it still resolves to `xid`.
    ///
    /// Returns whether a mapping was removed.
    pub fn release(&self, ifindex: i32, xid: Xid) -> bool {
        let mut by_index = self.by_index.write();
        if by_index.get(&ifindex) == Some(&xid) {
            by_index.remove(&ifindex);
            true
        } else {
            false
        }
    }

    /// Device at `ifindex`, [`Xid::NULL`] when unmapped
    pub fn resolve(&self, ifindex: i32) -> Xid {
        self.by_index
            .read()
            .get(&ifindex)
            .copied()
            .unwrap_or(Xid::NULL)
    }

    pub fn len(&self) -> usize {
        self.by_index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.read().is_empty()
    }

    /// `(ifindex, xid)` pairs ordered by ifindex
    pub fn entries(&self) -> Vec<(i32, Xid)> {
        let mut entries: Vec<_> = self
            .by_index
            .read()
            .iter()
            .map(|(ifindex, xid)| (*ifindex, *xid))
            .collect();
        entries.sort_unstable();
        entries
    }
}

/// All known namespaces and their index tables.
///
/// The default namespace always exists.
#[derive(Debug)]
pub struct NetNsTable {
    spaces: DashMap<NetNs, Arc<IfIndexTable>>,
}

impl NetNsTable {
    pub fn new() -> Self {
        let spaces = DashMap::new();
        spaces.insert(NetNs::DEFAULT, Arc::new(IfIndexTable::new()));
        Self { spaces }
    }

    /// Index table of `netns`, if known
    pub fn table(&self, netns: NetNs) -> Option<Arc<IfIndexTable>> {
        self.spaces.get(&netns).map(|t| Arc::clone(t.value()))
    }

    /// Install or clear `(netns, ifindex) -> xid`.
    ///
    /// Installing creates the namespace on first use; clearing never does.
    pub fn set_mapping(&self, netns: NetNs, ifindex: i32, xid: Xid) {
        if xid.is_null() {
            if let Some(table) = self.table(netns) {
                table.set_mapping(ifindex, xid);
            }
            return;
        }
        self.table_or_create(netns).set_mapping(ifindex, xid);
    }

    /// Clear `(netns, ifindex)` only while it still resolves to `xid`
    pub fn release(&self, netns: NetNs, ifindex: i32, xid: Xid) -> bool {
        self.table(netns)
            .is_some_and(|table| table.release(ifindex, xid))
    }

    pub fn resolve(&self, netns: NetNs, ifindex: i32) -> Xid {
        self.table(netns)
            .map_or(Xid::NULL, |table| table.resolve(ifindex))
    }

    /// Start tracking `netns`; returns `false` if it was already known
    pub fn add(&self, netns: NetNs) -> bool {
        let mut created = false;
        self.spaces.entry(netns).or_insert_with(|| {
            created = true;
            Arc::new(IfIndexTable::new())
        });
        created
    }

    /// Tear down `netns` and every mapping it holds.
    ///
    /// The default namespace is kept.
    pub fn remove(&self, netns: NetNs) -> Option<Arc<IfIndexTable>> {
        if netns.is_default() {
            debug!(netns = %netns, "refusing to drop default namespace");
            return None;
        }
        self.spaces.remove(&netns).map(|(_, table)| table)
    }

    pub fn contains(&self, netns: NetNs) -> bool {
        self.spaces.contains_key(&netns)
    }

    /// Known namespaces in ascending order
    pub fn namespaces(&self) -> Vec<NetNs> {
        let mut spaces: Vec<_> = self.spaces.iter().map(|e| *e.key()).collect();
        spaces.sort_unstable();
        spaces
    }

    fn table_or_create(&self, netns: NetNs) -> Arc<IfIndexTable> {
        let entry = self
            .spaces
            .entry(netns)
            .or_insert_with(|| Arc::new(IfIndexTable::new()));
        Arc::clone(entry.value())
    }
}

impl Default for NetNsTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_resolve() {
        let table = IfIndexTable::new();
        table.set_mapping(5, Xid(7));
        assert_eq!(table.resolve(5), Xid(7));
        assert_eq!(table.resolve(6), Xid::NULL);
    }

    #[test]
    fn test_clear_with_null() {
        let table = IfIndexTable::new();
        table.set_mapping(5, Xid(7));
        table.set_mapping(5, Xid::NULL);
        assert_eq!(table.resolve(5), Xid::NULL);
        assert!(table.is_empty());
    }

    #[test]
    fn test_clear_unset_is_noop() {
        let table = IfIndexTable::new();
        table.set_mapping(9, Xid::NULL);
        assert!(table.is_empty());
    }

    #[test]
    fn test_zero_index_never_maps() {
        let table = IfIndexTable::new();
        table.set_mapping(0, Xid(7));
        table.set_mapping(-3, Xid(7));
        assert!(table.is_empty());
        assert_eq!(table.resolve(0), Xid::NULL);
    }

    #[test]
    fn test_release_only_own_mapping() {
        let table = IfIndexTable::new();
        table.set_mapping(5, Xid(8));
        assert!(!table.release(5, Xid(7)));
        assert_eq!(table.resolve(5), Xid(8));
        assert!(table.release(5, Xid(8)));
        assert_eq!(table.resolve(5), Xid::NULL);
    }

    #[test]
    fn test_default_namespace_present() {
        let spaces = NetNsTable::new();
        assert!(spaces.contains(NetNs::DEFAULT));
        assert!(spaces.remove(NetNs::DEFAULT).is_none());
        assert!(spaces.contains(NetNs::DEFAULT));
    }

    #[test]
    fn test_install_creates_namespace() {
        let spaces = NetNsTable::new();
        spaces.set_mapping(NetNs(42), 5, Xid(7));
        assert!(spaces.contains(NetNs(42)));
        assert_eq!(spaces.resolve(NetNs(42), 5), Xid(7));
        assert_eq!(spaces.resolve(NetNs::DEFAULT, 5), Xid::NULL);
    }

    #[test]
    fn test_clear_does_not_create_namespace() {
        let spaces = NetNsTable::new();
        spaces.set_mapping(NetNs(42), 5, Xid::NULL);
        assert!(!spaces.contains(NetNs(42)));
    }

    #[test]
    fn test_remove_namespace_drops_mappings() {
        let spaces = NetNsTable::new();
        assert!(spaces.add(NetNs(42)));
        assert!(!spaces.add(NetNs(42)));
        spaces.set_mapping(NetNs(42), 5, Xid(7));
        let table = spaces.remove(NetNs(42)).unwrap();
        assert_eq!(table.entries(), vec![(5, Xid(7))]);
        assert_eq!(spaces.resolve(NetNs(42), 5), Xid::NULL);
        assert_eq!(spaces.namespaces(), vec![NetNs::DEFAULT]);
    }
}
