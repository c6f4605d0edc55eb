//! Concurrent registry of driver devices keyed by [`Xid`].
//!
//! Readers get cloned snapshots, so a [`Link`] is never observed half
//! updated. Writers to the same `Xid` are serialized by the map entry; writers
//! to different keys only contend when their keys share a shard.

use crate::link::Link;
use crate::metrics::MetricsCollector;
use crate::types::Xid;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::warn;

#[derive(Debug, Default)]
pub struct LinkRegistry {
    links: DashMap<Xid, Link>,
    metrics: Option<MetricsCollector>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry reporting unknown-device lookups to `metrics`
    pub fn with_metrics(metrics: MetricsCollector) -> Self {
        Self {
            links: DashMap::new(),
            metrics: Some(metrics),
        }
    }

    /// Snapshot of the record for `xid`
    pub fn lookup(&self, xid: Xid) -> Option<Link> {
        self.links.get(&xid).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, xid: Xid) -> bool {
        self.links.contains_key(&xid)
    }

    /// Create or replace the full record, keyed by its own `Xid`.
    ///
    /// Returns the replaced record, if any.
    pub fn store(&self, link: Link) -> Option<Link> {
        let previous = self.links.insert(link.xid(), link);
        if previous.is_none() {
            self.link_added();
        }
        previous
    }

    /// Lookup for paths that require an existing record.
    ///
    /// A miss is not an error: it is logged and counted under `context`.
    pub fn expect(&self, xid: Xid, context: &str) -> Option<Link> {
        let link = self.lookup(xid);
        if link.is_none() {
            self.report_missing(xid, context);
        }
        link
    }

    /// Drop a record. The reconciler never does this itself; it is left to
    /// consumers acting on a deletion note.
    pub fn remove(&self, xid: Xid) -> Option<Link> {
        let removed = self.links.remove(&xid).map(|(_, link)| link);
        if removed.is_some() {
            self.link_removed();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All current `(Xid, Link)` pairs, ordered by `Xid`
    pub fn snapshot(&self) -> Vec<(Xid, Link)> {
        let mut links: Vec<_> = self
            .links
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        links.sort_by_key(|(xid, _)| *xid);
        links
    }

    /// Mutate the record for `xid` inside its critical section, creating it
    /// first when absent. `f` receives `true` for a freshly created record.
    ///
    /// `f` must not call back into this registry.
    pub(crate) fn upsert<R>(&self, xid: Xid, f: impl FnOnce(&mut Link, bool) -> R) -> R {
        let mut created = false;
        let result = {
            let mut entry = self.links.entry(xid).or_insert_with(|| {
                created = true;
                Link::new(xid)
            });
            f(entry.value_mut(), created)
        };
        if created {
            self.link_added();
        }
        result
    }

    /// Mutate an existing record inside its critical section. A missing
    /// record is reported under `context` and `f` is not run.
    ///
    /// `f` must not call back into this registry.
    pub(crate) fn update_expected<R>(
        &self,
        xid: Xid,
        context: &str,
        f: impl FnOnce(&mut Link) -> R,
    ) -> Option<R> {
        let result = self.links.get_mut(&xid).map(|mut entry| f(entry.value_mut()));
        if result.is_none() {
            self.report_missing(xid, context);
        }
        result
    }

    /// Like [`update_expected`](Self::update_expected), but runs `absent`
    /// while the vacant entry for `xid` is still held, so no record for `xid`
    /// can appear until `absent` returns.
    ///
    /// Neither closure may call back into this registry.
    pub(crate) fn update_or_else<R>(
        &self,
        xid: Xid,
        context: &str,
        present: impl FnOnce(&mut Link) -> R,
        absent: impl FnOnce() -> R,
    ) -> R {
        let (result, found) = match self.links.entry(xid) {
            Entry::Occupied(mut entry) => (present(entry.get_mut()), true),
            Entry::Vacant(entry) => {
                let result = absent();
                drop(entry);
                (result, false)
            }
        };
        if !found {
            self.report_missing(xid, context);
        }
        result
    }

    fn report_missing(&self, xid: Xid, context: &str) {
        warn!(xid = %xid, context, "no link for xid");
        if let Some(metrics) = &self.metrics {
            metrics.record_unknown_device(context);
        }
    }

    fn link_added(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.link_added();
        }
    }

    fn link_removed(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.link_removed();
        }
    }
}
