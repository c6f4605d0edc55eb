//! Decode/reconcile engine
//!
//! Turns one driver message into a [`LinkRegistry`] update, the matching
//! [`NetNsTable`] update and a [`Note`] for the caller to dispatch.
//!
//! Each device path runs inside the registry entry of its `Xid`. The
//! namespace index is updated before that entry is released, clearing the old
//! `(netns, ifindex)` before the new one is installed. Lock order is always
//! registry entry, then namespace table; the namespace table never calls back
//! into the registry.

use crate::error::Result;
use crate::link::{Identity, LinkState, Provisional};
use crate::metrics::MetricsCollector;
use crate::msg::{IfInfo, IfInfoReason, Msg};
use crate::netns::NetNsTable;
use crate::note::Note;
use crate::registry::LinkRegistry;
use crate::types::{IfFlags, NetNs, Xid};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
pub struct Reconciler {
    links: Arc<LinkRegistry>,
    netns: Arc<NetNsTable>,
    metrics: Option<MetricsCollector>,
    dump_done: AtomicBool,
}

impl Reconciler {
    /// Engine over an empty registry and namespace table
    pub fn new() -> Self {
        Self::from_parts(Arc::new(LinkRegistry::new()), Arc::new(NetNsTable::new()), None)
    }

    /// Engine whose registry and message handling report to `metrics`
    pub fn with_metrics(metrics: MetricsCollector) -> Self {
        Self::from_parts(
            Arc::new(LinkRegistry::with_metrics(metrics.clone())),
            Arc::new(NetNsTable::new()),
            Some(metrics),
        )
    }

    /// Engine over state owned by the caller
    pub fn from_parts(
        links: Arc<LinkRegistry>,
        netns: Arc<NetNsTable>,
        metrics: Option<MetricsCollector>,
    ) -> Self {
        Self {
            links,
            netns,
            metrics,
            dump_done: AtomicBool::new(false),
        }
    }

    pub fn links(&self) -> &Arc<LinkRegistry> {
        &self.links
    }

    pub fn netns(&self) -> &Arc<NetNsTable> {
        &self.netns
    }

    /// Whether a [`Msg::Break`] has been seen
    pub fn dump_done(&self) -> bool {
        self.dump_done.load(Ordering::Acquire)
    }

    /// Decode and apply one datagram.
    ///
    /// Malformed input is counted and returned as an error without touching
    /// any state.
    #[instrument(skip(self, buf), fields(len = buf.len()))]
    pub fn rx_bytes(&self, buf: &[u8]) -> Result<Option<Note>> {
        let msg = match Msg::decode(buf) {
            Ok(msg) => msg,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_decode_error();
                }
                return Err(e.into());
            }
        };
        Ok(self.rx(&msg))
    }

    /// Apply one decoded message. `None` only for unsupported kinds.
    #[instrument(skip(self, msg), fields(kind = msg.kind_str()))]
    pub fn rx(&self, msg: &Msg) -> Option<Note> {
        if let Some(metrics) = &self.metrics {
            metrics.record_message(msg.kind_str());
        }
        let note = match msg {
            Msg::Break => Some(self.rx_break()),
            Msg::IfInfo(info) => Some(self.rx_ifinfo(info)),
            Msg::ChangeUpper {
                upper,
                lower,
                linking,
            } => Some(self.rx_change_upper(*upper, *lower, *linking)),
            Msg::NetNsAdd(netns) => Some(self.rx_netns_add(*netns)),
            Msg::NetNsDel(netns) => Some(self.rx_netns_del(*netns)),
            Msg::Unsupported(kind) => {
                debug!(kind, "ignoring unsupported message kind");
                None
            }
        };
        if let (Some(note), Some(metrics)) = (&note, &self.metrics) {
            metrics.record_note(note.as_str());
        }
        note
    }

    /// Route an interface-info record to the path selected by its reason
    pub fn rx_ifinfo(&self, info: &IfInfo) -> Note {
        match info.reason {
            IfInfoReason::New | IfInfoReason::Dump => self.rx_dump(info),
            IfInfoReason::Del => self.rx_del(info.xid),
            IfInfoReason::Up => self.rx_up(info.xid),
            IfInfoReason::Down => self.rx_down(info.xid),
            IfInfoReason::Reg => self.rx_reg(info.xid, info.netns, info.ifindex),
            IfInfoReason::Unreg => self.rx_unreg(info.xid, info.ifindex),
            IfInfoReason::Features => self.rx_features(info.xid, info.features),
        }
    }

    /// Full dump: create on first sight, bind identity once, refresh live state.
    ///
    /// Returns [`Note::DevNew`] while the record has no name yet, otherwise
    /// [`Note::DevDump`].
    pub fn rx_dump(&self, info: &IfInfo) -> Note {
        let xid = info.xid;
        self.links.upsert(xid, |link, created| {
            if created {
                debug!(xid = %xid, "new link");
            }
            let mut note = Note::DevDump { xid };

            link.live_mut().kind_data = info.kind_data;

            if link.state() == LinkState::Unnamed {
                note = Note::DevNew { xid };
                let name = info.name();
                if name.is_empty() {
                    warn!(xid = %xid, "dump without a name, identity left unbound");
                    link.refresh_provisional(Provisional {
                        kind: info.kind,
                        hardware_addr: info.hardware_addr,
                    });
                } else {
                    link.bind_identity(Identity {
                        name,
                        kind: info.kind,
                        hardware_addr: info.hardware_addr,
                    });
                }
            }

            let old = (link.netns(), link.ifindex());
            let live = link.live_mut();
            live.ifindex = info.ifindex;
            live.netns = info.netns;
            live.flags = info.flags;
            live.features = info.features;
            self.move_mapping(xid, old, (info.netns, info.ifindex));

            note
        })
    }

    pub fn rx_up(&self, xid: Xid) -> Note {
        self.links.update_expected(xid, "admin-up", |link| {
            link.live_mut().flags.insert(IfFlags::UP);
        });
        Note::DevUp { xid }
    }

    pub fn rx_down(&self, xid: Xid) -> Note {
        self.links.update_expected(xid, "admin-down", |link| {
            link.live_mut().flags.remove(IfFlags::UP);
        });
        Note::DevDown { xid }
    }

    /// Device entered `netns` at `ifindex`.
    ///
    /// The new mapping is installed even when the device is unknown, while
    /// its vacant registry entry is still held.
    pub fn rx_reg(&self, xid: Xid, netns: NetNs, ifindex: i32) -> Note {
        self.links.update_or_else(
            xid,
            "register",
            |link| {
                let old = (link.netns(), link.ifindex());
                let live = link.live_mut();
                live.netns = netns;
                live.ifindex = ifindex;
                self.move_mapping(xid, old, (netns, ifindex));
            },
            || self.netns.set_mapping(netns, ifindex, xid),
        );
        debug!(xid = %xid, netns = %netns, ifindex, "registered");
        Note::DevReg { xid }
    }

    /// Device left its namespace; it parks in the default one at the
    /// transient `ifindex`, which is not indexed.
    pub fn rx_unreg(&self, xid: Xid, ifindex: i32) -> Note {
        self.links.update_expected(xid, "unregister", |link| {
            self.netns.release(link.netns(), link.ifindex(), xid);
            let live = link.live_mut();
            live.netns = NetNs::DEFAULT;
            live.ifindex = ifindex;
        });
        Note::DevUnreg { xid }
    }

    pub fn rx_features(&self, xid: Xid, features: u64) -> Note {
        self.links.update_expected(xid, "features", |link| {
            link.live_mut().features = features;
        });
        Note::DevFeatures { xid }
    }

    /// Device deleted. The record stays; only its index mapping goes.
    pub fn rx_del(&self, xid: Xid) -> Note {
        self.links.update_expected(xid, "delete", |link| {
            self.netns.release(link.netns(), link.ifindex(), xid);
            link.live_mut().ifindex = 0;
        });
        Note::DevDel { xid }
    }

    /// `lower` joined (or left) `upper`
    pub fn rx_change_upper(&self, upper: Xid, lower: Xid, linking: bool) -> Note {
        // one entry at a time
        self.links.update_expected(lower, "change-upper", |link| {
            let uppers = &mut link.live_mut().uppers;
            if linking {
                uppers.insert(upper);
            } else {
                uppers.remove(&upper);
            }
        });
        self.links.update_expected(upper, "change-upper", |link| {
            let lowers = &mut link.live_mut().lowers;
            if linking {
                lowers.insert(lower);
            } else {
                lowers.remove(&lower);
            }
        });
        Note::DevUpper {
            upper,
            lower,
            linking,
        }
    }

    pub fn rx_netns_add(&self, netns: NetNs) -> Note {
        if !self.netns.add(netns) {
            debug!(netns = %netns, "namespace already known");
        }
        Note::NetNsAdd { netns }
    }

    /// Namespace destroyed; every index mapping it held goes with it
    pub fn rx_netns_del(&self, netns: NetNs) -> Note {
        if let Some(table) = self.netns.remove(netns) {
            info!(netns = %netns, mappings = table.len(), "namespace removed");
        }
        Note::NetNsDel { netns }
    }

    pub fn rx_break(&self) -> Note {
        if !self.dump_done.swap(true, Ordering::AcqRel) {
            info!(links = self.links.len(), "initial dump complete");
        }
        Note::Break
    }

    fn move_mapping(&self, xid: Xid, old: (NetNs, i32), new: (NetNs, i32)) {
        if old != new {
            self.netns.release(old.0, old.1, xid);
        }
        self.netns.set_mapping(new.0, new.1, xid);
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
