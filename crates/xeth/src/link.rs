//! Mirror record of one driver network interface.
//!
//! A [`Link`] is split in two parts:
//!
//! - [`Identity`]: name, kind and hardware address. Bound once, the first
//!   time a dump carrying a name is seen, and never rewritten afterwards.
//!   Until then kind and address are held provisionally and follow every
//!   unnamed dump.
//! - [`LiveState`]: index, namespace, flags, features, kind data and
//!   upper/lower relations. Refreshed by every message that touches them.

use crate::types::{DevKind, IfFlags, KindData, MacAddress, NetNs, Xid};
use serde::Serialize;
use std::collections::BTreeSet;

/// Static identity of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub kind: DevKind,
    pub hardware_addr: MacAddress,
}

/// Kind and address reported by dumps that arrived before any name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Provisional {
    pub kind: DevKind,
    pub hardware_addr: MacAddress,
}

/// Mutable per-device state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveState {
    /// Kernel index within `netns`, renumbered on every move
    pub ifindex: i32,
    pub netns: NetNs,
    pub flags: IfFlags,
    pub features: u64,
    pub kind_data: KindData,
    /// Devices this one is enslaved to (bridge, LAG)
    pub uppers: BTreeSet<Xid>,
    /// Devices enslaved to this one
    pub lowers: BTreeSet<Xid>,
}

/// Explicit lifecycle of a registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    /// Created, but no dump with a name has been applied yet
    Unnamed,
    /// Identity bound
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    xid: Xid,
    identity: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provisional: Option<Provisional>,
    live: LiveState,
}

impl Link {
    /// Create an unnamed record bound to `xid`
    pub fn new(xid: Xid) -> Self {
        Self {
            xid,
            identity: None,
            provisional: None,
            live: LiveState::default(),
        }
    }

    pub fn xid(&self) -> Xid {
        self.xid
    }

    pub fn state(&self) -> LinkState {
        if self.identity.is_some() {
            LinkState::Named
        } else {
            LinkState::Unnamed
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Interface name, empty until the identity is bound
    pub fn name(&self) -> &str {
        self.identity.as_ref().map_or("", |id| id.name.as_str())
    }

    pub fn kind(&self) -> DevKind {
        match (&self.identity, &self.provisional) {
            (Some(id), _) => id.kind,
            (None, Some(p)) => p.kind,
            (None, None) => DevKind::Unspec,
        }
    }

    pub fn hardware_addr(&self) -> MacAddress {
        match (&self.identity, &self.provisional) {
            (Some(id), _) => id.hardware_addr,
            (None, Some(p)) => p.hardware_addr,
            (None, None) => MacAddress::ZERO,
        }
    }

    pub fn live(&self) -> &LiveState {
        &self.live
    }

    pub fn ifindex(&self) -> i32 {
        self.live.ifindex
    }

    pub fn netns(&self) -> NetNs {
        self.live.netns
    }

    pub fn flags(&self) -> IfFlags {
        self.live.flags
    }

    pub fn is_up(&self) -> bool {
        self.live.flags.contains(IfFlags::UP)
    }

    pub fn features(&self) -> u64 {
        self.live.features
    }

    pub fn kind_data(&self) -> KindData {
        self.live.kind_data
    }

    pub fn uppers(&self) -> impl Iterator<Item = Xid> + '_ {
        self.live.uppers.iter().copied()
    }

    pub fn lowers(&self) -> impl Iterator<Item = Xid> + '_ {
        self.live.lowers.iter().copied()
    }

    /// Bind the identity unless one is already bound.
    ///
    /// Returns `false`, leaving the record untouched, on a second bind.
    pub(crate) fn bind_identity(&mut self, identity: Identity) -> bool {
        if self.identity.is_some() {
            return false;
        }
        self.identity = Some(identity);
        self.provisional = None;
        true
    }

    /// Record kind and address from an unnamed dump.
    ///
    /// Returns `false`, leaving the record untouched, once the identity is
    /// bound.
    pub(crate) fn refresh_provisional(&mut self, provisional: Provisional) -> bool {
        if self.identity.is_some() {
            return false;
        }
        self.provisional = Some(provisional);
        true
    }

    pub(crate) fn live_mut(&mut self) -> &mut LiveState {
        &mut self.live
    }
}
