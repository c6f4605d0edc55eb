//! Driver message codec
//!
//! Every message is one fixed-size little-endian record that begins with a
//! 16-byte [`MsgHeader`]. Only the kinds that concern interface topology are
//! decoded here; route, neighbor and ethtool kinds come back as
//! [`Msg::Unsupported`].

use crate::error::DecodeError;
use crate::types::{
    DevKind, ETH_ALEN, IFNAMSIZ, IfFlags, KindData, MacAddress, NetNs, Xid, ifname_from_bytes,
    ifname_to_bytes,
};
use binrw::{BinRead, BinWrite, binrw};
use std::io::Cursor;

/// Protocol version carried in every header
pub const MSG_VERSION: u8 = 3;

pub const SIZEOF_HEADER: usize = 16;
pub const SIZEOF_IFINFO: usize = 72;
pub const SIZEOF_CHANGE_UPPER: usize = 32;
pub const SIZEOF_NETNS: usize = 24;

/// Message kinds understood by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgKind {
    Break = 0,
    IfInfo = 11,
    ChangeUpperXid = 16,
    NetNsAdd = 19,
    NetNsDel = 20,
}

impl MsgKind {
    pub fn from_wire(kind: u8) -> Option<Self> {
        match kind {
            0 => Some(Self::Break),
            11 => Some(Self::IfInfo),
            16 => Some(Self::ChangeUpperXid),
            19 => Some(Self::NetNsAdd),
            20 => Some(Self::NetNsDel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::IfInfo => "ifinfo",
            Self::ChangeUpperXid => "change-upper-xid",
            Self::NetNsAdd => "netns-add",
            Self::NetNsDel => "netns-del",
        }
    }

    /// Fixed record size for this kind
    pub fn size(&self) -> usize {
        match self {
            Self::Break => SIZEOF_HEADER,
            Self::IfInfo => SIZEOF_IFINFO,
            Self::ChangeUpperXid => SIZEOF_CHANGE_UPPER,
            Self::NetNsAdd | Self::NetNsDel => SIZEOF_NETNS,
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgHeader {
    pub z64: u64,
    pub z32: u32,
    pub z16: u16,
    pub version: u8,
    pub kind: u8,
}

impl MsgHeader {
    pub fn new(kind: u8) -> Self {
        Self {
            version: MSG_VERSION,
            kind,
            ..Self::default()
        }
    }

    /// Zero padding and matching protocol version
    pub fn is_valid(&self) -> bool {
        self.z64 == 0 && self.z32 == 0 && self.z16 == 0 && self.version == MSG_VERSION
    }
}

/// Raw interface-info record
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgIfInfo {
    pub header: MsgHeader,
    pub ifname: [u8; IFNAMSIZ],
    pub net: u64,
    pub ifindex: i32,
    pub xid: u32,
    pub kdata: u32,
    pub flags: u32,
    pub addr: [u8; ETH_ALEN],
    pub kind: u8,
    pub reason: u8,
    pub features: u64,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgChangeUpperXid {
    pub header: MsgHeader,
    pub upper: u32,
    pub lower: u32,
    #[brw(pad_after = 7)]
    pub linking: u8,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgNetNs {
    pub header: MsgHeader,
    pub net: u64,
}

/// Why the driver sent an interface-info record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IfInfoReason {
    New = 0,
    Del = 1,
    Up = 2,
    Down = 3,
    Dump = 4,
    Reg = 5,
    Unreg = 6,
    Features = 7,
}

impl IfInfoReason {
    pub fn from_wire(reason: u8) -> Option<Self> {
        match reason {
            0 => Some(Self::New),
            1 => Some(Self::Del),
            2 => Some(Self::Up),
            3 => Some(Self::Down),
            4 => Some(Self::Dump),
            5 => Some(Self::Reg),
            6 => Some(Self::Unreg),
            7 => Some(Self::Features),
            _ => None,
        }
    }
}

/// Validated interface-info record.
///
/// The name stays in its fixed-width buffer; the reconciler only decodes it
/// on a device's first named sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfInfo {
    pub xid: Xid,
    pub ifindex: i32,
    pub netns: NetNs,
    pub kind: DevKind,
    pub ifname: [u8; IFNAMSIZ],
    pub hardware_addr: MacAddress,
    pub flags: IfFlags,
    pub features: u64,
    pub kind_data: KindData,
    pub reason: IfInfoReason,
}

impl IfInfo {
    /// Record for `xid` with every other field zeroed, in the default namespace
    pub fn new(xid: Xid, reason: IfInfoReason) -> Self {
        Self {
            xid,
            ifindex: 0,
            netns: NetNs::DEFAULT,
            kind: DevKind::Unspec,
            ifname: [0; IFNAMSIZ],
            hardware_addr: MacAddress::ZERO,
            flags: IfFlags::empty(),
            features: 0,
            kind_data: KindData::default(),
            reason,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.ifname = ifname_to_bytes(name);
        self
    }

    pub fn with_kind(mut self, kind: DevKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_hardware_addr(mut self, addr: MacAddress) -> Self {
        self.hardware_addr = addr;
        self
    }

    pub fn with_location(mut self, netns: NetNs, ifindex: i32) -> Self {
        self.netns = netns;
        self.ifindex = ifindex;
        self
    }

    pub fn with_flags(mut self, flags: IfFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_features(mut self, features: u64) -> Self {
        self.features = features;
        self
    }

    pub fn with_kind_data(mut self, kind_data: KindData) -> Self {
        self.kind_data = kind_data;
        self
    }

    /// Decode the NUL-terminated name buffer
    pub fn name(&self) -> String {
        ifname_from_bytes(&self.ifname)
    }

    fn to_wire(&self) -> MsgIfInfo {
        MsgIfInfo {
            header: MsgHeader::new(MsgKind::IfInfo as u8),
            ifname: self.ifname,
            net: self.netns.0,
            ifindex: self.ifindex,
            xid: self.xid.0,
            kdata: self.kind_data.0,
            flags: self.flags.bits(),
            addr: self.hardware_addr.0,
            kind: self.kind as u8,
            reason: self.reason as u8,
            features: self.features,
        }
    }
}

impl TryFrom<&MsgIfInfo> for IfInfo {
    type Error = DecodeError;

    fn try_from(msg: &MsgIfInfo) -> Result<Self, Self::Error> {
        let kind = DevKind::from_wire(msg.kind).ok_or(DecodeError::UnknownDevKind(msg.kind))?;
        let reason =
            IfInfoReason::from_wire(msg.reason).ok_or(DecodeError::UnknownReason(msg.reason))?;
        Ok(Self {
            xid: Xid(msg.xid),
            ifindex: msg.ifindex,
            netns: NetNs(msg.net),
            kind,
            ifname: msg.ifname,
            hardware_addr: MacAddress(msg.addr),
            flags: IfFlags::from_bits_retain(msg.flags),
            features: msg.features,
            kind_data: KindData(msg.kdata),
            reason,
        })
    }
}

/// One decoded driver message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Break,
    IfInfo(IfInfo),
    ChangeUpper { upper: Xid, lower: Xid, linking: bool },
    NetNsAdd(NetNs),
    NetNsDel(NetNs),
    /// Valid header of a kind this crate does not handle
    Unsupported(u8),
}

impl Msg {
    /// Decode one datagram
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < SIZEOF_HEADER {
            // kind byte not reached yet
            return Err(DecodeError::Truncated {
                kind: 0,
                want: SIZEOF_HEADER,
                got: buf.len(),
            });
        }
        let mut cursor = Cursor::new(buf);
        let header = MsgHeader::read(&mut cursor)?;
        if !header.is_valid() {
            return Err(DecodeError::BadHeader {
                version: header.version,
                kind: header.kind,
            });
        }
        let Some(kind) = MsgKind::from_wire(header.kind) else {
            return Ok(Msg::Unsupported(header.kind));
        };
        if buf.len() < kind.size() {
            return Err(DecodeError::Truncated {
                kind: header.kind,
                want: kind.size(),
                got: buf.len(),
            });
        }
        cursor.set_position(0);

        let msg = match kind {
            MsgKind::Break => Msg::Break,
            MsgKind::IfInfo => {
                let raw = MsgIfInfo::read(&mut cursor)?;
                Msg::IfInfo(IfInfo::try_from(&raw)?)
            }
            MsgKind::ChangeUpperXid => {
                let raw = MsgChangeUpperXid::read(&mut cursor)?;
                Msg::ChangeUpper {
                    upper: Xid(raw.upper),
                    lower: Xid(raw.lower),
                    linking: raw.linking != 0,
                }
            }
            MsgKind::NetNsAdd => Msg::NetNsAdd(NetNs(MsgNetNs::read(&mut cursor)?.net)),
            MsgKind::NetNsDel => Msg::NetNsDel(NetNs(MsgNetNs::read(&mut cursor)?.net)),
        };
        Ok(msg)
    }

    /// Encode as the driver would send it
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        let mut cursor = Cursor::new(Vec::new());
        match self {
            Msg::Break => MsgHeader::new(MsgKind::Break as u8).write(&mut cursor)?,
            Msg::IfInfo(info) => info.to_wire().write(&mut cursor)?,
            Msg::ChangeUpper {
                upper,
                lower,
                linking,
            } => MsgChangeUpperXid {
                header: MsgHeader::new(MsgKind::ChangeUpperXid as u8),
                upper: upper.0,
                lower: lower.0,
                linking: u8::from(*linking),
            }
            .write(&mut cursor)?,
            Msg::NetNsAdd(netns) => MsgNetNs {
                header: MsgHeader::new(MsgKind::NetNsAdd as u8),
                net: netns.0,
            }
            .write(&mut cursor)?,
            Msg::NetNsDel(netns) => MsgNetNs {
                header: MsgHeader::new(MsgKind::NetNsDel as u8),
                net: netns.0,
            }
            .write(&mut cursor)?,
            Msg::Unsupported(kind) => MsgHeader::new(*kind).write(&mut cursor)?,
        }
        Ok(cursor.into_inner())
    }

    /// Label used in logs and metrics
    pub fn kind_str(&self) -> &'static str {
        match self {
            Msg::Break => MsgKind::Break.as_str(),
            Msg::IfInfo(_) => MsgKind::IfInfo.as_str(),
            Msg::ChangeUpper { .. } => MsgKind::ChangeUpperXid.as_str(),
            Msg::NetNsAdd(_) => MsgKind::NetNsAdd.as_str(),
            Msg::NetNsDel(_) => MsgKind::NetNsDel.as_str(),
            Msg::Unsupported(_) => "unsupported",
        }
    }
}
