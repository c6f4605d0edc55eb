//! Identifier and value types shared by the registry, namespace index and codec.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum interface name length, including the terminating NUL.
pub const IFNAMSIZ: usize = 16;

/// Length of a link-layer (Ethernet) address.
pub const ETH_ALEN: usize = 6;

/// Stable device identity assigned by the driver.
///
/// An `Xid` survives namespace moves and kernel index renumbering; it is the
/// primary key of the [`LinkRegistry`](crate::LinkRegistry).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Xid(pub u32);

impl Xid {
    /// The null device; mapping an index to it clears the mapping.
    pub const NULL: Xid = Xid(0);

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Xid {
    fn from(xid: u32) -> Self {
        Xid(xid)
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network namespace cookie.
///
/// The driver reports the initial namespace as `1` and every other namespace
/// by its inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetNs(pub u64);

impl NetNs {
    /// Namespace a device falls back to once unregistered from its own.
    pub const DEFAULT: NetNs = NetNs(1);

    #[inline]
    pub const fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT.0
    }
}

impl Default for NetNs {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u64> for NetNs {
    fn from(net: u64) -> Self {
        NetNs(net)
    }
}

impl fmt::Display for NetNs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device category reported by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum DevKind {
    #[default]
    Unspec = 0,
    /// Front-panel port
    Port = 1,
    Vlan = 2,
    Bridge = 3,
    /// Link aggregation
    Lag = 4,
    /// Loopback channel
    Loopback = 5,
}

impl DevKind {
    /// Create from the wire value, `None` if out of range
    pub fn from_wire(kind: u8) -> Option<Self> {
        match kind {
            0 => Some(Self::Unspec),
            1 => Some(Self::Port),
            2 => Some(Self::Vlan),
            3 => Some(Self::Bridge),
            4 => Some(Self::Lag),
            5 => Some(Self::Loopback),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspec => "unspec",
            Self::Port => "port",
            Self::Vlan => "vlan",
            Self::Bridge => "bridge",
            Self::Lag => "lag",
            Self::Loopback => "loopback",
        }
    }
}

impl fmt::Display for DevKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 48-bit link-layer address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; ETH_ALEN]);

impl MacAddress {
    pub const ZERO: Self = Self([0; ETH_ALEN]);

    pub const fn new(bytes: [u8; ETH_ALEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ETH_ALEN] {
        &self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

bitflags! {
    /// Standard interface flags (IFF_* from linux/if.h).
    ///
    /// Bits without a name here are retained as received.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct IfFlags: u32 {
        const UP = 1 << 0;
        const BROADCAST = 1 << 1;
        const DEBUG = 1 << 2;
        const LOOPBACK = 1 << 3;
        const POINTOPOINT = 1 << 4;
        const NOTRAILERS = 1 << 5;
        const RUNNING = 1 << 6;
        const NOARP = 1 << 7;
        const PROMISC = 1 << 8;
        const ALLMULTI = 1 << 9;
        const MASTER = 1 << 10;
        const SLAVE = 1 << 11;
        const MULTICAST = 1 << 12;
        const LOWER_UP = 1 << 16;
        const DORMANT = 1 << 17;
    }
}

/// Encapsulation used by the multiplexer for VLAN devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encap {
    Vlan,
    Vpls,
}

/// Kind-specific payload carried by every interface-info record.
///
/// The driver fills it with the mux encapsulation for VLAN devices and the
/// channel number for loopback-channel devices; it is zero otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindData(pub u32);

impl KindData {
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Interpret as mux encapsulation (meaningful for [`DevKind::Vlan`])
    pub fn encap(&self) -> Option<Encap> {
        match self.0 {
            0 => Some(Encap::Vlan),
            1 => Some(Encap::Vpls),
            _ => None,
        }
    }

    /// Interpret as loopback channel (meaningful for [`DevKind::Loopback`])
    pub fn channel(&self) -> u32 {
        self.0
    }
}

/// Decode a NUL-terminated, fixed-width interface name buffer.
///
/// Everything from the first NUL on is ignored; a buffer without NUL is taken
/// whole. Invalid UTF-8 is replaced rather than rejected.
pub fn ifname_from_bytes(buf: &[u8]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Encode an interface name into a fixed-width buffer, truncating to leave
/// room for the terminating NUL.
pub fn ifname_to_bytes(name: &str) -> [u8; IFNAMSIZ] {
    let mut buf = [0u8; IFNAMSIZ];
    let bytes = name.as_bytes();
    let n = bytes.len().min(IFNAMSIZ - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xid_null() {
        assert!(Xid::NULL.is_null());
        assert!(!Xid(7).is_null());
        assert_eq!(Xid(7).to_string(), "7");
    }

    #[test]
    fn test_netns_default() {
        assert!(NetNs::default().is_default());
        assert!(!NetNs(42).is_default());
    }

    #[test]
    fn test_dev_kind_from_wire() {
        assert_eq!(DevKind::from_wire(1), Some(DevKind::Port));
        assert_eq!(DevKind::from_wire(5), Some(DevKind::Loopback));
        assert_eq!(DevKind::from_wire(6), None);
        assert_eq!(DevKind::Lag.to_string(), "lag");
    }

    #[test]
    fn test_mac_display() {
        let mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(mac.to_string(), "00:11:22:33:44:55");
        assert!(MacAddress::ZERO.is_zero());
    }

    #[test]
    fn test_ifname_stops_at_nul() {
        let mut buf = [0u8; IFNAMSIZ];
        buf[..4].copy_from_slice(b"swp1");
        buf[5] = b'x';
        assert_eq!(ifname_from_bytes(&buf), "swp1");
    }

    #[test]
    fn test_ifname_without_nul() {
        assert_eq!(ifname_from_bytes(b"abcd"), "abcd");
        assert_eq!(ifname_from_bytes(&[0u8; IFNAMSIZ]), "");
    }

    #[test]
    fn test_ifname_to_bytes_truncates() {
        let buf = ifname_to_bytes("a-very-long-interface-name");
        assert_eq!(buf[IFNAMSIZ - 1], 0);
        assert_eq!(ifname_from_bytes(&buf).len(), IFNAMSIZ - 1);
    }

    #[test]
    fn test_if_flags_retain_unknown_bits() {
        let mut flags = IfFlags::from_bits_retain(0x8000_0000 | IfFlags::BROADCAST.bits());
        flags.insert(IfFlags::UP);
        assert_eq!(flags.bits(), 0x8000_0003);
        flags.remove(IfFlags::UP);
        assert_eq!(flags.bits(), 0x8000_0002);
    }

    #[test]
    fn test_kind_data_encap() {
        assert_eq!(KindData(0).encap(), Some(Encap::Vlan));
        assert_eq!(KindData(1).encap(), Some(Encap::Vpls));
        assert_eq!(KindData(9).encap(), None);
        assert_eq!(KindData(3).channel(), 3);
    }
}
