//! xeth device state synchronizer
//!
//! Mirrors the interface topology of the xeth switch multiplexer driver from
//! its binary notification stream. Every port, VLAN, bridge and LAG the
//! driver exposes is tracked by its stable [`Xid`], together with the
//! namespace and kernel index it currently lives at.
//!
//! # Architecture
//!
//! ```text
//! driver datagram ──▶ Msg::decode ──▶ Reconciler ──┬──▶ LinkRegistry (Xid → Link)
//!                                                  ├──▶ NetNsTable   (netns, ifindex → Xid)
//!                                                  └──▶ Note         (to the caller)
//! ```
//!
//! # Control Mappings
//!
//! | Control | Description | Implementation |
//! |---------|-------------|----------------|
//! | CM-8 | System Component Inventory | Registry of every driver device |
//! | SI-4 | System Monitoring | Lifecycle notes and Prometheus counters |
//! | SI-10 | Input Validation | Header and enum checks in the codec |

pub mod engine;
pub mod error;
pub mod link;
pub mod metrics;
pub mod msg;
pub mod netns;
pub mod note;
pub mod registry;
pub mod types;

pub use engine::Reconciler;
pub use error::{DecodeError, Result, XethError};
pub use link::{Identity, Link, LinkState, LiveState, Provisional};
pub use metrics::MetricsCollector;
pub use msg::{IfInfo, IfInfoReason, MSG_VERSION, Msg, MsgKind};
pub use netns::{IfIndexTable, NetNsTable};
pub use note::Note;
pub use registry::LinkRegistry;
pub use types::{DevKind, Encap, IfFlags, KindData, MacAddress, NetNs, Xid};
