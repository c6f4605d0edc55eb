//! Lifecycle notes returned by the reconciler for downstream dispatch.

use crate::types::{NetNs, Xid};
use serde::Serialize;
use std::fmt;

/// What a processed message meant for the device topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "note", rename_all = "kebab-case")]
pub enum Note {
    /// First dump carrying this device's name
    DevNew { xid: Xid },
    /// Refresh of an already named device
    DevDump { xid: Xid },
    DevUp { xid: Xid },
    DevDown { xid: Xid },
    /// Device entered a namespace
    DevReg { xid: Xid },
    /// Device left its namespace
    DevUnreg { xid: Xid },
    DevFeatures { xid: Xid },
    DevDel { xid: Xid },
    /// `lower` was enslaved to (or released from) `upper`
    DevUpper { upper: Xid, lower: Xid, linking: bool },
    NetNsAdd { netns: NetNs },
    NetNsDel { netns: NetNs },
    /// End of the initial dump
    Break,
}

impl Note {
    /// Device the note is about; the lower side for [`Note::DevUpper`]
    pub fn xid(&self) -> Option<Xid> {
        match *self {
            Note::DevNew { xid }
            | Note::DevDump { xid }
            | Note::DevUp { xid }
            | Note::DevDown { xid }
            | Note::DevReg { xid }
            | Note::DevUnreg { xid }
            | Note::DevFeatures { xid }
            | Note::DevDel { xid } => Some(xid),
            Note::DevUpper { lower, .. } => Some(lower),
            Note::NetNsAdd { .. } | Note::NetNsDel { .. } | Note::Break => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Note::DevNew { .. } => "dev-new",
            Note::DevDump { .. } => "dev-dump",
            Note::DevUp { .. } => "dev-up",
            Note::DevDown { .. } => "dev-down",
            Note::DevReg { .. } => "dev-reg",
            Note::DevUnreg { .. } => "dev-unreg",
            Note::DevFeatures { .. } => "dev-features",
            Note::DevDel { .. } => "dev-del",
            Note::DevUpper { .. } => "dev-upper",
            Note::NetNsAdd { .. } => "netns-add",
            Note::NetNsDel { .. } => "netns-del",
            Note::Break => "break",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::DevUpper {
                upper,
                lower,
                linking,
            } => write!(
                f,
                "{} {} {} {}",
                self.as_str(),
                lower,
                if *linking { "->" } else { "-/>" },
                upper
            ),
            Note::NetNsAdd { netns } | Note::NetNsDel { netns } => {
                write!(f, "{} {}", self.as_str(), netns)
            }
            Note::Break => f.write_str(self.as_str()),
            _ => match self.xid() {
                Some(xid) => write!(f, "{} {}", self.as_str(), xid),
                None => f.write_str(self.as_str()),
            },
        }
    }
}
