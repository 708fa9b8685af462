//! Validator peer descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Address;

/// Health of a tracked peer as last observed by this node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PeerStatus {
    /// Not yet checked.
    #[default]
    Unknown = 0,
    /// Answered the last health check with the expected identity.
    Active = 1,
    /// Unreachable or answered with an error.
    Inactive = 2,
    /// Answered with a different identity; never contacted again until re-added.
    Abnormal = 3,
}

impl PeerStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Active,
            2 => Self::Inactive,
            3 => Self::Abnormal,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Abnormal => "abnormal",
        };
        f.write_str(s)
    }
}

/// A point-in-time view of one peer validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub node_id: Address,
    /// Position in the on-chain validator set.
    pub index: u32,
    pub endpoint: String,
    pub version: String,
    pub status: PeerStatus,
}

/// This node's self-description served on `/info`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: Address,
    pub endpoint: String,
    pub version: String,
}
