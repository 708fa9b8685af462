//! State enums for verification records and node operating modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypeError;

/// The SMS-challenge lifecycle of a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// No challenge has been issued yet.
    #[default]
    None,
    /// A challenge fragment was issued and is waiting for the submitted code.
    Sent,
    /// This validator has voted for the request.
    Voted,
    /// The vote was counted on the ledger.
    Confirmed,
    /// The challenge expired before a correct code arrived.
    Expired,
}

impl ValidationStatus {
    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Expired)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Sent => 1,
            Self::Voted => 2,
            Self::Confirmed | Self::Expired => 3,
        }
    }

    /// Statuses never regress and terminal statuses never change.
    pub fn can_transition_to(&self, next: ValidationStatus) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// The gossip/voting lifecycle of a record, consumed by the driver loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStep {
    #[default]
    None,
    /// This node originated the request.
    ReceivedRegister,
    /// This node received the request from a peer.
    ReceivedBroadcast,
    /// The challenge was dispatched; waiting for the user to submit the code.
    SentSms,
    /// The correct code fragment arrived; a vote is due.
    ReceivedCode,
    /// The vote was cast; waiting for the tally.
    Voted,
    Finished,
}

impl ProcessStep {
    /// Position along the lifecycle. Both provenance markers share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ReceivedRegister | Self::ReceivedBroadcast => 1,
            Self::SentSms => 2,
            Self::ReceivedCode => 3,
            Self::Voted => 4,
            Self::Finished => 5,
        }
    }

    /// Whether a record at `self` may be moved to `next`.
    ///
    /// Steps only move forward; rewriting the current step is allowed, switching
    /// between the two provenance markers is not.
    pub fn can_advance_to(&self, next: ProcessStep) -> bool {
        if *self == next {
            return true;
        }
        next.rank() > self.rank()
    }

    /// Steps the driver loop acts on.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::None | Self::SentSms | Self::Finished)
    }
}

impl fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::ReceivedRegister => "received_register",
            Self::ReceivedBroadcast => "received_broadcast",
            Self::SentSms => "sent_sms",
            Self::ReceivedCode => "received_code",
            Self::Voted => "voted",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// How challenges are generated and delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationMode {
    /// No SMS; records advance to `ReceivedCode` on their own after a short delay.
    NoSmsNoCode,
    /// No SMS; codes are derived from the validator index.
    NoSmsKnownCode,
    /// SMS is sent; codes are derived from the validator index.
    YesSmsKnownCode,
    /// SMS is sent with random codes.
    #[default]
    YesSmsUnknownCode,
}

impl AuthenticationMode {
    pub fn sends_sms(&self) -> bool {
        matches!(self, Self::YesSmsKnownCode | Self::YesSmsUnknownCode)
    }

    pub fn uses_known_code(&self) -> bool {
        !matches!(self, Self::YesSmsUnknownCode)
    }

    pub fn auto_confirms(&self) -> bool {
        matches!(self, Self::NoSmsNoCode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSmsNoCode => "no_sms_no_code",
            Self::NoSmsKnownCode => "no_sms_known_code",
            Self::YesSmsKnownCode => "yes_sms_known_code",
            Self::YesSmsUnknownCode => "yes_sms_unknown_code",
        }
    }
}

impl FromStr for AuthenticationMode {
    type Err = TypeError;

    /// Accepts the snake_case names as well as the numeric codes 0-3.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_sms_no_code" | "nosmsnocode" | "0" => Ok(Self::NoSmsNoCode),
            "no_sms_known_code" | "nosmsknowncode" | "1" => Ok(Self::NoSmsKnownCode),
            "yes_sms_known_code" | "yessmsknowncode" | "2" => Ok(Self::YesSmsKnownCode),
            "yes_sms_unknown_code" | "yessmsunknowncode" | "3" => Ok(Self::YesSmsUnknownCode),
            other => Err(TypeError::UnknownVariant {
                kind: "authentication mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
