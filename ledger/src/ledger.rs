//! The ledger trait and the values it returns.

use async_trait::async_trait;
use phonelink_types::{Address, RecoverableSignature, RequestId};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// One member of the on-chain validator set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEntry {
    pub validator: Address,
    /// Position in the set; selects this validator's challenge fragment.
    pub index: u32,
    pub endpoint: String,
    /// Contract-side status flag, carried through unchanged.
    pub status: u8,
}

/// Result of asking the ledger whether votes for a request can be tallied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteCountStatus {
    Possible,
    NotYet,
    AlreadyCounted,
}

impl VoteCountStatus {
    /// Map the contract's raw value: 1 = possible, 2 = not yet, anything else = already counted.
    pub fn from_raw(value: u128) -> Self {
        match value {
            1 => Self::Possible,
            2 => Self::NotYet,
            _ => Self::AlreadyCounted,
        }
    }
}

/// Calls against the shared registry contract.
///
/// State-changing calls are sent from this validator's own account. Every call
/// is a remote operation that may fail transiently; callers log and retry on
/// their next tick.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    async fn nonce_of(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Whether `id` is unused on the ledger.
    async fn is_available(&self, id: &RequestId) -> Result<bool, LedgerError>;

    async fn get_validators(&self) -> Result<Vec<ValidatorEntry>, LedgerError>;

    async fn add_request(
        &self,
        id: &RequestId,
        phone_hash: &[u8; 32],
        address: &Address,
        signature: &RecoverableSignature,
    ) -> Result<(), LedgerError>;

    async fn vote_request(&self, id: &RequestId) -> Result<(), LedgerError>;

    async fn count_vote(&self, id: &RequestId) -> Result<(), LedgerError>;

    async fn can_count_vote(&self, id: &RequestId) -> Result<VoteCountStatus, LedgerError>;

    /// Publish this validator's endpoint.
    async fn update_endpoint(&self, endpoint: &str) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_vote_count_mapping() {
        assert_eq!(VoteCountStatus::from_raw(1), VoteCountStatus::Possible);
        assert_eq!(VoteCountStatus::from_raw(2), VoteCountStatus::NotYet);
        assert_eq!(VoteCountStatus::from_raw(0), VoteCountStatus::AlreadyCounted);
        assert_eq!(VoteCountStatus::from_raw(3), VoteCountStatus::AlreadyCounted);
    }
}
