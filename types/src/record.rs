//! The durable per-request verification record.

use serde::{Deserialize, Serialize};

use crate::{
    Address, PhoneRequest, ProcessStep, RecoverableSignature, RequestId, Timestamp, Transaction,
    ValidationStatus,
};

/// Everything a validator tracks about one verification request.
///
/// Created once when the request arrives (from a user or from a peer) and
/// updated in place afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub request_id: RequestId,
    pub phone: String,
    pub address: Address,
    pub nonce: u64,
    pub request_signature: RecoverableSignature,
    /// Validator that first accepted the request.
    pub receiver: Address,
    pub receiver_signature: RecoverableSignature,
    pub validation_status: ValidationStatus,
    /// Challenge fragment issued by this node.
    pub send_code: String,
    /// Fragment received back from the submitter.
    pub receive_code: String,
    pub expire_at: Timestamp,
    pub process_step: ProcessStep,
}

impl VerificationRecord {
    /// A fresh record for `tx` entering the lifecycle at `step`.
    pub fn from_transaction(tx: &Transaction, step: ProcessStep) -> Self {
        Self {
            request_id: tx.request_id,
            phone: tx.request.phone.clone(),
            address: tx.request.address,
            nonce: tx.request.nonce,
            request_signature: tx.request.signature,
            receiver: tx.receiver,
            receiver_signature: tx.signature,
            validation_status: ValidationStatus::None,
            send_code: String::new(),
            receive_code: String::new(),
            expire_at: Timestamp::EPOCH,
            process_step: step,
        }
    }

    /// The relayable request this record was created from.
    pub fn to_transaction(&self) -> Transaction {
        Transaction {
            request: PhoneRequest {
                phone: self.phone.clone(),
                address: self.address,
                nonce: self.nonce,
                signature: self.request_signature,
            },
            request_id: self.request_id,
            receiver: self.receiver,
            signature: self.receiver_signature,
        }
    }

    /// Whether the issued challenge is past its expiry at `now`.
    pub fn challenge_expired(&self, now: Timestamp) -> bool {
        self.expire_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_transaction_starts_clean() {
        let tx = Transaction {
            request: PhoneRequest {
                phone: "+82 10-1234-1000".into(),
                address: Address::new([1; 20]),
                nonce: 0,
                signature: RecoverableSignature::new([3; 65]),
            },
            request_id: RequestId::new([4; 32]),
            receiver: Address::new([2; 20]),
            signature: RecoverableSignature::new([5; 65]),
        };
        let record = VerificationRecord::from_transaction(&tx, ProcessStep::ReceivedBroadcast);
        assert_eq!(record.request_id, tx.request_id);
        assert_eq!(record.validation_status, ValidationStatus::None);
        assert_eq!(record.process_step, ProcessStep::ReceivedBroadcast);
        assert!(record.send_code.is_empty());
        assert_eq!(record.to_transaction(), tx);
    }

    #[test]
    fn bincode_round_trip() {
        let tx = Transaction {
            request: PhoneRequest {
                phone: "+1 202-555-0100".into(),
                address: Address::new([1; 20]),
                nonce: 7,
                signature: RecoverableSignature::new([3; 65]),
            },
            request_id: RequestId::new([4; 32]),
            receiver: Address::new([2; 20]),
            signature: RecoverableSignature::new([5; 65]),
        };
        let record = VerificationRecord::from_transaction(&tx, ProcessStep::ReceivedRegister);
        let bytes = bincode::serialize(&record).unwrap();
        let back: VerificationRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, record);
    }
}
