//! Deciding what a submitted code means for one record.

use phonelink_types::{ProcessStep, Timestamp, ValidationStatus, VerificationRecord};

use crate::{code_fragment, VerificationError};

/// What the engine should do with a record after a submit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The fragment matches; store it and advance to `ReceivedCode`.
    Accept { fragment: String },
    /// The fragment matches, but the record is already past `ReceivedCode`.
    AlreadyAccepted,
    /// The fragment does not match; store it and report a mismatch.
    Reject { fragment: String },
    /// The challenge is past its expiry; mark the record `Expired`.
    Expire,
}

/// Evaluate `code` against `record` for the validator at `index`.
///
/// Errors are final answers that leave the record untouched.
pub fn evaluate_submit(
    record: &VerificationRecord,
    code: &str,
    index: u32,
    now: Timestamp,
) -> Result<SubmitOutcome, VerificationError> {
    match record.validation_status {
        ValidationStatus::None => Err(VerificationError::NotYetSent),
        ValidationStatus::Voted | ValidationStatus::Confirmed => {
            Err(VerificationError::AlreadyFinished)
        }
        ValidationStatus::Expired => Err(VerificationError::AlreadyExpired),
        ValidationStatus::Sent => {
            if record.process_step.rank() >= ProcessStep::ReceivedCode.rank() {
                // Accepted earlier; voting is under way and expiry no longer applies.
                let fragment = code_fragment(code, index)?;
                return if fragment == record.send_code {
                    Ok(SubmitOutcome::AlreadyAccepted)
                } else {
                    Err(VerificationError::CodeMismatch)
                };
            }
            if record.challenge_expired(now) {
                return Ok(SubmitOutcome::Expire);
            }
            let fragment = code_fragment(code, index)?.to_string();
            if fragment == record.send_code {
                Ok(SubmitOutcome::Accept { fragment })
            } else {
                Ok(SubmitOutcome::Reject { fragment })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonelink_types::{Address, RecoverableSignature, RequestId};

    fn record(status: ValidationStatus, step: ProcessStep, expire_at: u64) -> VerificationRecord {
        VerificationRecord {
            request_id: RequestId::new([1; 32]),
            phone: "+82 10-1234-1000".into(),
            address: Address::new([2; 20]),
            nonce: 0,
            request_signature: RecoverableSignature::default(),
            receiver: Address::new([3; 20]),
            receiver_signature: RecoverableSignature::default(),
            validation_status: status,
            send_code: "01".into(),
            receive_code: String::new(),
            expire_at: Timestamp::new(expire_at),
            process_step: step,
        }
    }

    fn now() -> Timestamp {
        Timestamp::new(1_000)
    }

    #[test]
    fn matching_fragment_is_accepted() {
        let r = record(ValidationStatus::Sent, ProcessStep::SentSms, 1_300);
        assert_eq!(
            evaluate_submit(&r, "000102", 1, now()).unwrap(),
            SubmitOutcome::Accept {
                fragment: "01".into()
            }
        );
    }

    #[test]
    fn wrong_fragment_is_rejected() {
        let r = record(ValidationStatus::Sent, ProcessStep::SentSms, 1_300);
        assert_eq!(
            evaluate_submit(&r, "010000", 1, now()).unwrap(),
            SubmitOutcome::Reject {
                fragment: "00".into()
            }
        );
    }

    #[test]
    fn expired_challenge() {
        let r = record(ValidationStatus::Sent, ProcessStep::SentSms, 999);
        assert_eq!(
            evaluate_submit(&r, "000102", 1, now()).unwrap(),
            SubmitOutcome::Expire
        );
        // expiry is strict
        let r = record(ValidationStatus::Sent, ProcessStep::SentSms, 1_000);
        assert!(matches!(
            evaluate_submit(&r, "000102", 1, now()).unwrap(),
            SubmitOutcome::Accept { .. }
        ));
    }

    #[test]
    fn resubmit_after_acceptance() {
        let r = record(ValidationStatus::Sent, ProcessStep::Voted, 10);
        assert_eq!(
            evaluate_submit(&r, "000102", 1, now()).unwrap(),
            SubmitOutcome::AlreadyAccepted
        );
        assert_eq!(
            evaluate_submit(&r, "009902", 1, now()),
            Err(VerificationError::CodeMismatch)
        );
    }

    #[test]
    fn terminal_and_unsent_records() {
        let cases = [
            (ValidationStatus::None, VerificationError::NotYetSent),
            (ValidationStatus::Confirmed, VerificationError::AlreadyFinished),
            (ValidationStatus::Voted, VerificationError::AlreadyFinished),
            (ValidationStatus::Expired, VerificationError::AlreadyExpired),
        ];
        for (status, expected) in cases {
            let r = record(status, ProcessStep::SentSms, 1_300);
            assert_eq!(evaluate_submit(&r, "000102", 1, now()), Err(expected));
        }
    }

    #[test]
    fn short_code() {
        let r = record(ValidationStatus::Sent, ProcessStep::SentSms, 1_300);
        assert_eq!(
            evaluate_submit(&r, "00", 1, now()),
            Err(VerificationError::CodeTooShort { len: 2, index: 1 })
        );
        assert!(evaluate_submit(&r, "00", 0, now()).is_ok());
    }
}
