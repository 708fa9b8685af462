//! Verification record storage trait.

use crate::StoreError;
use phonelink_types::{ProcessStep, RequestId, Timestamp, ValidationStatus, VerificationRecord};

/// Records are deleted once `expire_at + EXPIRED_RECORD_GRACE_SECS < now`.
pub const EXPIRED_RECORD_GRACE_SECS: u64 = 86_400;

/// Durable table of verification records keyed by request id.
///
/// Every update is a single atomic read-modify-write of one record. Updates on
/// an unknown key fail with [`StoreError::NotFound`]; updates that would move a
/// record backwards fail with [`StoreError::InvalidTransition`].
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    fn create(&self, record: &VerificationRecord) -> Result<(), StoreError>;

    fn update_validation_status(
        &self,
        id: &RequestId,
        status: ValidationStatus,
    ) -> Result<(), StoreError>;

    /// Record an issued challenge fragment together with its status and expiry.
    fn update_send_code(
        &self,
        id: &RequestId,
        status: ValidationStatus,
        code: &str,
        expire_at: Timestamp,
    ) -> Result<(), StoreError>;

    fn update_receive_code(&self, id: &RequestId, code: &str) -> Result<(), StoreError>;

    fn update_process_step(&self, id: &RequestId, step: ProcessStep) -> Result<(), StoreError>;

    fn get(&self, id: &RequestId) -> Result<Option<VerificationRecord>, StoreError>;

    /// Records whose step needs driver-loop action
    /// (anything but `None`, `SentSms` and `Finished`).
    fn list_unfinished(&self) -> Result<Vec<VerificationRecord>, StoreError>;

    /// Delete records with `expire_at + grace < now`. Returns how many were removed.
    fn delete_expired(&self, now: Timestamp) -> Result<usize, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

/// Whether a record is old enough for the expiry sweep.
pub fn is_sweepable(record: &VerificationRecord, now: Timestamp) -> bool {
    record.expire_at.plus_secs(EXPIRED_RECORD_GRACE_SECS) < now
}

/// Apply a validation-status change, refusing regressions.
pub fn apply_validation_status(
    record: &mut VerificationRecord,
    status: ValidationStatus,
) -> Result<(), StoreError> {
    if !record.validation_status.can_transition_to(status) {
        return Err(StoreError::InvalidTransition {
            key: record.request_id.to_string(),
            from: format!("{:?}", record.validation_status),
            to: format!("{status:?}"),
        });
    }
    record.validation_status = status;
    Ok(())
}

/// Apply a process-step change, refusing backward moves.
pub fn apply_process_step(
    record: &mut VerificationRecord,
    step: ProcessStep,
) -> Result<(), StoreError> {
    if !record.process_step.can_advance_to(step) {
        return Err(StoreError::InvalidTransition {
            key: record.request_id.to_string(),
            from: record.process_step.to_string(),
            to: step.to_string(),
        });
    }
    record.process_step = step;
    Ok(())
}
